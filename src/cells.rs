//! Cell-intersection indexing: which cells a polyline crosses and where it
//! enters and leaves each cell border.

use std::collections::{BTreeSet, HashMap};

use crate::geometry::{distance_square, get_line_intersection, lines_intersect};
use crate::state_map::StateMap;
use crate::types::{GeoCoord, Pixel};

/// How a coastline segment meets a cell border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The segment enters the cell here.
    In,
    /// The segment leaves the cell here.
    Out,
    /// The segment grazes the border without entering.
    Touch,
}

/// One crossing of a coastline segment with a cell border.
///
/// `border_index`: 0 = top, 1 = right, 2 = bottom, 3 = left.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    /// Index of the owning coastline in the per-level coastline vector.
    pub coastline: usize,
    /// Index of the crossing segment's start in the simplified point list.
    pub prev_way_point_index: usize,
    pub point: GeoCoord,
    /// Squared distance from the segment start to `point`.
    pub distance_square: f64,
    pub border_index: u8,
    pub direction: Direction,
}

/// The four corners of the global cell `(x, y)`, clockwise from top-left,
/// with the top-left corner repeated so border `i` runs from point `i` to
/// point `i + 1`.
fn border_points(x: u32, y: u32, cell_width: f64, cell_height: f64) -> [GeoCoord; 5] {
    let lon_min = f64::from(x) * cell_width - 180.0;
    let lon_max = lon_min + cell_width;
    let lat_min = f64::from(y) * cell_height - 90.0;
    let lat_max = lat_min + cell_height;

    [
        GeoCoord::new(lat_max, lon_min), // top left
        GeoCoord::new(lat_max, lon_max), // top right
        GeoCoord::new(lat_min, lon_max), // bottom right
        GeoCoord::new(lat_min, lon_min), // bottom left
        GeoCoord::new(lat_max, lon_min),
    ]
}

/// Global cell indices a polyline passes through: both endpoint cells of
/// every segment plus every cell whose border the segment intersects.
pub fn get_cells(state_map: &StateMap, points: &[GeoCoord]) -> BTreeSet<Pixel> {
    let mut cells = BTreeSet::new();

    for segment in points.windows(2) {
        let c1 = state_map.cell_of(&segment[0]);
        let c2 = state_map.cell_of(&segment[1]);

        cells.insert(c1);
        cells.insert(c2);

        if c1 == c2 {
            continue;
        }

        for x in c1.x.min(c2.x)..=c1.x.max(c2.x) {
            for y in c1.y.min(c2.y)..=c1.y.max(c2.y) {
                let border = border_points(x, y, state_map.cell_width(), state_map.cell_height());

                for corner in 0..4 {
                    if lines_intersect(
                        &segment[0],
                        &segment[1],
                        &border[corner],
                        &border[corner + 1],
                    ) {
                        cells.insert(Pixel::new(x, y));
                        break;
                    }
                }
            }
        }
    }

    cells
}

/// Border crossings of a polyline for every map cell it traverses, keyed by
/// cell index relative to the state map corner.
///
/// Per traversed cell a segment contributes up to two crossings: in the
/// segment's start cell a single hit leaves (`Out`), in its end cell a
/// single hit enters (`In`), in transit cells a single hit is a `Touch`;
/// with two hits the one nearer the segment start enters and the other
/// leaves.
pub fn get_cell_intersections(
    state_map: &StateMap,
    points: &[GeoCoord],
    coastline: usize,
) -> HashMap<Pixel, Vec<Intersection>> {
    let mut cell_intersections: HashMap<Pixel, Vec<Intersection>> = HashMap::new();

    for (p, segment) in points.windows(2).enumerate() {
        let c1 = state_map.cell_of(&segment[0]);
        let c2 = state_map.cell_of(&segment[1]);

        if c1 == c2 {
            continue;
        }

        for x in c1.x.min(c2.x)..=c1.x.max(c2.x) {
            for y in c1.y.min(c2.y)..=c1.y.max(c2.y) {
                if !state_map.is_in_absolute(x, y) {
                    continue;
                }

                let coord = Pixel::new(x - state_map.x_start(), y - state_map.y_start());
                let border = border_points(x, y, state_map.cell_width(), state_map.cell_height());

                let mut hits: Vec<Intersection> = Vec::with_capacity(2);
                let mut corner = 0;

                while corner < 4 && hits.len() < 2 {
                    if let Some(point) = get_line_intersection(
                        &segment[0],
                        &segment[1],
                        &border[corner],
                        &border[corner + 1],
                    ) {
                        hits.push(Intersection {
                            coastline,
                            prev_way_point_index: p,
                            point,
                            distance_square: distance_square(&segment[0], &point),
                            border_index: corner as u8,
                            direction: Direction::Touch,
                        });
                    }
                    corner += 1;
                }

                let is_endpoint_cell = Pixel::new(x, y) == c1 || Pixel::new(x, y) == c2;

                match hits.len() {
                    0 => {
                        // A segment must cross the border of its endpoint
                        // cells somewhere.
                        debug_assert!(!is_endpoint_cell);
                    }
                    1 => {
                        let mut hit = hits[0];
                        hit.direction = if Pixel::new(x, y) == c1 {
                            Direction::Out
                        } else if Pixel::new(x, y) == c2 {
                            Direction::In
                        } else {
                            Direction::Touch
                        };
                        cell_intersections.entry(coord).or_default().push(hit);
                    }
                    _ => {
                        let (mut first, mut second) = (hits[0], hits[1]);
                        if first.distance_square > second.distance_square {
                            std::mem::swap(&mut first, &mut second);
                        }
                        first.direction = Direction::In;
                        second.direction = Direction::Out;

                        let entry = cell_intersections.entry(coord).or_default();
                        entry.push(first);
                        entry.push(second);
                    }
                }
            }
        }
    }

    cell_intersections
}
