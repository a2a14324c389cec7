//! Per-level coastline preprocessing: simplification, degenerate-area
//! cleanup, island/mainland crossing filter and cell footprint
//! classification.

use std::collections::{BTreeMap, HashMap};

use log::{info, warn};
use rayon::prelude::*;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::cells::{get_cell_intersections, Intersection};
use crate::geometry::find_path_intersections;
use crate::projection::PixelProjection;
use crate::simplify::{optimize_polyline, OptimizeMethod};
use crate::state_map::StateMap;
use crate::types::{Coast, CoastState, GeoBox, GeoCoord, Pixel};

/// A coastline after per-level preprocessing.
#[derive(Debug, Clone)]
pub struct CoastlineData {
    pub id: u64,
    pub is_area: bool,
    pub left: CoastState,
    pub right: CoastState,
    /// Simplified points; for areas the ring is closed (first == last).
    pub points: Vec<GeoCoord>,
    /// Whether the coastline's bounding box fits into a single cell.
    pub is_completely_in_cell: bool,
    /// Global index of that single cell (valid if `is_completely_in_cell`).
    pub cell: Pixel,
    /// Border crossings keyed by map-relative cell index.
    pub cell_intersections: HashMap<Pixel, Vec<Intersection>>,
}

/// All per-level coastline data plus the per-cell coastline indices.
#[derive(Debug, Default)]
pub struct Data {
    pub coastlines: Vec<CoastlineData>,
    /// Coastlines crossing each cell, keyed by map-relative cell index.
    pub cell_coastlines: BTreeMap<Pixel, Vec<usize>>,
    /// Coastlines fully contained in each cell, keyed the same way.
    pub cell_covered_coastlines: BTreeMap<Pixel, Vec<usize>>,
}

/// Simplifies every coastline for one level, drops islands that shrink
/// below `min_object_dimension` projected pixels or that cross a mainland
/// coastline, and files each survivor under the cells it touches.
pub fn calculate_coastline_data(
    state_map: &StateMap,
    coasts: &[Coast],
    optimize: OptimizeMethod,
    tolerance: f64,
    min_object_dimension: f64,
    projection: &PixelProjection,
) -> Data {
    let mut transformed: Vec<Option<CoastlineData>> = Vec::with_capacity(coasts.len());

    for coast in coasts {
        transformed.push(transform_coast(
            coast,
            optimize,
            tolerance,
            min_object_dimension,
            projection,
        ));
    }

    filter_intersecting_islands(&mut transformed);

    // Classify the cell footprint of every survivor.
    let mut data = Data::default();

    for (index, coastline) in transformed.into_iter().enumerate() {
        let Some(mut coastline) = coastline else {
            continue;
        };

        let bbox = match GeoBox::of_points(&coasts[index].points) {
            Some(bbox) => bbox,
            None => continue,
        };

        let cx_min = ((bbox.min_lon + 180.0) / state_map.cell_width()).floor() as u32;
        let cx_max = ((bbox.max_lon + 180.0) / state_map.cell_width()).floor() as u32;
        let cy_min = ((bbox.min_lat + 90.0) / state_map.cell_height()).floor() as u32;
        let cy_max = ((bbox.max_lat + 90.0) / state_map.cell_height()).floor() as u32;

        let cur = data.coastlines.len();

        if cx_min == cx_max && cy_min == cy_max {
            coastline.is_completely_in_cell = true;
            coastline.cell = Pixel::new(cx_min, cy_min);

            if state_map.is_in_absolute(cx_min, cy_min) {
                let coord = Pixel::new(cx_min - state_map.x_start(), cy_min - state_map.y_start());
                data.cell_covered_coastlines.entry(coord).or_default().push(cur);
            }
        } else {
            coastline.cell_intersections =
                get_cell_intersections(state_map, &coastline.points, cur);

            for coord in coastline.cell_intersections.keys() {
                data.cell_coastlines.entry(*coord).or_default().push(cur);
            }
        }

        data.coastlines.push(coastline);
    }

    // Keep the per-cell coastline lists in a deterministic order; the hash
    // map iteration above does not guarantee one.
    for list in data.cell_coastlines.values_mut() {
        list.sort_unstable();
    }

    info!(
        "{} coastline(s) transformed to {} coastline(s)",
        coasts.len(),
        data.coastlines.len()
    );

    data
}

fn transform_coast(
    coast: &Coast,
    optimize: OptimizeMethod,
    tolerance: f64,
    min_object_dimension: f64,
    projection: &PixelProjection,
) -> Option<CoastlineData> {
    if coast.points.len() < 2 {
        return None;
    }

    // Islands that project below the minimum dimension are invisible at
    // this level and are skipped entirely.
    if coast.is_area {
        let bbox = GeoBox::of_points(&coast.points)?;
        let pixel_width = projection.to_pixels(bbox.max_lon - bbox.min_lon);
        let pixel_height = projection.to_pixels(bbox.max_lat - bbox.min_lat);

        if pixel_width <= min_object_dimension || pixel_height <= min_object_dimension {
            return None;
        }
    }

    let mut points = optimize_polyline(&coast.points, optimize, tolerance, projection);

    if coast.is_area {
        // Simplification can leave the ring open; close it again.
        if points.first() != points.last() {
            let first = points[0];
            points.push(first);
        }

        if points.len() <= 3 {
            // Island reduced to a line.
            return None;
        }
    }

    Some(CoastlineData {
        id: coast.id,
        is_area: coast.is_area,
        left: coast.left,
        right: coast.right,
        points,
        is_completely_in_cell: false,
        cell: Pixel::new(0, 0),
        cell_intersections: HashMap::new(),
    })
}

/// Drops area coastlines whose simplified geometry crosses a way coastline.
///
/// Islands near the mainland can start intersecting it after
/// simplification, which breaks the boundary walk; dropping the island is
/// the visually smallest repair. Area/area and way/way pairs are left
/// alone.
fn filter_intersecting_islands(transformed: &mut [Option<CoastlineData>]) {
    let has_areas = transformed
        .iter()
        .flatten()
        .any(|coastline| coastline.is_area);
    let has_ways = transformed
        .iter()
        .flatten()
        .any(|coastline| !coastline.is_area);

    if !has_areas || !has_ways {
        return;
    }

    let dropped: Vec<usize> = {
        let snapshot: &[Option<CoastlineData>] = transformed;

        let way_tree: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>> = RTree::bulk_load(
            snapshot
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
                .filter(|(_, c)| !c.is_area)
                .filter_map(|(i, way)| {
                    let bbox = GeoBox::of_points(&way.points)?;
                    Some(GeomWithData::new(
                        Rectangle::from_corners(
                            [bbox.min_lon, bbox.min_lat],
                            [bbox.max_lon, bbox.max_lat],
                        ),
                        i,
                    ))
                })
                .collect(),
        );

        let areas: Vec<(usize, &CoastlineData)> = snapshot
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (i, c)))
            .filter(|(_, c)| c.is_area)
            .collect();

        areas
            .par_iter()
            .filter_map(|(area_index, area)| {
                let bbox = GeoBox::of_points(&area.points)?;
                let envelope =
                    AABB::from_corners([bbox.min_lon, bbox.min_lat], [bbox.max_lon, bbox.max_lat]);

                for way in way_tree.locate_in_envelope_intersecting(&envelope) {
                    let Some(way_data) = snapshot[way.data].as_ref() else {
                        continue;
                    };

                    let crossings =
                        find_path_intersections(&area.points, &way_data.points, true, false);

                    if !crossings.is_empty() {
                        warn!(
                            "Detected intersection between island {} and coastline {}",
                            area.id, way_data.id
                        );
                        return Some(*area_index);
                    }
                }

                None
            })
            .collect()
    };

    for index in dropped {
        transformed[index] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoBox;

    fn diamond(center_lat: f64, center_lon: f64, radius: f64, id: u64) -> Coast {
        Coast {
            id,
            points: vec![
                GeoCoord::new(center_lat + radius, center_lon),
                GeoCoord::new(center_lat, center_lon + radius),
                GeoCoord::new(center_lat - radius, center_lon),
                GeoCoord::new(center_lat, center_lon - radius),
            ],
            is_area: true,
            left: CoastState::Land,
            right: CoastState::Water,
        }
    }

    fn test_map() -> StateMap {
        StateMap::new(GeoBox::new(0.5, 0.5, 3.5, 3.5), 1.0, 1.0)
    }

    #[test]
    fn test_island_in_single_cell() {
        let map = test_map();
        let island = diamond(1.5, 1.5, 0.2, 7);

        let data = calculate_coastline_data(
            &map,
            &[island],
            OptimizeMethod::None,
            1.0,
            0.5,
            &PixelProjection::for_level(10),
        );

        assert_eq!(data.coastlines.len(), 1);
        let coastline = &data.coastlines[0];
        assert!(coastline.is_completely_in_cell);
        assert_eq!(coastline.cell, Pixel::new(181, 91));
        // Ring comes out closed.
        assert_eq!(coastline.points.first(), coastline.points.last());
        assert_eq!(
            data.cell_covered_coastlines.get(&Pixel::new(1, 1)),
            Some(&vec![0])
        );
    }

    #[test]
    fn test_small_island_skipped() {
        let map = test_map();
        let island = diamond(1.5, 1.5, 0.001, 7);

        let data = calculate_coastline_data(
            &map,
            &[island],
            OptimizeMethod::None,
            1.0,
            4.0,
            &PixelProjection::for_level(6),
        );

        assert!(data.coastlines.is_empty());
    }

    #[test]
    fn test_crossing_island_dropped() {
        let map = test_map();
        let island = diamond(1.5, 1.5, 0.3, 7);
        let mainland = Coast {
            id: 8,
            points: vec![GeoCoord::new(1.5, 0.2), GeoCoord::new(1.5, 3.8)],
            is_area: false,
            left: CoastState::Land,
            right: CoastState::Water,
        };

        let data = calculate_coastline_data(
            &map,
            &[island, mainland],
            OptimizeMethod::None,
            1.0,
            0.5,
            &PixelProjection::for_level(10),
        );

        // The island goes, the way stays.
        assert_eq!(data.coastlines.len(), 1);
        assert_eq!(data.coastlines[0].id, 8);
        assert!(!data.coastlines[0].is_area);
    }

    #[test]
    fn test_way_footprint_uses_cell_intersections() {
        let map = test_map();
        let way = Coast {
            id: 3,
            points: vec![GeoCoord::new(1.5, 0.2), GeoCoord::new(1.5, 3.8)],
            is_area: false,
            left: CoastState::Land,
            right: CoastState::Water,
        };

        let data = calculate_coastline_data(
            &map,
            &[way],
            OptimizeMethod::None,
            1.0,
            0.5,
            &PixelProjection::for_level(10),
        );

        assert_eq!(data.coastlines.len(), 1);
        assert!(!data.coastlines[0].is_completely_in_cell);
        assert!(data.cell_coastlines.contains_key(&Pixel::new(1, 1)));
        assert!(data.cell_coastlines.contains_key(&Pixel::new(2, 1)));
    }
}
