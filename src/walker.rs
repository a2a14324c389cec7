//! Ground tile construction. For every cell crossed by coastlines the cell
//! boundary is walked clockwise, stitching coastline paths and cell-border
//! arcs into closed, typed tile polygons.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use log::warn;

use crate::cells::{Direction, Intersection};
use crate::coastline::Data;
use crate::state_map::StateMap;
use crate::types::{CellCoord, CoastState, GeoCoord, GroundTile, Pixel, TileType, CELL_MAX};

/// Hard cap on walk steps per starting intersection; a walk that loops
/// longer than this is stuck and gets abandoned.
pub const MAX_WALK_STEPS: usize = 1000;

/// Counters for anomalies encountered while walking cell boundaries.
#[derive(Debug, Default, Clone)]
pub struct WalkStats {
    pub aborted_walks: u64,
    pub degenerate_tiles: u64,
    /// Times the tripoint hop rejected its best outgoing limb because its
    /// two ends claimed the same direction.
    pub tripoint_direction_conflicts: u64,
}

/// Geometry of one cell: geographic extent, the four corners as geo points
/// and as cell-local coordinates, clockwise from top-left.
#[derive(Debug, Clone)]
pub struct CellBoundaries {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub border_points: [GeoCoord; 4],
    pub border_coords: [CellCoord; 4],
}

impl CellBoundaries {
    /// `cell` is relative to the state map corner.
    pub fn new(state_map: &StateMap, cell: Pixel) -> Self {
        let lon_min =
            f64::from(state_map.x_start() + cell.x) * state_map.cell_width() - 180.0;
        let lon_max = lon_min + state_map.cell_width();
        let lat_min =
            f64::from(state_map.y_start() + cell.y) * state_map.cell_height() - 90.0;
        let lat_max = lat_min + state_map.cell_height();

        CellBoundaries {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            border_points: [
                GeoCoord::new(lat_max, lon_min), // top left
                GeoCoord::new(lat_max, lon_max), // top right
                GeoCoord::new(lat_min, lon_max), // bottom right
                GeoCoord::new(lat_min, lon_min), // bottom left
            ],
            border_coords: [
                CellCoord::new(0, CELL_MAX, false),
                CellCoord::new(CELL_MAX, CELL_MAX, false),
                CellCoord::new(CELL_MAX, 0, false),
                CellCoord::new(0, 0, false),
            ],
        }
    }
}

/// Maps a geo point into the fixed-point coordinate space of the cell with
/// the given minimum corner. Clamped to the valid range; points slightly
/// outside the cell (quantization, wrap-around walks) must not escape it.
pub fn transform(
    point: &GeoCoord,
    state_map: &StateMap,
    cell_min_lat: f64,
    cell_min_lon: f64,
    coast: bool,
) -> CellCoord {
    let x = ((point.lon - cell_min_lon) / state_map.cell_width() * f64::from(CELL_MAX) + 0.5)
        .floor()
        .clamp(0.0, f64::from(CELL_MAX));
    let y = ((point.lat - cell_min_lat) / state_map.cell_height() * f64::from(CELL_MAX) + 0.5)
        .floor()
        .clamp(0.0, f64::from(CELL_MAX));

    CellCoord::new(x as u16, y as u16, coast)
}

/// Clockwise ordering of border intersections: by border (top, right,
/// bottom, left), then along the border in walking direction.
fn cw_order(a: &Intersection, b: &Intersection) -> Ordering {
    if a.border_index != b.border_index {
        return a.border_index.cmp(&b.border_index);
    }

    let along = match a.border_index {
        0 => a.point.lon.partial_cmp(&b.point.lon), // top: west to east
        1 => b.point.lat.partial_cmp(&a.point.lat), // right: north to south
        2 => b.point.lon.partial_cmp(&a.point.lon), // bottom: east to west
        _ => a.point.lat.partial_cmp(&b.point.lat), // left: south to north
    };

    along.unwrap_or(Ordering::Equal)
}

/// Whether `b` lies no further along the clockwise walk of `border` than
/// where a walk starting at `a` would immediately reach it without passing
/// a corner.
fn is_left_on_same_border(border: u8, a: &GeoCoord, b: &GeoCoord) -> bool {
    match border {
        0 => b.lon >= a.lon,
        1 => b.lat <= a.lat,
        2 => b.lon <= a.lon,
        _ => b.lat >= a.lat,
    }
}

/// Per-cell walk state. `arena` owns every intersection (border crossings
/// first, synthetic tripoint hops appended later); `cw` lists the border
/// crossings in clockwise order by arena id.
struct CellWalk {
    bounds: CellBoundaries,
    arena: Vec<Intersection>,
    cw: Vec<usize>,
    visited: HashSet<usize>,
}

fn get_next_cw(walk: &CellWalk, current: usize) -> Option<usize> {
    let position = walk.cw.iter().position(|&id| id == current)?;
    Some(walk.cw[(position + 1) % walk.cw.len()])
}

/// Finds the matching exit for an entry intersection (or entry for an
/// exit) on the same coastline: the nearest one downstream by way point
/// index. Area coastlines may wrap around the ring seam if the forward
/// half holds no match.
fn find_sibling_intersection(
    walk: &CellWalk,
    intersection_id: usize,
    is_area: bool,
) -> Option<usize> {
    let intersection = walk.arena[intersection_id];
    let search = if intersection.direction == Direction::In {
        Direction::Out
    } else {
        Direction::In
    };

    let candidates: Vec<usize> = walk
        .cw
        .iter()
        .copied()
        .filter(|&id| {
            let other = &walk.arena[id];
            other.coastline == intersection.coastline && other.direction == search
        })
        .collect();

    let mut result: Option<usize> = None;

    for &id in &candidates {
        let other = &walk.arena[id];
        if intersection.direction == Direction::In {
            if other.prev_way_point_index >= intersection.prev_way_point_index
                && result.map_or(true, |r| {
                    other.prev_way_point_index < walk.arena[r].prev_way_point_index
                })
            {
                result = Some(id);
            }
        } else if other.prev_way_point_index <= intersection.prev_way_point_index
            && result.map_or(true, |r| {
                other.prev_way_point_index > walk.arena[r].prev_way_point_index
            })
        {
            result = Some(id);
        }
    }

    if result.is_some() || !is_area {
        return result;
    }

    // Wrap-around half for areas.
    for &id in &candidates {
        let other = &walk.arena[id];
        if intersection.direction == Direction::In {
            if other.prev_way_point_index <= intersection.prev_way_point_index
                && result.map_or(true, |r| {
                    other.prev_way_point_index < walk.arena[r].prev_way_point_index
                })
            {
                result = Some(id);
            }
        } else if other.prev_way_point_index >= intersection.prev_way_point_index
            && result.map_or(true, |r| {
                other.prev_way_point_index > walk.arena[r].prev_way_point_index
            })
        {
            result = Some(id);
        }
    }

    result
}

/// Appends the coastline stretch between two intersections of the same
/// coastline, walking against point order.
fn walk_path_back(
    tile: &mut GroundTile,
    state_map: &StateMap,
    cell_min_lat: f64,
    cell_min_lon: f64,
    path_start: &Intersection,
    path_end: &Intersection,
    points: &[GeoCoord],
    is_area: bool,
) {
    if let Some(last) = tile.coords.last_mut() {
        last.coast = true;
    }

    if is_area {
        if path_start.prev_way_point_index == path_end.prev_way_point_index
            && path_start.distance_square > path_end.distance_square
        {
            tile.coords
                .push(transform(&path_end.point, state_map, cell_min_lat, cell_min_lon, false));
        } else {
            let mut idx = path_start.prev_way_point_index;
            let mut target = path_end.prev_way_point_index + 1;
            if target == points.len() {
                target = 0;
            }

            while idx != target {
                tile.coords
                    .push(transform(&points[idx], state_map, cell_min_lat, cell_min_lon, true));
                idx = if idx == 0 { points.len() - 1 } else { idx - 1 };
            }
            tile.coords
                .push(transform(&points[idx], state_map, cell_min_lat, cell_min_lon, true));

            tile.coords
                .push(transform(&path_end.point, state_map, cell_min_lat, cell_min_lon, false));
        }
    } else {
        let target = path_end.prev_way_point_index + 1;
        for idx in (target..=path_start.prev_way_point_index).rev() {
            tile.coords
                .push(transform(&points[idx], state_map, cell_min_lat, cell_min_lon, true));
        }
        tile.coords
            .push(transform(&path_end.point, state_map, cell_min_lat, cell_min_lon, false));
    }
}

/// Appends the coastline stretch between two intersections of the same
/// coastline, walking in point order.
fn walk_path_forward(
    tile: &mut GroundTile,
    state_map: &StateMap,
    cell_min_lat: f64,
    cell_min_lon: f64,
    path_start: &Intersection,
    path_end: &Intersection,
    points: &[GeoCoord],
    is_area: bool,
) {
    if let Some(last) = tile.coords.last_mut() {
        last.coast = true;
    }

    if is_area {
        if path_start.prev_way_point_index == path_end.prev_way_point_index
            && path_start.distance_square < path_end.distance_square
        {
            tile.coords
                .push(transform(&path_end.point, state_map, cell_min_lat, cell_min_lon, false));
        } else {
            let mut idx = path_start.prev_way_point_index + 1;
            let mut target = path_end.prev_way_point_index;
            if target == points.len() {
                target = 0;
            }

            while idx != target {
                tile.coords
                    .push(transform(&points[idx], state_map, cell_min_lat, cell_min_lon, true));
                idx = if idx >= points.len() - 1 { 0 } else { idx + 1 };
            }
            tile.coords
                .push(transform(&points[idx], state_map, cell_min_lat, cell_min_lon, true));

            tile.coords
                .push(transform(&path_end.point, state_map, cell_min_lat, cell_min_lon, false));
        }
    } else {
        for idx in path_start.prev_way_point_index + 1..=path_end.prev_way_point_index {
            tile.coords
                .push(transform(&points[idx], state_map, cell_min_lat, cell_min_lon, true));
        }
        tile.coords
            .push(transform(&path_end.point, state_map, cell_min_lat, cell_min_lon, false));
    }
}

fn walk_path(
    tile: &mut GroundTile,
    state_map: &StateMap,
    bounds: &CellBoundaries,
    path_start: &Intersection,
    path_end: &Intersection,
    points: &[GeoCoord],
    is_area: bool,
) {
    if path_start.direction == Direction::Out {
        walk_path_back(
            tile,
            state_map,
            bounds.lat_min,
            bounds.lon_min,
            path_start,
            path_end,
            points,
            is_area,
        );
    } else {
        walk_path_forward(
            tile,
            state_map,
            bounds.lat_min,
            bounds.lon_min,
            path_start,
            path_end,
            points,
            is_area,
        );
    }
}

/// Walks the cell border clockwise from `incoming` to `outgoing`, emitting
/// every corner strictly between them, then the outgoing point itself.
fn walk_border_cw(
    tile: &mut GroundTile,
    state_map: &StateMap,
    bounds: &CellBoundaries,
    incoming: &Intersection,
    outgoing: &Intersection,
) {
    if outgoing.border_index != incoming.border_index
        || !is_left_on_same_border(incoming.border_index, &incoming.point, &outgoing.point)
    {
        let mut border_point = (incoming.border_index as usize + 1) % 4;
        let end_border_point = outgoing.border_index as usize;

        while border_point != end_border_point {
            tile.coords.push(bounds.border_coords[border_point]);
            border_point = (border_point + 1) % 4;
        }
        tile.coords.push(bounds.border_coords[border_point]);
    }

    tile.coords.push(transform(
        &outgoing.point,
        state_map,
        bounds.lat_min,
        bounds.lon_min,
        false,
    ));
}

/// Hops across a tripoint: the current coastline ended inside the cell, so
/// among all other coastlines sharing that endpoint with a matching side
/// state, pick the most clockwise limb and continue the walk along it.
///
/// On success `path_start_id` moves onto the chosen limb and, if the limb
/// leaves the cell, `path_end_id` receives its border crossing.
#[allow(clippy::too_many_arguments)]
fn walk_from_tripoint(
    walk: &mut CellWalk,
    data: &Data,
    state_map: &StateMap,
    tile: &mut GroundTile,
    path_start_id: &mut usize,
    path_end_id: &mut Option<usize>,
    containing_paths: &[usize],
    stats: &mut WalkStats,
) -> bool {
    let path_start = walk.arena[*path_start_id];
    let coastline = &data.coastlines[path_start.coastline];

    if coastline.points.len() < 2 {
        return false;
    }

    let (tripoint, previous_point, walk_type) = if path_start.direction == Direction::In {
        (
            coastline.points[coastline.points.len() - 1],
            coastline.points[coastline.points.len() - 2],
            coastline.right,
        )
    } else {
        (coastline.points[0], coastline.points[1], coastline.left)
    };

    let mut candidates: Vec<usize> = walk
        .cw
        .iter()
        .map(|&id| walk.arena[id].coastline)
        .collect();
    candidates.extend_from_slice(containing_paths);

    struct Chosen {
        outgoing: Intersection,
        end: Intersection,
        end_existing: Option<usize>,
        coastline: usize,
        angle: f64,
    }

    let mut chosen: Option<Chosen> = None;

    for &path_index in &candidates {
        if path_index == path_start.coastline {
            continue;
        }

        let path = &data.coastlines[path_index];
        if path.points.len() < 2 {
            continue;
        }

        let front = path.points[0];
        let back = path.points[path.points.len() - 1];

        if tripoint != front && tripoint != back {
            continue;
        }

        let direction = if tripoint == front {
            Direction::Out
        } else {
            Direction::In
        };

        if (direction == Direction::Out && walk_type != path.right)
            || (direction == Direction::In && walk_type != path.left)
        {
            continue;
        }

        let previous_out = if direction == Direction::Out {
            path.points[1]
        } else {
            path.points[path.points.len() - 2]
        };

        // Oriented turn from the incoming limb to this one; the smallest
        // value is the most clockwise turn.
        let angle = (tripoint.lon - previous_point.lon) * (previous_out.lat - tripoint.lat)
            - (tripoint.lat - previous_point.lat) * (previous_out.lon - tripoint.lon);

        if chosen.as_ref().map_or(true, |c| angle < c.angle) {
            let outgoing = Intersection {
                coastline: path_index,
                prev_way_point_index: if direction == Direction::In {
                    path.points.len() - 1
                } else {
                    0
                },
                point: tripoint,
                distance_square: 0.0,
                border_index: 0,
                direction: if direction == Direction::In {
                    Direction::Out
                } else {
                    Direction::In
                },
            };

            // Nearest border crossing of the limb in its walking direction.
            let mut cell_hit: Option<usize> = None;
            for &cid in &walk.cw {
                let candidate = walk.arena[cid];
                if candidate.coastline != path_index {
                    continue;
                }

                match cell_hit {
                    None => cell_hit = Some(cid),
                    Some(current_id) => {
                        let current = walk.arena[current_id];
                        let better = if direction == Direction::Out {
                            candidate.prev_way_point_index < current.prev_way_point_index
                                || (candidate.prev_way_point_index
                                    == current.prev_way_point_index
                                    && candidate.distance_square < current.distance_square)
                        } else {
                            candidate.prev_way_point_index > current.prev_way_point_index
                                || (candidate.prev_way_point_index
                                    == current.prev_way_point_index
                                    && candidate.distance_square > current.distance_square)
                        };
                        if better {
                            cell_hit = Some(cid);
                        }
                    }
                }
            }

            let (end, end_existing) = match cell_hit {
                Some(cid) => (walk.arena[cid], Some(cid)),
                None => (
                    Intersection {
                        coastline: path_index,
                        prev_way_point_index: if direction == Direction::In {
                            0
                        } else {
                            path.points.len() - 1
                        },
                        point: if direction == Direction::In { front } else { back },
                        distance_square: 0.0,
                        border_index: 0,
                        direction,
                    },
                    None,
                ),
            };

            chosen = Some(Chosen {
                outgoing,
                end,
                end_existing,
                coastline: path_index,
                angle,
            });
        }
    }

    let Some(chosen) = chosen else {
        return false;
    };

    if chosen.outgoing.direction == chosen.end.direction {
        stats.tripoint_direction_conflicts += 1;
        return false;
    }

    if let Some(end_id) = chosen.end_existing {
        *path_end_id = Some(end_id);
    }

    walk_path(
        tile,
        state_map,
        &walk.bounds,
        &chosen.outgoing,
        &chosen.end,
        &data.coastlines[chosen.coastline].points,
        data.coastlines[chosen.coastline].is_area,
    );

    let outgoing_id = walk.arena.len();
    walk.arena.push(chosen.outgoing);
    *path_start_id = outgoing_id;

    true
}

/// Walks one complete tile boundary clockwise starting at a border
/// intersection. Returns false when the walk cannot be closed.
fn walk_boundary_cw(
    walk: &mut CellWalk,
    data: &Data,
    state_map: &StateMap,
    tile: &mut GroundTile,
    start_id: usize,
    containing_paths: &[usize],
    stats: &mut WalkStats,
) -> bool {
    let start = walk.arena[start_id];
    tile.coords.push(transform(
        &start.point,
        state_map,
        walk.bounds.lat_min,
        walk.bounds.lon_min,
        false,
    ));

    let mut path_start_id = start_id;
    let mut step = 0usize;

    loop {
        walk.visited.insert(path_start_id);

        let path_start = walk.arena[path_start_id];
        let coastline_index = path_start.coastline;
        let is_area = data.coastlines[coastline_index].is_area;

        let path_end_id = match find_sibling_intersection(walk, path_start_id, is_area) {
            Some(end_id) => {
                let path_end = walk.arena[end_id];
                walk_path(
                    tile,
                    state_map,
                    &walk.bounds,
                    &path_start,
                    &path_end,
                    &data.coastlines[coastline_index].points,
                    is_area,
                );
                end_id
            }
            None => {
                // The coastline ends inside the cell: walk to its end and
                // continue across the tripoint there.
                let points = &data.coastlines[coastline_index].points;
                let (tripoint, end_index) = if path_start.direction == Direction::In {
                    (points[points.len() - 1], points.len() - 1)
                } else {
                    (points[0], 0)
                };

                let end = Intersection {
                    coastline: coastline_index,
                    prev_way_point_index: end_index,
                    point: tripoint,
                    distance_square: 0.0,
                    border_index: 0,
                    direction: if path_start.direction == Direction::In {
                        Direction::Out
                    } else {
                        Direction::In
                    },
                };

                walk_path(tile, state_map, &walk.bounds, &path_start, &end, points, is_area);

                let mut found: Option<usize> = None;
                while found.is_none() {
                    if is_area {
                        // An area cannot take part in a tripoint.
                        return false;
                    }

                    if !walk_from_tripoint(
                        walk,
                        data,
                        state_map,
                        tile,
                        &mut path_start_id,
                        &mut found,
                        containing_paths,
                        stats,
                    ) {
                        return false;
                    }

                    step += 1;
                    if step > MAX_WALK_STEPS {
                        warn!("Too many steps in tripoint chase, giving up");
                        return false;
                    }
                }

                match found {
                    Some(end_id) => end_id,
                    None => return false,
                }
            }
        };

        step += 1;
        if step > MAX_WALK_STEPS {
            warn!("Too many steps walking cell boundary, giving up");
            return false;
        }

        let Some(next_id) = get_next_cw(walk, path_end_id) else {
            warn!("Cell border walk lost its position");
            return false;
        };

        let incoming = walk.arena[path_end_id];
        let outgoing = walk.arena[next_id];
        walk_border_cw(tile, state_map, &walk.bounds, &incoming, &outgoing);

        path_start_id = next_id;
        if path_start_id == start_id {
            break;
        }
    }

    true
}

/// Builds all ground tiles of one cell from the coastlines crossing it.
pub fn handle_coastline_cell(
    state_map: &StateMap,
    data: &Data,
    cell: Pixel,
    coastline_indices: &[usize],
    stats: &mut WalkStats,
) -> Vec<GroundTile> {
    let mut arena: Vec<Intersection> = Vec::new();

    for &index in coastline_indices {
        match data.coastlines[index].cell_intersections.get(&cell) {
            Some(list) => arena.extend_from_slice(list),
            None => debug_assert!(false, "coastline {} filed under cell {:?} without intersections", index, cell),
        }
    }

    let mut cw: Vec<usize> = (0..arena.len()).collect();
    cw.sort_by(|&a, &b| cw_order(&arena[a], &arena[b]));

    // Paths fully contained in the cell can still be tripoint limbs.
    let containing_paths: Vec<usize> = data
        .cell_covered_coastlines
        .get(&cell)
        .map(|list| {
            list.iter()
                .copied()
                .filter(|&i| {
                    !data.coastlines[i].is_area && data.coastlines[i].is_completely_in_cell
                })
                .collect()
        })
        .unwrap_or_default();

    let mut walk = CellWalk {
        bounds: CellBoundaries::new(state_map, cell),
        arena,
        cw,
        visited: HashSet::new(),
    };

    let mut tiles = Vec::new();

    for id in walk.cw.clone() {
        let intersection = walk.arena[id];

        if intersection.direction == Direction::Touch {
            continue;
        }
        if walk.visited.contains(&id) {
            continue;
        }

        let coastline = &data.coastlines[intersection.coastline];
        let coast_state = if intersection.direction == Direction::In {
            coastline.right
        } else {
            coastline.left
        };

        if coast_state == CoastState::Undefined {
            warn!(
                "Coastline {} enters cell {:?} with an undefined side state",
                coastline.id, cell
            );
            continue;
        }

        let tile_type = match coast_state {
            CoastState::Land => TileType::Land,
            CoastState::Water => TileType::Water,
            _ => TileType::Unknown,
        };

        let mut tile = GroundTile::new(tile_type);

        if !walk_boundary_cw(
            &mut walk,
            data,
            state_map,
            &mut tile,
            id,
            &containing_paths,
            stats,
        ) {
            warn!("Can't walk around cell boundary in cell {:?}", cell);
            stats.aborted_walks += 1;
            continue;
        }

        if tile.coords.len() < 3 {
            warn!(
                "Dropping degenerate ground tile with {} vertices in cell {:?}",
                tile.coords.len(),
                cell
            );
            stats.degenerate_tiles += 1;
            continue;
        }

        tiles.push(tile);
    }

    tiles
}

/// Emits one tile per area coastline confined to a single cell: the whole
/// transformed ring, every vertex on coast except the closing one.
pub fn handle_area_coastlines_completely_in_a_cell(
    state_map: &StateMap,
    data: &Data,
    cell_ground_tile_map: &mut BTreeMap<Pixel, Vec<GroundTile>>,
) {
    for coastline in &data.coastlines {
        if !(coastline.is_area && coastline.is_completely_in_cell) {
            continue;
        }

        if !state_map.is_in_absolute(coastline.cell.x, coastline.cell.y) {
            continue;
        }

        let coord = Pixel::new(
            coastline.cell.x - state_map.x_start(),
            coastline.cell.y - state_map.y_start(),
        );

        let tile_type = match coastline.left {
            CoastState::Unknown => TileType::Unknown,
            // Should not happen on Earth, but the data may say so.
            CoastState::Water => TileType::Water,
            _ => TileType::Land,
        };

        let cell_min_lat = state_map.cell_height() * f64::from(coastline.cell.y) - 90.0;
        let cell_min_lon = state_map.cell_width() * f64::from(coastline.cell.x) - 180.0;

        let mut tile = GroundTile::new(tile_type);
        tile.coords = coastline
            .points
            .iter()
            .map(|p| transform(p, state_map, cell_min_lat, cell_min_lon, true))
            .collect();

        if let Some(last) = tile.coords.last_mut() {
            last.coast = false;
        }

        if !tile.coords.is_empty() {
            cell_ground_tile_map.entry(coord).or_default().push(tile);
        }
    }
}

/// Walks every cell with coastline crossings and collects the resulting
/// tiles into the cell ground tile map.
pub fn handle_coastlines_partially_in_a_cell(
    state_map: &StateMap,
    data: &Data,
    cell_ground_tile_map: &mut BTreeMap<Pixel, Vec<GroundTile>>,
    stats: &mut WalkStats,
) {
    for (cell, indices) in &data.cell_coastlines {
        let tiles = handle_coastline_cell(state_map, data, *cell, indices, stats);

        if !tiles.is_empty() {
            cell_ground_tile_map
                .entry(*cell)
                .or_default()
                .extend(tiles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coastline::calculate_coastline_data;
    use crate::projection::PixelProjection;
    use crate::simplify::OptimizeMethod;
    use crate::types::{Coast, GeoBox};

    fn test_map() -> StateMap {
        StateMap::new(GeoBox::new(0.5, 0.5, 3.5, 3.5), 1.0, 1.0)
    }

    fn build_data(state_map: &StateMap, coasts: &[Coast]) -> Data {
        calculate_coastline_data(
            state_map,
            coasts,
            OptimizeMethod::None,
            1.0,
            0.0,
            &PixelProjection::for_level(10),
        )
    }

    #[test]
    fn test_cw_order_around_cell() {
        let top = Intersection {
            coastline: 0,
            prev_way_point_index: 0,
            point: GeoCoord::new(2.0, 1.5),
            distance_square: 0.0,
            border_index: 0,
            direction: Direction::In,
        };
        let right = Intersection {
            border_index: 1,
            point: GeoCoord::new(1.5, 2.0),
            ..top
        };
        let bottom_east = Intersection {
            border_index: 2,
            point: GeoCoord::new(1.0, 1.8),
            ..top
        };
        let bottom_west = Intersection {
            border_index: 2,
            point: GeoCoord::new(1.0, 1.2),
            ..top
        };

        let mut list = vec![bottom_west, right, top, bottom_east];
        list.sort_by(cw_order);

        assert_eq!(list[0].border_index, 0);
        assert_eq!(list[1].border_index, 1);
        // On the bottom border the walk runs east to west.
        assert_eq!(list[2].point.lon, 1.8);
        assert_eq!(list[3].point.lon, 1.2);
    }

    #[test]
    fn test_is_left_on_same_border() {
        let a = GeoCoord::new(2.0, 1.2);
        let b = GeoCoord::new(2.0, 1.8);
        // Top border runs west to east.
        assert!(is_left_on_same_border(0, &a, &b));
        assert!(!is_left_on_same_border(0, &b, &a));
        // Bottom border runs east to west.
        assert!(is_left_on_same_border(2, &b, &a));
        assert!(!is_left_on_same_border(2, &a, &b));
    }

    #[test]
    fn test_straight_coastline_splits_cell() {
        let state_map = test_map();
        // Through the middle of cell (1, 1), land north, water south.
        let coast = Coast {
            id: 1,
            points: vec![GeoCoord::new(1.5, 0.2), GeoCoord::new(1.5, 3.8)],
            is_area: false,
            left: CoastState::Land,
            right: CoastState::Water,
        };

        let data = build_data(&state_map, &[coast]);
        let mut stats = WalkStats::default();

        let cell = Pixel::new(1, 1);
        let tiles = handle_coastline_cell(
            &state_map,
            &data,
            cell,
            &data.cell_coastlines[&cell],
            &mut stats,
        );

        assert_eq!(tiles.len(), 2);
        assert_eq!(stats.aborted_walks, 0);

        let land: Vec<_> = tiles
            .iter()
            .filter(|t| t.tile_type == TileType::Land)
            .collect();
        let water: Vec<_> = tiles
            .iter()
            .filter(|t| t.tile_type == TileType::Water)
            .collect();
        assert_eq!(land.len(), 1);
        assert_eq!(water.len(), 1);

        // The land tile covers the north half: both top corners present,
        // no bottom corner.
        let top_left = CellCoord::new(0, CELL_MAX, false);
        let top_right = CellCoord::new(CELL_MAX, CELL_MAX, false);
        let bottom_left = CellCoord::new(0, 0, false);
        let bottom_right = CellCoord::new(CELL_MAX, 0, false);

        assert!(land[0].coords.iter().any(|c| c.same_position(&top_left)));
        assert!(land[0].coords.iter().any(|c| c.same_position(&top_right)));
        assert!(!land[0].coords.iter().any(|c| c.same_position(&bottom_left)));

        assert!(water[0].coords.iter().any(|c| c.same_position(&bottom_left)));
        assert!(water[0]
            .coords
            .iter()
            .any(|c| c.same_position(&bottom_right)));
        assert!(!water[0].coords.iter().any(|c| c.same_position(&top_left)));

        // Both tiles close back onto their starting point.
        for tile in &tiles {
            assert!(tile.coords.len() >= 4);
            assert!(tile.coords.first().unwrap().same_position(tile.coords.last().unwrap()));
        }

        // The crossing points themselves lie on the coastline.
        assert!(land[0].coords.iter().any(|c| c.coast));
        assert!(water[0].coords.iter().any(|c| c.coast));
    }

    #[test]
    fn test_island_ring_tile() {
        let state_map = test_map();
        let island = Coast {
            id: 5,
            points: vec![
                GeoCoord::new(1.7, 1.5),
                GeoCoord::new(1.5, 1.7),
                GeoCoord::new(1.3, 1.5),
                GeoCoord::new(1.5, 1.3),
            ],
            is_area: true,
            left: CoastState::Land,
            right: CoastState::Water,
        };

        let data = build_data(&state_map, &[island]);
        let mut tile_map = BTreeMap::new();

        handle_area_coastlines_completely_in_a_cell(&state_map, &data, &mut tile_map);

        let tiles = &tile_map[&Pixel::new(1, 1)];
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].tile_type, TileType::Land);
        // Closed simplified ring: 5 points, all but the last on coast.
        assert_eq!(tiles[0].coords.len(), 5);
        assert!(tiles[0].coords[..4].iter().all(|c| c.coast));
        assert!(!tiles[0].coords[4].coast);
    }

    #[test]
    fn test_tripoint_partition() {
        let state_map = test_map();
        // Three ways meeting at the center of cell (1, 1): land west,
        // water east, water north.
        let stem = Coast {
            id: 1,
            points: vec![GeoCoord::new(0.9, 1.5), GeoCoord::new(1.5, 1.5)],
            is_area: false,
            left: CoastState::Land,
            right: CoastState::Water,
        };
        let west_branch = Coast {
            id: 2,
            points: vec![GeoCoord::new(1.5, 1.5), GeoCoord::new(1.5, 0.9)],
            is_area: false,
            left: CoastState::Land,
            right: CoastState::Water,
        };
        let east_branch = Coast {
            id: 3,
            points: vec![GeoCoord::new(1.5, 1.5), GeoCoord::new(1.5, 2.1)],
            is_area: false,
            left: CoastState::Water,
            right: CoastState::Water,
        };

        let data = build_data(&state_map, &[stem, west_branch, east_branch]);
        let mut stats = WalkStats::default();

        let cell = Pixel::new(1, 1);
        let tiles = handle_coastline_cell(
            &state_map,
            &data,
            cell,
            &data.cell_coastlines[&cell],
            &mut stats,
        );

        assert_eq!(tiles.len(), 3, "three regions around the tripoint");
        assert_eq!(stats.aborted_walks, 0);

        let water_tiles = tiles
            .iter()
            .filter(|t| t.tile_type == TileType::Water)
            .count();
        let land_tiles = tiles
            .iter()
            .filter(|t| t.tile_type == TileType::Land)
            .count();
        assert_eq!(water_tiles, 2);
        assert_eq!(land_tiles, 1);

        // Every corner of the cell is covered by exactly one tile.
        for corner in CellBoundaries::new(&state_map, cell).border_coords {
            let owners = tiles
                .iter()
                .filter(|t| t.coords.iter().any(|c| c.same_position(&corner)))
                .count();
            assert_eq!(owners, 1, "corner {:?}", corner);
        }
    }
}
