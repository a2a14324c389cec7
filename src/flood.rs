//! State propagation over the cell bitmap: marking coast cells, inferring
//! the cells around them, flooding water, filling land and patching
//! islands.

use std::collections::BTreeMap;

use log::info;

use crate::cells::get_cells;
use crate::coastline::Data;
use crate::geometry::{is_area_at_least_partly_in_area, is_coord_in_area};
use crate::state_map::StateMap;
use crate::types::{
    CellCoord, Coast, CoastState, GeoCoord, GroundTile, Pixel, State, TileType, CELL_MAX,
};
use crate::walker::CellBoundaries;

/// Marks every still-unknown cell touched by a coastline as coast.
pub fn mark_coastline_cells(state_map: &mut StateMap, data: &Data) {
    info!("Marking cells containing coastlines");

    for coastline in &data.coastlines {
        for coord in get_cells(state_map, &coastline.points) {
            if state_map.is_in_absolute(coord.x, coord.y)
                && state_map.get_state_absolute(coord.x, coord.y) == State::Unknown
            {
                state_map.set_state_absolute(coord.x, coord.y, State::Coast);
            }
        }
    }
}

/// Paints the interior of multi-cell area coastlines onto still-unknown
/// cells, by cell center. This is what gives regions whose boundary never
/// crosses the map (a bounding polygon larger than the indexed box, or
/// one enclosing whole rows of cells) their land or water interior.
pub fn seed_area_interiors(state_map: &mut StateMap, data: &Data) {
    for coastline in &data.coastlines {
        if !coastline.is_area || coastline.is_completely_in_cell {
            continue;
        }

        let target = match coastline.left {
            CoastState::Land => State::Land,
            CoastState::Water => State::Water,
            _ => continue,
        };

        for y in 0..state_map.y_count() {
            for x in 0..state_map.x_count() {
                if state_map.get_state(x, y) != State::Unknown {
                    continue;
                }

                let center = GeoCoord::new(
                    (f64::from(state_map.y_start() + y) + 0.5) * state_map.cell_height() - 90.0,
                    (f64::from(state_map.x_start() + x) + 0.5) * state_map.cell_width() - 180.0,
                );

                if is_coord_in_area(&center, &coastline.points) {
                    state_map.set_state(x, y, target);
                }
            }
        }
    }
}

/// Infers the state of unknown cells directly around coast cells from
/// ground tiles that fill a complete cell border.
pub fn calculate_coast_environment(
    state_map: &mut StateMap,
    cell_ground_tile_map: &BTreeMap<Pixel, Vec<GroundTile>>,
) {
    info!("Calculating coast cell environment");

    for (coord, tiles) in cell_ground_tile_map {
        // Neighbour states: top, right, bottom, left.
        let mut state = [State::Unknown; 4];

        if coord.y < state_map.y_count() - 1 {
            state[0] = state_map.get_state(coord.x, coord.y + 1);
        }
        if coord.x < state_map.x_count() - 1 {
            state[1] = state_map.get_state(coord.x + 1, coord.y);
        }
        if coord.y > 0 {
            state[2] = state_map.get_state(coord.x, coord.y - 1);
        }
        if coord.x > 0 {
            state[3] = state_map.get_state(coord.x - 1, coord.y);
        }

        for tile in tiles {
            let tile_state = match tile.tile_type {
                TileType::Land => State::Land,
                TileType::Water => State::Water,
                _ => State::Unknown,
            };

            for pair in tile.coords.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                let cell_max = CELL_MAX;

                // A run from the top-left corner to the top-right corner
                // fills the whole top border, so whatever this tile is
                // continues into the cell above; likewise for the other
                // three borders.
                if a.x == 0 && a.y == cell_max && b.x == cell_max && b.y == cell_max {
                    if state[0] == State::Unknown {
                        state[0] = tile_state;
                    }
                }
                if a.x == cell_max && a.y == cell_max && b.x == cell_max && b.y == 0 {
                    if state[1] == State::Unknown {
                        state[1] = tile_state;
                    }
                }
                if a.x == cell_max && a.y == 0 && b.x == 0 && b.y == 0 {
                    if state[2] == State::Unknown {
                        state[2] = tile_state;
                    }
                }
                if a.x == 0 && a.y == 0 && b.x == 0 && b.y == cell_max {
                    if state[3] == State::Unknown {
                        state[3] = tile_state;
                    }
                }
            }
        }

        if coord.y < state_map.y_count() - 1
            && state_map.get_state(coord.x, coord.y + 1) == State::Unknown
            && state[0] != State::Unknown
        {
            state_map.set_state(coord.x, coord.y + 1, state[0]);
        }
        if coord.x < state_map.x_count() - 1
            && state_map.get_state(coord.x + 1, coord.y) == State::Unknown
            && state[1] != State::Unknown
        {
            state_map.set_state(coord.x + 1, coord.y, state[1]);
        }
        if coord.y > 0
            && state_map.get_state(coord.x, coord.y - 1) == State::Unknown
            && state[2] != State::Unknown
        {
            state_map.set_state(coord.x, coord.y - 1, state[2]);
        }
        if coord.x > 0
            && state_map.get_state(coord.x - 1, coord.y) == State::Unknown
            && state[3] != State::Unknown
        {
            state_map.set_state(coord.x - 1, coord.y, state[3]);
        }
    }
}

fn is_cell_in_bounding_polygon(bounds: &CellBoundaries, bounding_polygons: &[Coast]) -> bool {
    if bounding_polygons.is_empty() {
        return true;
    }

    bounding_polygons
        .iter()
        .any(|polygon| is_area_at_least_partly_in_area(&bounds.border_points, &polygon.points))
}

/// Floods water from every water cell into unknown 4-neighbours, for
/// `tile_count` rounds. A neighbour outside every bounding polygon stays
/// unknown. Each round reads a snapshot, so the flood advances one ring
/// per round.
pub fn fill_water(
    state_map: &mut StateMap,
    tile_count: usize,
    bounding_polygons: &[Coast],
) {
    info!("Filling water");

    for _ in 0..tile_count {
        let snapshot = state_map.clone();

        for y in 0..snapshot.y_count() {
            for x in 0..snapshot.x_count() {
                if snapshot.get_state(x, y) != State::Water {
                    continue;
                }

                let mut neighbours: [Option<Pixel>; 4] = [None; 4];
                if y > 0 {
                    neighbours[0] = Some(Pixel::new(x, y - 1));
                }
                if y < snapshot.y_count() - 1 {
                    neighbours[1] = Some(Pixel::new(x, y + 1));
                }
                if x > 0 {
                    neighbours[2] = Some(Pixel::new(x - 1, y));
                }
                if x < snapshot.x_count() - 1 {
                    neighbours[3] = Some(Pixel::new(x + 1, y));
                }

                for neighbour in neighbours.into_iter().flatten() {
                    if snapshot.get_state(neighbour.x, neighbour.y) != State::Unknown {
                        continue;
                    }

                    if !is_cell_in_bounding_polygon(
                        &CellBoundaries::new(state_map, neighbour),
                        bounding_polygons,
                    ) {
                        continue;
                    }

                    state_map.set_state(neighbour.x, neighbour.y, State::Water);
                }
            }
        }
    }
}

fn contains_coord_of_type(tiles: &[GroundTile], coord: &CellCoord, tile_type: TileType) -> bool {
    tiles
        .iter()
        .filter(|tile| tile.tile_type == tile_type)
        .any(|tile| tile.coords.iter().any(|c| c.same_position(coord)))
}

fn contains_coord(tiles: &[GroundTile], coord: &CellCoord) -> bool {
    tiles
        .iter()
        .any(|tile| tile.coords.iter().any(|c| c.same_position(coord)))
}

fn contains_water(
    coord: Pixel,
    state_map: &StateMap,
    cell_ground_tile_map: &BTreeMap<Pixel, Vec<GroundTile>>,
    test_coord1: &CellCoord,
    test_coord2: &CellCoord,
) -> bool {
    if coord.x >= state_map.x_count() || coord.y >= state_map.y_count() {
        return false;
    }

    if state_map.get_state(coord.x, coord.y) == State::Water {
        return true;
    }

    match cell_ground_tile_map.get(&coord) {
        Some(tiles) => {
            contains_coord_of_type(tiles, test_coord1, TileType::Water)
                || contains_coord_of_type(tiles, test_coord2, TileType::Water)
        }
        None => false,
    }
}

/// Cells whose tiles are pure interior islands (no tile reaches any cell
/// corner) sit in open water: when a neighbouring cell carries water on
/// the shared border, a full-cell water tile is prepended as background.
pub fn fill_water_around_island(
    state_map: &StateMap,
    cell_ground_tile_map: &mut BTreeMap<Pixel, Vec<GroundTile>>,
    bounding_polygons: &[Coast],
) {
    info!("Filling water around islands");

    // Cells processed in map order; a background fill becomes visible to
    // the probes of the cells after it.
    let cells: Vec<Pixel> = cell_ground_tile_map.keys().copied().collect();

    for coord in cells {
        let Some(tiles) = cell_ground_tile_map.get(&coord) else {
            continue;
        };
        let bounds = CellBoundaries::new(state_map, coord);

        if contains_coord(tiles, &bounds.border_coords[0])
            || contains_coord(tiles, &bounds.border_coords[1])
            || contains_coord(tiles, &bounds.border_coords[2])
            || contains_coord(tiles, &bounds.border_coords[3])
        {
            continue;
        }
        // Tiles exist but no cell corner is covered: pure island cell.

        if !is_cell_in_bounding_polygon(&bounds, bounding_polygons) {
            continue;
        }

        // Probe each neighbour at the two corners of the shared border, in
        // the neighbour's own coordinate space.
        let mut fill = false;

        if coord.y > 0
            && contains_water(
                Pixel::new(coord.x, coord.y - 1),
                state_map,
                cell_ground_tile_map,
                &bounds.border_coords[0],
                &bounds.border_coords[1],
            )
        {
            fill = true;
        }
        if !fill
            && contains_water(
                Pixel::new(coord.x, coord.y + 1),
                state_map,
                cell_ground_tile_map,
                &bounds.border_coords[2],
                &bounds.border_coords[3],
            )
        {
            fill = true;
        }
        if !fill
            && coord.x > 0
            && contains_water(
                Pixel::new(coord.x - 1, coord.y),
                state_map,
                cell_ground_tile_map,
                &bounds.border_coords[1],
                &bounds.border_coords[2],
            )
        {
            fill = true;
        }
        if !fill
            && contains_water(
                Pixel::new(coord.x + 1, coord.y),
                state_map,
                cell_ground_tile_map,
                &bounds.border_coords[0],
                &bounds.border_coords[3],
            )
        {
            fill = true;
        }

        if fill {
            let mut tile = GroundTile::new(TileType::Water);
            tile.coords.extend_from_slice(&bounds.border_coords);

            // Water background goes underneath the island tiles.
            if let Some(tiles) = cell_ground_tile_map.get_mut(&coord) {
                tiles.insert(0, tile);
            }
        }
    }
}

/// Fills runs of unknown cells enclosed between land and coast-or-land
/// cells, scanning rows west to east and columns south to north until
/// nothing changes anymore.
pub fn fill_land(state_map: &mut StateMap) {
    info!("Filling land");

    let mut changed = true;

    while changed {
        changed = false;

        for y in 0..state_map.y_count() {
            changed |= fill_land_run(state_map, y, true);
        }
        for x in 0..state_map.x_count() {
            changed |= fill_land_run(state_map, x, false);
        }
    }
}

/// One scan line of the land fill: recognizes `land unknown+ (coast|land)`
/// and paints the unknown run as land. `row` selects a row scan (west to
/// east) or a column scan (south to north).
fn fill_land_run(state_map: &mut StateMap, line: u32, row: bool) -> bool {
    let len = if row {
        state_map.x_count()
    } else {
        state_map.y_count()
    };

    let get = |map: &StateMap, i: u32| {
        if row {
            map.get_state(i, line)
        } else {
            map.get_state(line, i)
        }
    };

    let mut changed = false;
    let mut i = 0;
    let mut start = 0;
    let mut end = 0;
    let mut scan_state = 0;

    while i < len {
        match scan_state {
            0 => {
                if get(state_map, i) == State::Land {
                    scan_state = 1;
                }
                i += 1;
            }
            1 => {
                if get(state_map, i) == State::Unknown {
                    scan_state = 2;
                    start = i;
                    end = i;
                    i += 1;
                } else {
                    scan_state = 0;
                }
            }
            _ => {
                let state = get(state_map, i);
                if state == State::Unknown {
                    end = i;
                    i += 1;
                } else if state == State::Coast || state == State::Land {
                    if start <= end {
                        for j in start..=end {
                            if row {
                                state_map.set_state(j, line, State::Land);
                            } else {
                                state_map.set_state(line, j, State::Land);
                            }
                            changed = true;
                        }
                    }
                    scan_state = 0;
                } else {
                    scan_state = 0;
                }
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoBox, CELL_MAX};

    fn test_map() -> StateMap {
        StateMap::new(GeoBox::new(0.5, 0.5, 4.5, 4.5), 1.0, 1.0)
    }

    #[test]
    fn test_fill_land_between_land_and_coast() {
        let mut map = test_map();
        map.set_state(0, 2, State::Land);
        map.set_state(4, 2, State::Coast);

        fill_land(&mut map);

        for x in 1..4 {
            assert_eq!(map.get_state(x, 2), State::Land);
        }
        // Other rows stay untouched.
        assert_eq!(map.get_state(2, 0), State::Unknown);
    }

    #[test]
    fn test_fill_land_is_idempotent_and_monotone() {
        let mut map = test_map();
        map.set_state(0, 2, State::Land);
        map.set_state(4, 2, State::Coast);
        map.set_state(2, 4, State::Water);

        fill_land(&mut map);
        let after_first = map.clone();
        fill_land(&mut map);

        for y in 0..map.y_count() {
            for x in 0..map.x_count() {
                assert_eq!(map.get_state(x, y), after_first.get_state(x, y));
            }
        }
        // Water was never overwritten.
        assert_eq!(map.get_state(2, 4), State::Water);
    }

    #[test]
    fn test_fill_land_open_run_not_filled() {
        let mut map = test_map();
        // Land on the west, nothing terminating the run on the east.
        map.set_state(0, 1, State::Land);

        fill_land(&mut map);

        for x in 1..5 {
            assert_eq!(map.get_state(x, 1), State::Unknown);
        }
    }

    #[test]
    fn test_fill_water_respects_rounds_and_states() {
        let mut map = test_map();
        map.set_state(0, 0, State::Water);
        map.set_state(1, 0, State::Unknown);
        map.set_state(2, 0, State::Land);

        fill_water(&mut map, 1, &[]);

        assert_eq!(map.get_state(1, 0), State::Water);
        assert_eq!(map.get_state(0, 1), State::Water);
        // Land is never flooded.
        assert_eq!(map.get_state(2, 0), State::Land);
        // One round reaches exactly one ring.
        assert_eq!(map.get_state(2, 1), State::Unknown);
    }

    #[test]
    fn test_coast_environment_from_full_border_tile() {
        let mut map = test_map();
        map.set_state(2, 2, State::Coast);

        // A land tile filling the whole top border of cell (2,2) but only
        // part of the right border.
        let mut tile = GroundTile::new(TileType::Land);
        tile.coords = vec![
            CellCoord::new(0, CELL_MAX, false),
            CellCoord::new(CELL_MAX, CELL_MAX, false),
            CellCoord::new(CELL_MAX, 1000, true),
        ];

        let mut tile_map = BTreeMap::new();
        tile_map.insert(Pixel::new(2, 2), vec![tile]);

        calculate_coast_environment(&mut map, &tile_map);

        assert_eq!(map.get_state(2, 3), State::Land);
        // Right border was not fully covered by a run.
        assert_eq!(map.get_state(3, 2), State::Unknown);
    }

    #[test]
    fn test_fill_water_around_island() {
        let mut map = test_map();
        map.set_state(2, 2, State::Coast);
        for (x, y) in [(2, 1), (2, 3), (1, 2), (3, 2)] {
            map.set_state(x, y, State::Water);
        }

        // An island tile not touching any corner.
        let mut island = GroundTile::new(TileType::Land);
        island.coords = vec![
            CellCoord::new(1000, 1000, true),
            CellCoord::new(2000, 1000, true),
            CellCoord::new(1500, 2000, false),
        ];

        let mut tile_map = BTreeMap::new();
        tile_map.insert(Pixel::new(2, 2), vec![island]);

        fill_water_around_island(&map, &mut tile_map, &[]);

        let tiles = &tile_map[&Pixel::new(2, 2)];
        assert_eq!(tiles.len(), 2);
        // The water background was prepended and covers all four corners.
        assert_eq!(tiles[0].tile_type, TileType::Water);
        assert_eq!(tiles[0].coords.len(), 4);
        assert_eq!(tiles[1].tile_type, TileType::Land);
    }

    #[test]
    fn test_island_cell_with_corner_tile_untouched() {
        let map = test_map();

        let mut tile = GroundTile::new(TileType::Land);
        tile.coords = vec![
            CellCoord::new(0, 0, false),
            CellCoord::new(1000, 1000, true),
            CellCoord::new(2000, 1000, true),
        ];

        let mut tile_map = BTreeMap::new();
        tile_map.insert(Pixel::new(2, 2), vec![tile]);

        fill_water_around_island(&map, &mut tile_map, &[]);

        assert_eq!(tile_map[&Pixel::new(2, 2)].len(), 1);
    }
}
