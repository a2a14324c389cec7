//! The per-level build pipeline: synthesize once, then for every zoom
//! level simplify, index, walk, flood and collect the level's state map
//! and ground tiles.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use log::{debug, info};

use crate::coastline::calculate_coastline_data;
use crate::flood::{
    calculate_coast_environment, fill_land, fill_water, fill_water_around_island,
    mark_coastline_cells, seed_area_interiors,
};
use crate::projection::PixelProjection;
use crate::simplify::OptimizeMethod;
use crate::state_map::StateMap;
use crate::synthesize::synthesize_coastlines;
use crate::types::{Coast, GeoBox, GroundTile, Pixel, State};
use crate::walker::{
    handle_area_coastlines_completely_in_a_cell, handle_coastlines_partially_in_a_cell, WalkStats,
};

/// All knobs of a water index build.
#[derive(Debug, Clone)]
pub struct WaterIndexConfig {
    /// Contiguous ascending zoom levels; level `n` uses cells of
    /// `360 / 2^n` by `180 / 2^n` degrees.
    pub levels: Vec<u32>,
    /// Geographic box every level's state map covers.
    pub bounding_box: GeoBox,
    /// Rounds of water flooding.
    pub tile_count: usize,
    /// Minimum projected pixel extent for an island to survive.
    pub min_object_dimension: f64,
    pub optimize: OptimizeMethod,
    /// Simplifier tolerance in projected pixels.
    pub tolerance: f64,
}

impl WaterIndexConfig {
    pub fn new(levels: Vec<u32>, bounding_box: GeoBox) -> Self {
        WaterIndexConfig {
            levels,
            bounding_box,
            tile_count: 20,
            min_object_dimension: 4.0,
            optimize: OptimizeMethod::Quality,
            tolerance: 1.0,
        }
    }
}

/// One resolution of the index: the state map plus the header fields the
/// writer fills in during serialization.
#[derive(Debug, Clone)]
pub struct Level {
    pub level: u32,
    pub state_map: StateMap,
    pub has_cell_data: bool,
    pub default_cell_data: State,
    pub data_offset_bytes: u8,
    pub index_entry_offset: u64,
    pub index_data_offset: u64,
}

impl Level {
    pub fn new(level: u32, bounding_box: GeoBox) -> Self {
        let cell_width = 360.0 / (1u64 << level) as f64;
        let cell_height = 180.0 / (1u64 << level) as f64;
        Level::for_cell_size(level, bounding_box, cell_width, cell_height)
    }

    /// Level with explicit cell dimensions; zoom levels normally derive
    /// them, tests may not want to.
    pub fn for_cell_size(
        level: u32,
        bounding_box: GeoBox,
        cell_width: f64,
        cell_height: f64,
    ) -> Self {
        Level {
            level,
            state_map: StateMap::new(bounding_box, cell_width, cell_height),
            has_cell_data: false,
            default_cell_data: State::Unknown,
            data_offset_bytes: 0,
            index_entry_offset: 0,
            index_data_offset: 0,
        }
    }
}

/// A fully built level: header and state map plus the ground tiles of
/// every coast cell, keyed by map-relative cell index.
#[derive(Debug)]
pub struct LevelData {
    pub level: Level,
    pub tiles: BTreeMap<Pixel, Vec<GroundTile>>,
}

/// Determines the level's default cell state and whether a cell bitmap is
/// needed at all: it is as soon as any tile exists or any cell deviates
/// from the default.
pub fn calculate_has_cell_data(level: &mut Level, tiles: &BTreeMap<Pixel, Vec<GroundTile>>) {
    level.has_cell_data = false;
    level.default_cell_data = State::Unknown;

    if level.state_map.x_count() == 0 || level.state_map.y_count() == 0 {
        return;
    }

    level.default_cell_data = level.state_map.get_state(0, 0);

    if !tiles.is_empty() {
        level.has_cell_data = true;
        return;
    }

    for y in 0..level.state_map.y_count() {
        for x in 0..level.state_map.x_count() {
            if level.state_map.get_state(x, y) != level.default_cell_data {
                level.has_cell_data = true;
                return;
            }
        }
    }
}

/// Drops the duplicated closing point from area rings; the wrap from last
/// back to first is implicit everywhere downstream.
fn normalize_coasts(coasts: &mut Vec<Coast>) {
    for coast in coasts.iter_mut() {
        if coast.is_area && coast.points.len() > 1 && coast.points.first() == coast.points.last()
        {
            coast.points.pop();
        }
    }

    coasts.retain(|coast| coast.points.len() >= 2);
}

/// Reusable build state: synthesizes the coastlines once, then builds any
/// number of levels from them.
pub struct WaterIndexBuilder {
    synthesized: Vec<Coast>,
    bounding_polygons: Vec<Coast>,
    config: WaterIndexConfig,
    stats: WalkStats,
}

impl WaterIndexBuilder {
    pub fn new(
        mut coastlines: Vec<Coast>,
        mut bounding_polygons: Vec<Coast>,
        config: WaterIndexConfig,
    ) -> Result<Self> {
        if config.levels.is_empty() {
            bail!("No levels configured");
        }
        for pair in config.levels.windows(2) {
            if pair[1] != pair[0] + 1 {
                bail!("Levels must form a contiguous ascending range");
            }
        }

        normalize_coasts(&mut coastlines);
        normalize_coasts(&mut bounding_polygons);

        let synthesized = synthesize_coastlines(&coastlines, &bounding_polygons);

        Ok(WaterIndexBuilder {
            synthesized,
            bounding_polygons,
            config,
            stats: WalkStats::default(),
        })
    }

    pub fn config(&self) -> &WaterIndexConfig {
        &self.config
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Runs the whole per-level pipeline for one zoom level.
    pub fn build_level(&mut self, level_value: u32) -> LevelData {
        info!("Building level {}", level_value);

        let mut level = Level::new(level_value, self.config.bounding_box);
        let projection = PixelProjection::for_level(level_value);

        let data = calculate_coastline_data(
            &level.state_map,
            &self.synthesized,
            self.config.optimize,
            self.config.tolerance,
            self.config.min_object_dimension,
            &projection,
        );

        mark_coastline_cells(&mut level.state_map, &data);

        let mut tiles = BTreeMap::new();
        handle_area_coastlines_completely_in_a_cell(&level.state_map, &data, &mut tiles);
        handle_coastlines_partially_in_a_cell(&level.state_map, &data, &mut tiles, &mut self.stats);

        calculate_coast_environment(&mut level.state_map, &tiles);
        seed_area_interiors(&mut level.state_map, &data);
        fill_water(
            &mut level.state_map,
            self.config.tile_count,
            &self.bounding_polygons,
        );
        fill_water_around_island(&level.state_map, &mut tiles, &self.bounding_polygons);
        fill_land(&mut level.state_map);

        calculate_has_cell_data(&mut level, &tiles);

        debug!(
            "Level {}: {} coast cell(s) with tiles, walker stats {:?}",
            level_value,
            tiles.len(),
            self.stats
        );

        LevelData { level, tiles }
    }
}

/// Builds every configured level. The walker statistics come back with the
/// levels so callers can surface anomalies.
pub fn build_water_index(
    coastlines: Vec<Coast>,
    bounding_polygons: Vec<Coast>,
    config: WaterIndexConfig,
) -> Result<(Vec<LevelData>, WalkStats)> {
    let mut builder = WaterIndexBuilder::new(coastlines, bounding_polygons, config)?;

    let levels: Vec<LevelData> = builder
        .config()
        .levels
        .clone()
        .into_iter()
        .map(|level| builder.build_level(level))
        .collect();

    Ok((levels, builder.stats.clone()))
}
