//! Butterfly-Water: multi-resolution land/water tile index builder
//!
//! Classifies every cell of a geographic box as land, water, coast or
//! unknown and describes the exact land/water partition inside each coast
//! cell as polygonal ground tiles, so renderers can paint the background
//! without re-scanning raw coastline geometry.
//!
//! Pipeline per zoom level:
//! - Synthesize: clip coastlines and bounding polygons against each other
//!   into coast segments that fully encircle the region
//! - Preprocess: simplify coastlines, drop degenerate and crossing
//!   islands, index the cells each coastline touches
//! - Walk: stitch coastline paths and cell border arcs into closed, typed
//!   ground tiles per coast cell
//! - Flood: mark coast cells, infer their environment, flood water, fill
//!   land, patch island cells
//! - Write: serialize the state bitmap and tile blobs per level
//!
//! Key principle: every ground tile is a closed clockwise polygon in
//! cell-local fixed-point coordinates; painting a cell is a pure lookup.

pub mod cells;
pub mod cli;
pub mod coastline;
pub mod flood;
pub mod formats;
pub mod geometry;
pub mod pipeline;
pub mod projection;
pub mod simplify;
pub mod state_map;
pub mod synthesize;
pub mod types;
pub mod walker;

pub use formats::{read_water_index, write_water_index};
pub use pipeline::{
    build_water_index, LevelData, WaterIndexBuilder, WaterIndexConfig,
};
pub use state_map::StateMap;
pub use types::{
    Coast, CoastState, GeoBox, GeoCoord, GroundTile, Pixel, State, TileType, CELL_MAX,
};
