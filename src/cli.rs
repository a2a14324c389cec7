//! Command line driver: decodes coastline records from JSON, runs the
//! per-level pipeline and writes or inspects water index files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use crate::formats::{read_water_index, write_water_index};
use crate::pipeline::{LevelData, WaterIndexBuilder, WaterIndexConfig};
use crate::simplify::OptimizeMethod;
use crate::types::{Coast, CoastState, GeoBox, GeoCoord, State};

/// Command line interface of the water index builder.
#[derive(Parser)]
#[command(name = "butterfly-water")]
#[command(about = "Build multi-resolution land/water tile indexes for map rendering")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a water index from coastline records
    Build {
        /// Input JSON file with coastlines and bounding polygons
        input: PathBuf,
        /// Output index file
        output: PathBuf,
        /// First zoom level
        #[arg(long, default_value_t = 6)]
        min_level: u32,
        /// Last zoom level (inclusive)
        #[arg(long, default_value_t = 10)]
        max_level: u32,
        /// Rounds of water flooding
        #[arg(long, default_value_t = 20)]
        tile_count: usize,
        /// Simplifier tolerance in projected pixels
        #[arg(long, default_value_t = 1.0)]
        tolerance: f64,
        /// Minimum projected pixel extent for an island to survive
        #[arg(long, default_value_t = 4.0)]
        min_object_dimension: f64,
        /// Polyline optimization method
        #[arg(long, value_enum, default_value_t = OptimizeMethod::Quality)]
        optimize: OptimizeMethod,
    },
    /// Print the structure of an existing water index
    Inspect {
        /// Index file to inspect
        index: PathBuf,
    },
}

/// One coastline or bounding polygon record in the input file. Points are
/// `[lat, lon]` pairs in degrees; area rings may repeat their first point
/// at the end.
#[derive(Debug, Deserialize)]
struct CoastRecord {
    id: u64,
    #[serde(default)]
    is_area: bool,
    #[serde(default)]
    left: CoastState,
    #[serde(default)]
    right: CoastState,
    points: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct InputFile {
    /// `[min_lat, min_lon, max_lat, max_lon]`
    bounding_box: [f64; 4],
    #[serde(default)]
    coastlines: Vec<CoastRecord>,
    #[serde(default)]
    bounding_polygons: Vec<CoastRecord>,
}

impl CoastRecord {
    fn into_coast(self) -> Coast {
        Coast {
            id: self.id,
            points: self
                .points
                .into_iter()
                .map(|p| GeoCoord::new(p[0], p[1]))
                .collect(),
            is_area: self.is_area,
            left: self.left,
            right: self.right,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            min_level,
            max_level,
            tile_count,
            tolerance,
            min_object_dimension,
            optimize,
        } => build(
            &input,
            &output,
            min_level,
            max_level,
            tile_count,
            tolerance,
            min_object_dimension,
            optimize,
        ),
        Commands::Inspect { index } => inspect(&index),
    }
}

#[allow(clippy::too_many_arguments)]
fn build(
    input: &Path,
    output: &Path,
    min_level: u32,
    max_level: u32,
    tile_count: usize,
    tolerance: f64,
    min_object_dimension: f64,
    optimize: OptimizeMethod,
) -> Result<()> {
    println!("🌊 Building water index from {}\n", input.display());

    let raw = fs::read_to_string(input)
        .with_context(|| format!("Cannot read {}", input.display()))?;
    let parsed: InputFile =
        serde_json::from_str(&raw).with_context(|| format!("Cannot parse {}", input.display()))?;

    let bounding_box = GeoBox::new(
        parsed.bounding_box[0],
        parsed.bounding_box[1],
        parsed.bounding_box[2],
        parsed.bounding_box[3],
    );

    let coastlines: Vec<Coast> = parsed
        .coastlines
        .into_iter()
        .map(CoastRecord::into_coast)
        .collect();
    let bounding_polygons: Vec<Coast> = parsed
        .bounding_polygons
        .into_iter()
        .map(CoastRecord::into_coast)
        .collect();

    println!(
        "Loaded {} coastline(s), {} bounding polygon(s)",
        coastlines.len(),
        bounding_polygons.len()
    );

    let mut config = WaterIndexConfig::new((min_level..=max_level).collect(), bounding_box);
    config.tile_count = tile_count;
    config.tolerance = tolerance;
    config.min_object_dimension = min_object_dimension;
    config.optimize = optimize;

    let levels = config.levels.clone();
    let mut builder = WaterIndexBuilder::new(coastlines, bounding_polygons, config)?;

    let bar = ProgressBar::new(levels.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] level {msg} ({pos}/{len})")
            .expect("Failed to create progress style")
            .progress_chars("#>-"),
    );

    let mut level_data: Vec<LevelData> = Vec::with_capacity(levels.len());
    for level in levels {
        bar.set_message(level.to_string());
        level_data.push(builder.build_level(level));
        bar.inc(1);
    }
    bar.finish_and_clear();

    let stats = builder.stats().clone();
    if stats.aborted_walks > 0 || stats.degenerate_tiles > 0 {
        println!(
            "⚠️  {} aborted walk(s), {} degenerate tile(s) skipped",
            stats.aborted_walks, stats.degenerate_tiles
        );
    }

    write_water_index(output, &mut level_data)?;

    let total_tiles: usize = level_data
        .iter()
        .map(|l| l.tiles.values().map(Vec::len).sum::<usize>())
        .sum();

    println!("\n✓ {} level(s) written to {}", level_data.len(), output.display());
    println!("  ✓ {} ground tile(s) total", total_tiles);

    Ok(())
}

fn inspect(index: &Path) -> Result<()> {
    let file = read_water_index(index)?;

    println!("Water index {}\n", index.display());

    for level in &file.levels {
        let cells = u64::from(level.x_count()) * u64::from(level.y_count());

        let mut counts = [0u64; 4];
        for state in &level.states {
            counts[*state as usize] += 1;
        }

        println!(
            "Level {}: {} x {} cells (x {}..{}, y {}..{})",
            level.level,
            level.x_count(),
            level.y_count(),
            level.x_start,
            level.x_end,
            level.y_start,
            level.y_end
        );
        println!(
            "  default {}, cell data: {}",
            level.default_cell_data.name(),
            if level.has_cell_data {
                format!("{} bytes/entry", level.data_offset_bytes)
            } else {
                "none".to_string()
            }
        );
        println!(
            "  {} unknown, {} land, {} coast, {} water of {} cells",
            counts[State::Unknown as usize],
            counts[State::Land as usize],
            counts[State::Coast as usize],
            counts[State::Water as usize],
            cells
        );

        if !level.tiles.is_empty() {
            let tile_count: usize = level.tiles.values().map(Vec::len).sum();
            println!(
                "  {} cell(s) with {} ground tile(s)",
                level.tiles.len(),
                tile_count
            );
        }
    }

    Ok(())
}
