//! # butterfly-water
//!
//! Command line tool building multi-resolution land/water tile indexes
//! from coastline records.
//!
//! ## Usage
//!
//! ```bash
//! # Build an index for levels 6..10
//! butterfly-water build region.json region.idx
//!
//! # Custom level range and flood depth
//! butterfly-water build region.json region.idx --min-level 4 --max-level 12 --tile-count 30
//!
//! # Show what ended up in an index
//! butterfly-water inspect region.idx
//! ```

use butterfly_water::cli;

fn main() {
    env_logger::init();

    if let Err(error) = cli::run() {
        eprintln!("Error: {:#}", error);
        std::process::exit(1);
    }
}
