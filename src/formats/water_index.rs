//! Water index container: varint-framed header, per-level state bitmaps
//! and ground tile blobs.
//!
//! Layout:
//! - varint `min_level`, varint `max_level`
//! - per level: u8 `has_cell_data`, u8 `data_offset_bytes`,
//!   u8 `default_cell_data`, u64 LE `index_data_offset`,
//!   varints `x_start`, `x_end`, `y_start`, `y_end`
//! - per level with cell data, at `index_data_offset`: a row-major bitmap
//!   of `x_count * y_count` little-endian integers of `data_offset_bytes`
//!   bytes (raw state 0..3, or the offset of the cell's tile blob relative
//!   to the bitmap end), 4 reserved bytes, then the blobs: varint tile
//!   count, per tile u8 type, varint coord count and u16 LE (x, y) pairs
//!   with bit 15 of x flagging on-coast vertices.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;

use super::varint::{bytes_needed, read_uint, read_varint, varint_len, write_uint, write_varint};
use crate::pipeline::LevelData;
use crate::types::{CellCoord, GroundTile, Pixel, State, TileType};

const COAST_FLAG: u16 = 1 << 15;
/// Reserved bytes between the bitmap and the first blob; also guarantees
/// every blob offset is distinguishable from a raw state value.
const BLOB_PADDING: u64 = 4;

fn tile_blob_size(tiles: &[GroundTile]) -> u64 {
    let mut size = varint_len(tiles.len() as u64) as u64;

    for tile in tiles {
        size += 1;
        size += varint_len(tile.coords.len() as u64) as u64;
        size += tile.coords.len() as u64 * 4;
    }

    size
}

/// Serializes all levels to `path`, filling in each level's
/// `data_offset_bytes`, `index_entry_offset` and `index_data_offset`.
pub fn write_water_index<P: AsRef<Path>>(path: P, levels: &mut [LevelData]) -> Result<()> {
    if levels.is_empty() {
        bail!("Cannot write water index without levels");
    }

    let min_level = levels[0].level.level;
    let max_level = levels[levels.len() - 1].level.level;

    // Lay out every level's data block ahead of writing so the file can be
    // emitted strictly sequentially.
    struct Plan {
        blob_offsets: BTreeMap<Pixel, u64>,
        data_size: u64,
        block_size: u64,
    }

    let mut plans: Vec<Plan> = Vec::with_capacity(levels.len());

    for level_data in levels.iter() {
        let mut blob_offsets = BTreeMap::new();
        let mut data_size = BLOB_PADDING;

        for (coord, tiles) in &level_data.tiles {
            blob_offsets.insert(*coord, data_size);
            data_size += tile_blob_size(tiles);
        }

        let state_map = &level_data.level.state_map;
        let cells = u64::from(state_map.x_count()) * u64::from(state_map.y_count());
        let data_offset_bytes = bytes_needed(data_size);

        let block_size = if level_data.level.has_cell_data {
            cells * u64::from(data_offset_bytes) + data_size
        } else {
            0
        };

        plans.push(Plan {
            blob_offsets,
            data_size,
            block_size,
        });
    }

    // Header size determines where the first data block starts.
    let mut header_size = varint_len(u64::from(min_level)) + varint_len(u64::from(max_level));
    let mut entry_offsets = Vec::with_capacity(levels.len());

    for level_data in levels.iter() {
        let state_map = &level_data.level.state_map;
        entry_offsets.push(header_size as u64);
        header_size += 3 + 8;
        header_size += varint_len(u64::from(state_map.x_start()));
        header_size += varint_len(u64::from(state_map.x_end()));
        header_size += varint_len(u64::from(state_map.y_start()));
        header_size += varint_len(u64::from(state_map.y_end()));
    }

    let mut data_offset = header_size as u64;
    for (level_data, plan) in levels.iter_mut().zip(plans.iter()) {
        let level = &mut level_data.level;
        level.data_offset_bytes = bytes_needed(plan.data_size);
        level.index_data_offset = if level.has_cell_data { data_offset } else { 0 };
        data_offset += plan.block_size;
    }
    for (level_data, entry_offset) in levels.iter_mut().zip(entry_offsets) {
        level_data.level.index_entry_offset = entry_offset;
    }

    let file = File::create(path.as_ref())
        .with_context(|| format!("Cannot create {}", path.as_ref().display()))?;
    let mut writer = BufWriter::new(file);

    write_varint(&mut writer, u64::from(min_level))?;
    write_varint(&mut writer, u64::from(max_level))?;

    for level_data in levels.iter() {
        let level = &level_data.level;
        let state_map = &level.state_map;

        writer.write_all(&[
            u8::from(level.has_cell_data),
            level.data_offset_bytes,
            level.default_cell_data as u8,
        ])?;
        writer.write_all(&level.index_data_offset.to_le_bytes())?;
        write_varint(&mut writer, u64::from(state_map.x_start()))?;
        write_varint(&mut writer, u64::from(state_map.x_end()))?;
        write_varint(&mut writer, u64::from(state_map.y_start()))?;
        write_varint(&mut writer, u64::from(state_map.y_end()))?;
    }

    for (level_data, plan) in levels.iter().zip(plans.iter()) {
        let level = &level_data.level;

        if !level.has_cell_data {
            info!(
                "Level {}: all cells '{}', no cell index needed",
                level.level,
                level.default_cell_data.name()
            );
            continue;
        }

        let state_map = &level.state_map;

        info!(
            "Level {}: {} cells, {} entries, {} bytes/entry",
            level.level,
            state_map.x_count() * state_map.y_count(),
            level_data.tiles.len(),
            level.data_offset_bytes
        );

        for y in 0..state_map.y_count() {
            for x in 0..state_map.x_count() {
                let value = match plan.blob_offsets.get(&Pixel::new(x, y)) {
                    Some(offset) => *offset,
                    None => state_map.get_state(x, y) as u64,
                };
                write_uint(&mut writer, value, level.data_offset_bytes)?;
            }
        }

        writer.write_all(&[0u8; BLOB_PADDING as usize])?;

        for tiles in level_data.tiles.values() {
            write_varint(&mut writer, tiles.len() as u64)?;

            for tile in tiles {
                writer.write_all(&[tile.tile_type as u8])?;
                write_varint(&mut writer, tile.coords.len() as u64)?;

                for coord in &tile.coords {
                    let x = if coord.coast {
                        coord.x | COAST_FLAG
                    } else {
                        coord.x
                    };
                    writer.write_all(&x.to_le_bytes())?;
                    writer.write_all(&coord.y.to_le_bytes())?;
                }
            }
        }
    }

    writer.flush().context("Flushing water index")?;
    Ok(())
}

/// One level as decoded from a water index file.
#[derive(Debug)]
pub struct WaterIndexLevel {
    pub level: u32,
    pub has_cell_data: bool,
    pub data_offset_bytes: u8,
    pub default_cell_data: State,
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
    /// Row-major cell states; tile cells decode as `Coast`.
    pub states: Vec<State>,
    pub tiles: BTreeMap<Pixel, Vec<GroundTile>>,
}

impl WaterIndexLevel {
    pub fn x_count(&self) -> u32 {
        self.x_end - self.x_start + 1
    }

    pub fn y_count(&self) -> u32 {
        self.y_end - self.y_start + 1
    }

    pub fn state(&self, x: u32, y: u32) -> State {
        self.states[(y as usize) * (self.x_count() as usize) + x as usize]
    }
}

#[derive(Debug)]
pub struct WaterIndexFile {
    pub levels: Vec<WaterIndexLevel>,
}

pub fn read_water_index<P: AsRef<Path>>(path: P) -> Result<WaterIndexFile> {
    let mut file = File::open(path.as_ref())
        .with_context(|| format!("Cannot open {}", path.as_ref().display()))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer).context("Reading water index")?;

    let mut cursor = Cursor::new(buffer.as_slice());

    let min_level = read_varint(&mut cursor)? as u32;
    let max_level = read_varint(&mut cursor)? as u32;
    if max_level < min_level {
        bail!("Invalid level range {}..{}", min_level, max_level);
    }

    struct Header {
        level: u32,
        has_cell_data: bool,
        data_offset_bytes: u8,
        default_cell_data: State,
        index_data_offset: u64,
        x_start: u32,
        x_end: u32,
        y_start: u32,
        y_end: u32,
    }

    let mut headers = Vec::new();

    for level in min_level..=max_level {
        let mut fixed = [0u8; 3];
        cursor.read_exact(&mut fixed)?;

        if fixed[0] > 1 {
            bail!("Corrupt level header for level {}", level);
        }
        if fixed[1] == 0 || fixed[1] > 8 {
            bail!("Invalid data offset width {} for level {}", fixed[1], level);
        }

        let mut offset = [0u8; 8];
        cursor.read_exact(&mut offset)?;

        let x_start = read_varint(&mut cursor)? as u32;
        let x_end = read_varint(&mut cursor)? as u32;
        let y_start = read_varint(&mut cursor)? as u32;
        let y_end = read_varint(&mut cursor)? as u32;

        if x_end < x_start || y_end < y_start {
            bail!("Invalid cell range for level {}", level);
        }

        headers.push(Header {
            level,
            has_cell_data: fixed[0] == 1,
            data_offset_bytes: fixed[1],
            default_cell_data: State::from_u8(fixed[2]),
            index_data_offset: u64::from_le_bytes(offset),
            x_start,
            x_end,
            y_start,
            y_end,
        });
    }

    let mut levels = Vec::with_capacity(headers.len());

    for header in headers {
        let x_count = header.x_end - header.x_start + 1;
        let y_count = header.y_end - header.y_start + 1;
        let cells = (x_count as usize) * (y_count as usize);

        let mut states = vec![header.default_cell_data; cells];
        let mut tiles = BTreeMap::new();

        if header.has_cell_data {
            let mut cursor = Cursor::new(buffer.as_slice());
            cursor.set_position(header.index_data_offset);

            let mut blob_offsets: Vec<(Pixel, u64)> = Vec::new();

            for y in 0..y_count {
                for x in 0..x_count {
                    let value = read_uint(&mut cursor, header.data_offset_bytes)?;

                    if value <= 3 {
                        states[(y as usize) * (x_count as usize) + x as usize] =
                            State::from_u8(value as u8);
                    } else {
                        states[(y as usize) * (x_count as usize) + x as usize] = State::Coast;
                        blob_offsets.push((Pixel::new(x, y), value));
                    }
                }
            }

            let data_start = header.index_data_offset
                + cells as u64 * u64::from(header.data_offset_bytes);

            for (coord, offset) in blob_offsets {
                let mut cursor = Cursor::new(buffer.as_slice());
                cursor.set_position(data_start + offset);

                let tile_count = read_varint(&mut cursor)?;
                let mut cell_tiles = Vec::with_capacity(tile_count as usize);

                for _ in 0..tile_count {
                    let mut type_byte = [0u8; 1];
                    cursor.read_exact(&mut type_byte)?;
                    let mut tile = GroundTile::new(TileType::from_u8(type_byte[0]));

                    let coord_count = read_varint(&mut cursor)?;
                    tile.coords.reserve(coord_count as usize);

                    for _ in 0..coord_count {
                        let mut pair = [0u8; 4];
                        cursor.read_exact(&mut pair)?;
                        let x = u16::from_le_bytes([pair[0], pair[1]]);
                        let y = u16::from_le_bytes([pair[2], pair[3]]);

                        tile.coords.push(CellCoord::new(
                            x & !COAST_FLAG,
                            y,
                            x & COAST_FLAG != 0,
                        ));
                    }

                    cell_tiles.push(tile);
                }

                tiles.insert(coord, cell_tiles);
            }
        }

        levels.push(WaterIndexLevel {
            level: header.level,
            has_cell_data: header.has_cell_data,
            data_offset_bytes: header.data_offset_bytes,
            default_cell_data: header.default_cell_data,
            x_start: header.x_start,
            x_end: header.x_end,
            y_start: header.y_start,
            y_end: header.y_end,
            states,
            tiles,
        });
    }

    Ok(WaterIndexFile { levels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Level;
    use crate::types::GeoBox;
    use tempfile::NamedTempFile;

    fn sample_levels() -> Vec<LevelData> {
        // Level 0: uniform water, no cell data.
        let mut uniform = Level::for_cell_size(7, GeoBox::new(0.5, 0.5, 3.5, 3.5), 1.0, 1.0);
        for y in 0..uniform.state_map.y_count() {
            for x in 0..uniform.state_map.x_count() {
                uniform.state_map.set_state(x, y, State::Water);
            }
        }
        uniform.has_cell_data = false;
        uniform.default_cell_data = State::Water;

        // Level 1: mixed states plus tiles on one cell.
        let mut mixed = Level::for_cell_size(8, GeoBox::new(0.5, 0.5, 3.5, 3.5), 1.0, 1.0);
        for y in 0..mixed.state_map.y_count() {
            for x in 0..mixed.state_map.x_count() {
                mixed.state_map.set_state(x, y, State::Land);
            }
        }
        mixed.state_map.set_state(1, 2, State::Coast);
        mixed.state_map.set_state(3, 0, State::Water);
        mixed.has_cell_data = true;
        mixed.default_cell_data = State::Land;

        let mut tile = GroundTile::new(TileType::Water);
        tile.coords = vec![
            CellCoord::new(0, 32767, false),
            CellCoord::new(32767, 32767, false),
            CellCoord::new(16000, 12, true),
        ];
        let mut second = GroundTile::new(TileType::Land);
        second.coords = vec![
            CellCoord::new(5, 6, true),
            CellCoord::new(7, 8, true),
            CellCoord::new(9, 10, false),
        ];

        let mut tiles = BTreeMap::new();
        tiles.insert(Pixel::new(1, 2), vec![tile, second]);

        vec![
            LevelData {
                level: uniform,
                tiles: BTreeMap::new(),
            },
            LevelData {
                level: mixed,
                tiles,
            },
        ]
    }

    #[test]
    fn test_round_trip() {
        let mut levels = sample_levels();
        let tmpfile = NamedTempFile::new().unwrap();

        write_water_index(tmpfile.path(), &mut levels).unwrap();
        let decoded = read_water_index(tmpfile.path()).unwrap();

        assert_eq!(decoded.levels.len(), 2);

        let uniform = &decoded.levels[0];
        assert_eq!(uniform.level, 7);
        assert!(!uniform.has_cell_data);
        assert_eq!(uniform.default_cell_data, State::Water);
        assert!(uniform.states.iter().all(|&s| s == State::Water));
        assert!(uniform.tiles.is_empty());

        let mixed = &decoded.levels[1];
        assert_eq!(mixed.level, 8);
        assert!(mixed.has_cell_data);
        assert_eq!(mixed.x_count(), 4);
        assert_eq!(mixed.state(0, 0), State::Land);
        assert_eq!(mixed.state(3, 0), State::Water);
        assert_eq!(mixed.state(1, 2), State::Coast);

        // Tiles decode exactly, including coast flags.
        let tiles = &mixed.tiles[&Pixel::new(1, 2)];
        assert_eq!(tiles, &levels[1].tiles[&Pixel::new(1, 2)]);
    }

    #[test]
    fn test_header_offsets_round_trip() {
        let mut levels = sample_levels();
        let tmpfile = NamedTempFile::new().unwrap();
        write_water_index(tmpfile.path(), &mut levels).unwrap();

        // The writer filled in the offsets it used.
        assert_eq!(levels[0].level.index_data_offset, 0);
        assert!(levels[1].level.index_data_offset > 0);
        assert_eq!(levels[1].level.data_offset_bytes, 1);

        let decoded = read_water_index(tmpfile.path()).unwrap();
        assert_eq!(
            decoded.levels[1].data_offset_bytes,
            levels[1].level.data_offset_bytes
        );
    }

    #[test]
    fn test_empty_levels_rejected() {
        let tmpfile = NamedTempFile::new().unwrap();
        assert!(write_water_index(tmpfile.path(), &mut []).is_err());
    }
}
