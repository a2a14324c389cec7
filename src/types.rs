//! Core geographic and tile data types shared by the whole pipeline.

use serde::{Deserialize, Serialize};

/// Maximum cell-local fixed-point coordinate of a ground tile vertex.
pub const CELL_MAX: u16 = 32767;

/// Planar geographic coordinate in degrees. All arithmetic in this crate is
/// planar; no spherical geodesy, no antimeridian handling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lat: f64,
    pub lon: f64,
}

impl GeoCoord {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoCoord { lat, lon }
    }
}

/// Axis-aligned geographic box, min corner <= max corner componentwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl GeoBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        GeoBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Bounding box of a point sequence. Returns `None` for an empty slice.
    pub fn of_points(points: &[GeoCoord]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = GeoBox::new(first.lat, first.lon, first.lat, first.lon);

        for p in &points[1..] {
            bbox.min_lat = bbox.min_lat.min(p.lat);
            bbox.max_lat = bbox.max_lat.max(p.lat);
            bbox.min_lon = bbox.min_lon.min(p.lon);
            bbox.max_lon = bbox.max_lon.max(p.lon);
        }

        Some(bbox)
    }
}

/// A cell index. Depending on context this is either a global cell index
/// (derived from longitude/latitude directly) or an index relative to a
/// state map's `(x_start, y_start)` corner; function docs say which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub x: u32,
    pub y: u32,
}

impl Pixel {
    pub fn new(x: u32, y: u32) -> Self {
        Pixel { x, y }
    }
}

// Row-major ordering (y first) so map iteration matches the serialized
// bitmap layout.
impl Ord for Pixel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for Pixel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Classification of one cell of the water index bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Unknown = 0,
    Land = 1,
    Coast = 2,
    Water = 3,
}

impl State {
    pub fn from_u8(value: u8) -> Self {
        match value & 3 {
            0 => State::Unknown,
            1 => State::Land,
            2 => State::Coast,
            _ => State::Water,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            State::Unknown => "unknown",
            State::Land => "land",
            State::Coast => "coast",
            State::Water => "water",
        }
    }
}

/// What lies on one side of a coastline when walking its points in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoastState {
    #[default]
    Undefined,
    Unknown,
    Land,
    Water,
}

/// A raw coastline or bounding polygon as handed to the pipeline.
///
/// `left`/`right` follow the walking direction of `points`. Islands are
/// closed areas with `right = water`, `left = land`. Area rings are stored
/// without a duplicated closing point; the wrap from the last point back to
/// the first is implicit.
#[derive(Debug, Clone)]
pub struct Coast {
    pub id: u64,
    pub points: Vec<GeoCoord>,
    pub is_area: bool,
    pub left: CoastState,
    pub right: CoastState,
}

/// Type of a ground tile polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TileType {
    Unknown = 0,
    Land = 1,
    Water = 2,
    Coast = 3,
}

impl TileType {
    pub fn from_u8(value: u8) -> Self {
        match value & 3 {
            0 => TileType::Unknown,
            1 => TileType::Land,
            2 => TileType::Water,
            _ => TileType::Coast,
        }
    }
}

/// Cell-local fixed-point vertex of a ground tile, `x`/`y` in
/// `[0, CELL_MAX]`. `coast` marks vertices lying on real coastline geometry
/// (as opposed to cell borders and clip points).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCoord {
    pub x: u16,
    pub y: u16,
    pub coast: bool,
}

impl CellCoord {
    pub fn new(x: u16, y: u16, coast: bool) -> Self {
        CellCoord { x, y, coast }
    }

    /// Positional equality, ignoring the coast flag.
    pub fn same_position(&self, other: &CellCoord) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// A typed closed polygon inside one cell, clockwise in (x, y) space.
/// The last vertex repeats the first when the ring was closed by a
/// boundary walk.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTile {
    pub tile_type: TileType,
    pub coords: Vec<CellCoord>,
}

impl GroundTile {
    pub fn new(tile_type: TileType) -> Self {
        GroundTile {
            tile_type,
            coords: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geobox_of_points() {
        let points = vec![
            GeoCoord::new(1.0, 2.0),
            GeoCoord::new(-1.0, 5.0),
            GeoCoord::new(3.0, 4.0),
        ];
        let bbox = GeoBox::of_points(&points).unwrap();
        assert_eq!(bbox.min_lat, -1.0);
        assert_eq!(bbox.max_lat, 3.0);
        assert_eq!(bbox.min_lon, 2.0);
        assert_eq!(bbox.max_lon, 5.0);

        assert!(GeoBox::of_points(&[]).is_none());
    }

    #[test]
    fn test_pixel_ordering_is_row_major() {
        let mut pixels = vec![Pixel::new(2, 0), Pixel::new(0, 1), Pixel::new(1, 0)];
        pixels.sort();
        assert_eq!(
            pixels,
            vec![Pixel::new(1, 0), Pixel::new(2, 0), Pixel::new(0, 1)]
        );
    }

    #[test]
    fn test_state_round_trip() {
        for value in 0..4u8 {
            assert_eq!(State::from_u8(value) as u8, value);
            assert_eq!(TileType::from_u8(value) as u8, value);
        }
    }
}
