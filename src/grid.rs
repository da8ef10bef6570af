//! Web Mercator tile grid math.
//!
//! Tiles are enumerated in the XYZ convention (row 0 at the top). MBTiles
//! stores rows in the TMS convention (row 0 at the bottom), so rows are
//! flipped with [`flip_row`] only when tiles are written.

use std::f64::consts::PI;

/// Latitude limit of the Web Mercator projection.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Highest zoom level whose row/column indices fit in a `u32`.
pub const MAX_ZOOM: u8 = 31;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// MBTiles `bounds` metadata value in `min_lat,min_lon,max_lat,max_lon` order.
    pub fn metadata_bounds(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

/// A single tile address in the XYZ convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Row of this tile in the TMS convention used by the store.
    pub fn tms_row(&self) -> u32 {
        flip_row(self.zoom, self.y)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inclusive rectangle of tile indices at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub zoom: u8,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRect {
    pub fn tile_count(&self) -> u64 {
        (self.max_x - self.min_x + 1) as u64 * (self.max_y - self.min_y + 1) as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Row-major successor of `(x, y)`, or `None` past the last tile.
    pub fn next_after(&self, x: u32, y: u32) -> Option<(u32, u32)> {
        if x < self.max_x {
            Some((x + 1, y))
        } else if y < self.max_y {
            Some((self.min_x, y + 1))
        } else {
            None
        }
    }
}

/// Number of tiles along one axis at `zoom`.
fn axis_len(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Tile indices of a geographic point, clamped to the valid grid.
fn point_to_tile(lon: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let n = axis_len(zoom) as f64;
    let max_index = axis_len(zoom) - 1;

    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) * n / 2.0).floor();

    let clamp = |v: f64| (v.max(0.0) as u64).min(max_index) as u32;
    (clamp(x), clamp(y))
}

/// Inclusive tile rectangle covering `bbox` at `zoom`.
///
/// The rectangle is built from the tiles of the two opposite corners, so a
/// degenerate box (min == max) yields a single tile.
pub fn bounds_to_tile_rect(bbox: &BoundingBox, zoom: u8) -> TileRect {
    let (x1, y1) = point_to_tile(bbox.min_lon, bbox.min_lat, zoom);
    let (x2, y2) = point_to_tile(bbox.max_lon, bbox.max_lat, zoom);

    TileRect {
        zoom,
        min_x: x1.min(x2),
        min_y: y1.min(y2),
        max_x: x1.max(x2),
        max_y: y1.max(y2),
    }
}

/// Convert a row between the XYZ and TMS conventions: `2^zoom - 1 - row`.
///
/// The conversion is its own inverse.
pub fn flip_row(zoom: u8, row: u32) -> u32 {
    (axis_len(zoom) - 1 - row as u64) as u32
}
