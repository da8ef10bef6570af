//! MBTiles tile store.
//!
//! The store is opened for the duration of one write (metadata update or
//! batch flush) and closed again, so no connection or file lock is held
//! while the crawler sleeps between requests.

pub mod error;
pub mod mbtiles;
pub mod schema;

use async_trait::async_trait;

pub use error::StoreError;
pub use mbtiles::{archive_path, MbtilesStore, StoreMetadata};

use crate::grid::TileCoord;

/// A fetched tile awaiting persistence. `data` is gzip-compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub coord: TileCoord,
    pub data: Vec<u8>,
}

/// Destination of batched tile writes.
///
/// Writes are upserts keyed by (zoom, column, TMS row): writing a tile that
/// already exists replaces it.
#[async_trait]
pub trait TileSink: Send + Sync {
    /// Persist all `tiles` in one transaction, returning how many were written.
    async fn write_tiles(&self, tiles: Vec<Tile>) -> Result<usize, StoreError>;
}
