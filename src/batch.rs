//! Buffering of fetched tiles between store writes.

use crate::store::{StoreError, Tile, TileSink};

/// Default number of tiles per store transaction.
pub const DEFAULT_WRITE_INTERVAL: usize = 250;

/// Collects fetched tiles and writes them to a [`TileSink`] in batches.
///
/// `total` is the cumulative number of tiles written for the current source
/// pass; it is restored from the checkpoint on resume and reset when a pass
/// completes.
#[derive(Debug)]
pub struct BatchWriter {
    pending: Vec<Tile>,
    threshold: usize,
    total: u64,
    flushes: u64,
}

impl BatchWriter {
    pub fn new(threshold: usize, total: u64) -> Self {
        let threshold = threshold.max(1);
        Self {
            pending: Vec::with_capacity(threshold),
            threshold,
            total,
            flushes: 0,
        }
    }

    /// Buffer a tile. Returns `true` once the batch has reached the threshold
    /// and must be flushed before the next `add`.
    pub fn add(&mut self, tile: Tile) -> bool {
        debug_assert!(self.pending.len() < self.threshold);
        self.pending.push(tile);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of non-empty flushes performed by this writer.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn reset_total(&mut self) {
        self.total = 0;
    }

    /// Write every buffered tile in one transaction and return the new
    /// cumulative count. An empty buffer is a no-op.
    ///
    /// On error the buffered tiles are dropped; the checkpoint has not moved
    /// past them, so a restart enumerates them again.
    pub async fn flush(&mut self, sink: &dyn TileSink) -> Result<u64, StoreError> {
        if self.pending.is_empty() {
            return Ok(self.total);
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.threshold));
        let written = sink.write_tiles(batch).await?;
        self.total += written as u64;
        self.flushes += 1;

        tracing::info!(
            "Added {} tiles to the store. (Total tiles collected: {})",
            written,
            self.total
        );
        Ok(self.total)
    }
}
