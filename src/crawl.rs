//! Crawl orchestration: the resumable walk over source → zoom → row → column.
//!
//! The crawler owns all session state (batch, rotators, counters) and drives
//! the fetcher, the tile store and the checkpoint files strictly in sequence.
//! Shutdown is cooperative: the token is polled at the top of every loop
//! level and ends the inter-tile delay early, so an in-flight request always
//! completes before the crawler unwinds and persists its position.

use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::batch::BatchWriter;
use crate::fetch::{FetchOutcome, Fetcher, TileClient, TileFailure};
use crate::grid::{bounds_to_tile_rect, TileCoord};
use crate::mirror::MirrorRotator;
use crate::source::MapSource;
use crate::state::{CheckpointStore, GlobalCheckpoint};
use crate::store::{MbtilesStore, StoreMetadata, Tile};
use crate::systemd::SystemdNotifier;

/// Tunables of a crawl session.
#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    /// Tiles per store transaction.
    pub write_interval: usize,
    /// Stop after this many completed source passes in this session.
    /// `None` crawls until shutdown.
    pub max_passes: Option<u64>,
}

/// Why a crawl session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    PassLimit,
    /// A tile's final mirror attempt ended in something other than 200 or 404.
    Fatal(TileFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub reason: StopReason,
    /// Tiles downloaded successfully in this session.
    pub session_tiles: u64,
    pub flushes: u64,
    pub passes: u64,
}

/// Where to pick up, derived from the global checkpoint on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pickup {
    source_index: usize,
    zoom: u8,
    /// Exact (column, row) to start at, only when the saved column was
    /// non-zero; otherwise the zoom level is restarted.
    position: Option<(u32, u32)>,
    total: u64,
}

enum SourceEnd {
    Complete,
    Stopped(StopReason),
}

pub struct Crawler<C> {
    fetcher: Fetcher<C>,
    sources: Vec<MapSource>,
    rotators: Vec<MirrorRotator>,
    checkpoints: CheckpointStore,
    options: CrawlOptions,
    token: CancellationToken,
    notifier: SystemdNotifier,
    batch: BatchWriter,
    /// Last tile whose attempt completed (success or 404) in this session,
    /// for the current source pass.
    last_done: Option<TileCoord>,
    session_tiles: u64,
    passes: u64,
}

impl<C: TileClient> Crawler<C> {
    pub fn new(
        client: C,
        sources: Vec<MapSource>,
        checkpoints: CheckpointStore,
        options: CrawlOptions,
        token: CancellationToken,
    ) -> Self {
        let rotators = sources
            .iter()
            .map(|s| MirrorRotator::new(s.server_parts.clone()))
            .collect();
        Self {
            fetcher: Fetcher::new(client),
            sources,
            rotators,
            checkpoints,
            options,
            token,
            notifier: SystemdNotifier::new(false),
            batch: BatchWriter::new(options.write_interval, 0),
            last_done: None,
            session_tiles: 0,
            passes: 0,
        }
    }

    pub(crate) fn with_notifier(mut self, notifier: SystemdNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Crawl until shutdown, a fatal tile failure, or the pass limit.
    ///
    /// Store and checkpoint errors abort the session and are returned; the
    /// checkpoint on disk still points at or before the failed write.
    pub async fn run(mut self) -> anyhow::Result<CrawlSummary> {
        if self.sources.is_empty() {
            anyhow::bail!("No map sources configured");
        }

        let mut pickup = self.resume_point().await?;
        let mut index = pickup.map_or(0, |p| p.source_index);
        self.batch = BatchWriter::new(self.options.write_interval, pickup.map_or(0, |p| p.total));

        let reason = loop {
            if self.token.is_cancelled() {
                break StopReason::Shutdown;
            }
            match self.crawl_source(index, pickup.take()).await? {
                SourceEnd::Complete => {
                    index = self.finish_pass(index).await?;
                    if self.options.max_passes.is_some_and(|max| self.passes >= max) {
                        break StopReason::PassLimit;
                    }
                }
                SourceEnd::Stopped(reason) => break reason,
            }
        };

        match &reason {
            StopReason::Shutdown => {
                tracing::info!("Shutdown received - saving download state");
                self.persist_stop(index).await?;
            }
            StopReason::Fatal(failure) => {
                tracing::error!("Stopping after unrecoverable download error: {}", failure);
                self.persist_stop(index).await?;
            }
            StopReason::PassLimit => {
                tracing::info!(passes = self.passes, "Pass limit reached");
            }
        }

        Ok(CrawlSummary {
            reason,
            session_tiles: self.session_tiles,
            flushes: self.batch.flushes(),
            passes: self.passes,
        })
    }

    async fn resume_point(&self) -> anyhow::Result<Option<Pickup>> {
        let saved = self
            .checkpoints
            .load_global()
            .await
            .context("Failed to read download state")?;
        let Some(cp) = saved else {
            tracing::info!("No download state found, starting with the first source");
            return Ok(None);
        };

        let Some(source) = self.sources.get(cp.source_index) else {
            tracing::warn!(
                "Download state points at source {} but only {} are configured, starting fresh",
                cp.source_index,
                self.sources.len()
            );
            return Ok(None);
        };

        let zoom = cp.zoom.clamp(source.min_zoom, source.max_zoom);
        let rect = bounds_to_tile_rect(&source.bbox, zoom);
        if cp.x != 0 && zoom == cp.zoom && !rect.contains(cp.x, cp.y) {
            tracing::warn!(
                "Saved position {}/{} lies outside the area of '{}' at zoom {}, clamping",
                cp.x,
                cp.y,
                source.key,
                zoom
            );
        }
        let position = (cp.x != 0 && zoom == cp.zoom).then(|| {
            (
                cp.x.clamp(rect.min_x, rect.max_x),
                cp.y.clamp(rect.min_y, rect.max_y),
            )
        });

        tracing::info!(
            "Resuming source '{}' at zoom {} {} (tiles collected so far: {})",
            source.key,
            zoom,
            match position {
                Some((x, y)) => format!("tile {}/{}", x, y),
                None => "from the start".to_string(),
            },
            cp.total
        );

        Ok(Some(Pickup {
            source_index: cp.source_index,
            zoom,
            position,
            total: cp.total,
        }))
    }

    async fn crawl_source(
        &mut self,
        index: usize,
        pickup: Option<Pickup>,
    ) -> anyhow::Result<SourceEnd> {
        let source = self.sources[index].clone();
        let store = MbtilesStore::new(&source.store_path);

        store
            .write_metadata(&StoreMetadata {
                name: source.display_name.clone(),
                min_zoom: source.min_zoom,
                max_zoom: source.max_zoom,
                bounds: source.bbox.metadata_bounds(),
            })
            .await
            .with_context(|| format!("Failed to prepare {}", store.path().display()))?;

        let completed = self.checkpoints.load_source(&source.key).await?;
        let start_zoom = pickup.map_or(source.min_zoom, |p| p.zoom);
        tracing::info!(
            "Crawling '{}' ({}) zoom {}..={}, {} full passes so far",
            source.key,
            source.display_name,
            start_zoom,
            source.max_zoom,
            completed
        );
        self.notifier
            .notify_status(&format!("Crawling {} from zoom {}", source.key, start_zoom));

        for zoom in start_zoom..=source.max_zoom {
            if self.token.is_cancelled() {
                return Ok(SourceEnd::Stopped(StopReason::Shutdown));
            }

            let rect = bounds_to_tile_rect(&source.bbox, zoom);
            let resumed = pickup.filter(|p| p.zoom == zoom);
            let (start_x, start_y) = resumed
                .and_then(|p| p.position)
                .unwrap_or((rect.min_x, rect.min_y));

            if resumed.is_none() {
                self.flush(&store).await?;
                self.save_checkpoint(index, zoom, rect.min_x, rect.min_y)
                    .await?;
            }
            tracing::info!(
                "Zoom {}: {} tiles in x {}..={}, y {}..={}",
                rect.zoom,
                rect.tile_count(),
                rect.min_x,
                rect.max_x,
                rect.min_y,
                rect.max_y
            );

            for y in start_y..=rect.max_y {
                if self.token.is_cancelled() {
                    return Ok(SourceEnd::Stopped(StopReason::Shutdown));
                }
                let first_x = if y == start_y { start_x } else { rect.min_x };

                for x in first_x..=rect.max_x {
                    if self.token.is_cancelled() {
                        return Ok(SourceEnd::Stopped(StopReason::Shutdown));
                    }

                    let tile = TileCoord::new(zoom, x, y);
                    match self
                        .fetcher
                        .fetch(&source, &mut self.rotators[index], tile)
                        .await
                    {
                        FetchOutcome::Success(data) => {
                            self.session_tiles += 1;
                            self.last_done = Some(tile);
                            if self.batch.add(Tile { coord: tile, data }) {
                                self.flush(&store).await?;
                                let (next_x, next_y) = rect.next_after(x, y).unwrap_or((x, y));
                                self.save_checkpoint(index, zoom, next_x, next_y).await?;
                            }
                        }
                        FetchOutcome::NotFound => {
                            tracing::warn!("Tile {} seems out of bounds (404)", tile);
                            self.last_done = Some(tile);
                        }
                        FetchOutcome::Failed(failure) => {
                            tracing::error!(
                                "Failed to download tile {} after {} attempts: {}",
                                tile,
                                self.rotators[index].mirror_count(),
                                failure
                            );
                            tracing::error!("Last response: {}", failure.detail);
                            return Ok(SourceEnd::Stopped(StopReason::Fatal(failure)));
                        }
                    }

                    self.pause(source.delay).await;
                }
            }
        }

        Ok(SourceEnd::Complete)
    }

    /// Close a completed pass over `index` and return the next source index.
    async fn finish_pass(&mut self, index: usize) -> anyhow::Result<usize> {
        let source = &self.sources[index];
        let store = MbtilesStore::new(&source.store_path);
        let key = source.key.clone();

        self.flush(&store).await?;

        let passes = self.checkpoints.load_source(&key).await? + 1;
        self.checkpoints.save_source(&key, passes).await?;
        let archive = store
            .archive(passes)
            .await
            .context("Failed to archive completed pass")?;
        tracing::info!(
            "Whole area of '{}' processed completely - copy created at {}, starting next source",
            key,
            archive.display()
        );

        self.batch.reset_total();
        self.last_done = None;
        self.passes += 1;

        let next = (index + 1) % self.sources.len();
        let next_source = &self.sources[next];
        let rect = bounds_to_tile_rect(&next_source.bbox, next_source.min_zoom);
        self.save_checkpoint(next, next_source.min_zoom, rect.min_x, rect.min_y)
            .await?;
        Ok(next)
    }

    /// Flush buffered tiles and record the last completed tile, if any.
    async fn persist_stop(&mut self, index: usize) -> anyhow::Result<()> {
        let store = MbtilesStore::new(&self.sources[index].store_path);
        tracing::debug!(pending = self.batch.len(), "Writing buffered tiles before exit");
        self.flush(&store).await?;
        if let Some(tile) = self.last_done {
            self.save_checkpoint(index, tile.zoom, tile.x, tile.y).await?;
        }
        Ok(())
    }

    async fn flush(&mut self, store: &MbtilesStore) -> anyhow::Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let total = self
            .batch
            .flush(store)
            .await
            .with_context(|| format!("Failed to write tiles to {}", store.path().display()))?;
        self.notifier.notify_watchdog();
        self.notifier
            .notify_status(&format!("{} tiles collected for current source", total));
        Ok(())
    }

    async fn save_checkpoint(&self, index: usize, zoom: u8, x: u32, y: u32) -> anyhow::Result<()> {
        self.checkpoints
            .save_global(&GlobalCheckpoint {
                source_index: index,
                zoom,
                x,
                y,
                total: self.batch.total(),
            })
            .await
            .context("Failed to save download state")
    }

    /// Sleep for the source's delay, returning early on shutdown.
    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.token.cancelled() => {}
        }
    }
}
