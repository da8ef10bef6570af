//! Single-tile download with mirror rotation.
//!
//! Every attempt takes the next mirror, so the retry budget equals the number
//! of mirrors: each mirror gets exactly one attempt per tile. Once the budget
//! is spent the final attempt decides the outcome: a 404 there resolves the
//! tile as [`FetchOutcome::NotFound`], anything else as
//! [`FetchOutcome::Failed`], which the crawler treats as fatal.

pub mod client;
pub mod error;

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

pub use client::{HttpTileClient, TileClient, TileResponse, DEFAULT_USER_AGENT};
pub use error::{FetchError, TileFailure};

use crate::grid::TileCoord;
use crate::mirror::MirrorRotator;
use crate::source::MapSource;

/// Resolution of one tile after the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Gzip-compressed payload of an HTTP 200 response.
    Success(Vec<u8>),
    /// Every mirror answered 404; usual for tiles at the edge of the bbox.
    NotFound,
    Failed(TileFailure),
}

/// How a single attempt ended.
enum Attempt {
    Done(Vec<u8>),
    Missing,
    Error(TileFailure),
}

fn classify(url: &str, result: Result<TileResponse, FetchError>) -> Attempt {
    match result {
        Ok(resp) if resp.status == 200 => Attempt::Done(resp.body),
        Ok(resp) if resp.status == 404 => Attempt::Missing,
        Ok(resp) => Attempt::Error(TileFailure {
            status: Some(resp.status),
            url: url.to_string(),
            detail: resp.headers,
        }),
        Err(e) => Attempt::Error(TileFailure {
            status: None,
            url: url.to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Gzip a tile payload; MBTiles vector tiles are stored compressed.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub struct Fetcher<C> {
    client: C,
}

impl<C: TileClient> Fetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Download `tile` from `source`, trying each mirror at most once.
    pub async fn fetch(
        &self,
        source: &MapSource,
        rotator: &mut MirrorRotator,
        tile: TileCoord,
    ) -> FetchOutcome {
        let max_attempts = rotator.mirror_count();
        let mut last = Attempt::Missing;

        for attempt in 1..=max_attempts {
            let server = rotator.next().to_string();
            let url = source.tile_url(&server, tile.zoom, tile.x, tile.y);
            let result = self.client.get(&url, &source.headers).await;

            last = classify(&url, result);
            match &last {
                Attempt::Done(body) => {
                    return match gzip(body) {
                        Ok(compressed) => FetchOutcome::Success(compressed),
                        Err(e) => FetchOutcome::Failed(TileFailure {
                            status: Some(200),
                            url,
                            detail: e.to_string(),
                        }),
                    };
                }
                Attempt::Missing => {
                    tracing::debug!(%tile, %url, attempt, max_attempts, "Tile not found on mirror");
                }
                Attempt::Error(failure) => {
                    tracing::debug!(
                        %tile,
                        attempt,
                        max_attempts,
                        "Attempt failed: {}",
                        failure
                    );
                }
            }
        }

        match last {
            Attempt::Error(failure) => FetchOutcome::Failed(failure),
            Attempt::Missing | Attempt::Done(_) => FetchOutcome::NotFound,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted HTTP client shared by fetcher and crawler tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{FetchError, TileClient, TileResponse};

    /// Plays back a queue of responses, then falls back to a default status.
    /// Every requested URL is recorded.
    pub struct ScriptedClient {
        script: Mutex<VecDeque<Result<u16, String>>>,
        fallback: u16,
        pub requests: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn always(status: u16) -> Self {
            Self::with_script(Vec::new(), status)
        }

        pub fn with_script(script: Vec<Result<u16, String>>, fallback: u16) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn urls(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TileClient for ScriptedClient {
        async fn get(
            &self,
            url: &str,
            _headers: &[(String, String)],
        ) -> Result<TileResponse, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            let next = self.script.lock().unwrap().pop_front();
            match next.unwrap_or(Ok(self.fallback)) {
                Ok(status) => Ok(TileResponse {
                    status,
                    body: if status == 200 {
                        format!("tile:{}", url).into_bytes()
                    } else {
                        Vec::new()
                    },
                    headers: format!("{{\"x-status\": \"{}\"}}", status),
                }),
                Err(message) => Err(FetchError::Transport {
                    url: url.to_string(),
                    message,
                }),
            }
        }
    }
}
