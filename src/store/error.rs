//! Error types for the tile store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing an MBTiles file.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or create the database file.
    #[error("Failed to open tile store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// A statement or transaction failed.
    #[error("Tile store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Failed to copy the store to its archive file.
    #[error("Failed to archive {from} to {to}: {source}")]
    Archive {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Failed to spawn a blocking task.
    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    /// The file was written by a newer schema than this build understands.
    #[error("Tile store schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}
