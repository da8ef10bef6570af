//! Error types for checkpoint persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing checkpoint files.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Failed to read or write the file.
    #[error("Checkpoint file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file exists but a line is missing or not a number, usually
    /// because a previous write was cut short.
    #[error("Checkpoint file {path} is corrupt at line {line} ({field}): {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        field: &'static str,
        reason: String,
    },
}
