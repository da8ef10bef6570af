//! Crawl progress persistence.
//!
//! Two kinds of plain-text checkpoint files are kept:
//! - one global file with the crawl position (source, zoom, column, row and
//!   the cumulative tile count of the current source pass)
//! - one file per source with the number of completed passes
//!
//! Saves rewrite the whole file in place. There is no write-to-temp and
//! rename, so a crash during a save can leave a truncated file; loading such
//! a file fails with [`CheckpointError::Corrupt`] instead of silently
//! restarting from scratch.

pub mod checkpoint;
pub mod error;

pub use checkpoint::{CheckpointStore, GlobalCheckpoint};
pub use error::CheckpointError;
