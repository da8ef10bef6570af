use std::path::{Path, PathBuf};

use super::error::CheckpointError;

/// Position of the crawl at the time of the last save.
///
/// Usually the next tile to attempt; after a shutdown or a fatal stop it is
/// the last tile whose attempt completed. Either way, every tile before it
/// is in the store or will be enumerated again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalCheckpoint {
    pub source_index: usize,
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
    /// Tiles written for the current source pass so far.
    pub total: u64,
}

impl GlobalCheckpoint {
    fn to_text(self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n",
            self.source_index, self.zoom, self.x, self.y, self.total
        )
    }

    fn parse(text: &str, path: &Path) -> Result<Self, CheckpointError> {
        let mut lines = text.lines();
        Ok(Self {
            source_index: parse_line(&mut lines, path, 1, "source")?,
            zoom: parse_line(&mut lines, path, 2, "zoom")?,
            x: parse_line(&mut lines, path, 3, "x")?,
            y: parse_line(&mut lines, path, 4, "y")?,
            total: parse_line(&mut lines, path, 5, "total tile count")?,
        })
    }
}

fn parse_line<'a, T>(
    lines: &mut impl Iterator<Item = &'a str>,
    path: &Path,
    line: usize,
    field: &'static str,
) -> Result<T, CheckpointError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let corrupt = |reason: String| CheckpointError::Corrupt {
        path: path.to_path_buf(),
        line,
        field,
        reason,
    };
    let raw = lines
        .next()
        .ok_or_else(|| corrupt("line missing".to_string()))?;
    raw.trim()
        .parse()
        .map_err(|e: T::Err| corrupt(format!("{:?}: {}", raw, e)))
}

/// Reads and writes the global and per-source checkpoint files.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    global_path: PathBuf,
    status_dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(global_path: impl Into<PathBuf>, status_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_path: global_path.into(),
            status_dir: status_dir.into(),
        }
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    /// `<status_dir>/<key>_status.txt`; path separators in the key are
    /// replaced so the file always lands in the status directory.
    pub fn source_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.status_dir.join(format!("{}_status.txt", safe))
    }

    pub async fn save_global(&self, checkpoint: &GlobalCheckpoint) -> Result<(), CheckpointError> {
        write_file(&self.global_path, checkpoint.to_text()).await?;
        tracing::debug!(
            source = checkpoint.source_index,
            zoom = checkpoint.zoom,
            x = checkpoint.x,
            y = checkpoint.y,
            total = checkpoint.total,
            "Updated download state"
        );
        Ok(())
    }

    /// `None` when no checkpoint has been written yet.
    pub async fn load_global(&self) -> Result<Option<GlobalCheckpoint>, CheckpointError> {
        match read_file(&self.global_path).await? {
            Some(text) => GlobalCheckpoint::parse(&text, &self.global_path).map(Some),
            None => Ok(None),
        }
    }

    pub async fn save_source(&self, key: &str, completed_passes: u64) -> Result<(), CheckpointError> {
        write_file(&self.source_path(key), format!("{}\n", completed_passes)).await
    }

    /// Completed passes for `key`, zero when the file does not exist.
    pub async fn load_source(&self, key: &str) -> Result<u64, CheckpointError> {
        let path = self.source_path(key);
        match read_file(&path).await? {
            Some(text) => parse_line(&mut text.lines(), &path, 1, "completed passes"),
            None => Ok(0),
        }
    }
}

async fn read_file(path: &Path) -> Result<Option<String>, CheckpointError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Truncate and rewrite `path`.
async fn write_file(path: &Path, contents: String) -> Result<(), CheckpointError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}
