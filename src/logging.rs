//! Logging to the console and an append-only log file.
//!
//! Every line is timestamped and written to both sinks; the log file keeps
//! the history of all sessions and is never truncated. `RUST_LOG` overrides
//! the level given on the command line.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::types::LogLevel;

/// Keeps the background file writer alive; dropping it flushes the file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Directory and file name of `log_file`, defaulting the directory to `.`.
fn split_log_path(log_file: &Path) -> io::Result<(PathBuf, OsString)> {
    let name = log_file.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log file path {} has no file name", log_file.display()),
        )
    })?;
    let dir = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name.to_os_string()))
}

/// Install the global subscriber. Must be called once, before any logging.
pub fn init_logging(log_file: &Path, level: LogLevel) -> io::Result<LoggingGuard> {
    let (dir, name) = split_log_path(log_file)?;
    fs::create_dir_all(&dir)?;

    // `never` opens the file in append mode.
    let file_appender = tracing_appender::rolling::never(&dir, &name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(false);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
