//! tilecrawl: polite, resumable bulk download of map tiles into MBTiles.
//!
//! Walks every configured source zoom by zoom, row by row, with a fixed delay
//! between requests and round-robin over the source's mirrors. Tiles are
//! gzip-compressed and written to the source's MBTiles file in batches; the
//! crawl position is checkpointed to plain-text files so that a restart picks
//! up where the last session stopped. A completed pass over a source is
//! archived to a pass-numbered copy before the crawl moves on to the next
//! source, cycling through the list until stopped.

#![warn(clippy::all)]

mod batch;
mod cli;
mod config;
mod crawl;
mod fetch;
mod grid;
mod logging;
mod mirror;
mod shutdown;
mod source;
mod state;
mod store;
mod systemd;
mod types;

use std::process::ExitCode;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use crawl::{CrawlSummary, Crawler, StopReason};
use fetch::HttpTileClient;
use store::MbtilesStore;
use systemd::SystemdNotifier;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Run the status command.
async fn run_status(config: &Config) -> anyhow::Result<()> {
    let sources = source::load_sources(&config.sources_path)?;
    let checkpoints = config.checkpoint_store();

    println!("Source list: {}", config.sources_path.display());
    println!();
    match checkpoints.load_global().await? {
        Some(cp) => {
            let key = sources
                .get(cp.source_index)
                .map(|s| s.key.as_str())
                .unwrap_or("<not configured>");
            println!("Download state ({}):", checkpoints.global_path().display());
            println!("  Source:     {} ({})", cp.source_index, key);
            println!("  Position:   {}/{}/{}", cp.zoom, cp.x, cp.y);
            println!("  Collected:  {} tiles this pass", cp.total);
        }
        None => {
            println!(
                "No download state at {}; the next crawl starts fresh.",
                checkpoints.global_path().display()
            );
        }
    }

    println!();
    println!("Sources:");
    for source in &sources {
        let passes = checkpoints.load_source(&source.key).await?;
        let (name, tiles) = if source.store_path.exists() {
            let store = MbtilesStore::new(&source.store_path);
            let name = store.metadata_value("name").await?;
            (name, store.tile_count().await?.to_string())
        } else {
            (None, "-".to_string())
        };
        println!(
            "  {:<20} zoom {:>2}..={:<2}  passes {:<4} tiles {:<10} {}",
            source.key,
            source.min_zoom,
            source.max_zoom,
            passes,
            tiles,
            name.as_deref().unwrap_or(&source.display_name)
        );
        if passes > 0 {
            println!(
                "  {:<20} last archive {}",
                "",
                store::archive_path(&source.store_path, passes).display()
            );
        }
    }

    Ok(())
}

/// Load sources, build the client and crawl until stopped.
async fn run_crawl(config: &Config) -> anyhow::Result<CrawlSummary> {
    let sources = source::load_sources(&config.sources_path)?;
    tracing::info!(
        "Loaded {} map sources from {}",
        sources.len(),
        config.sources_path.display()
    );

    let client = HttpTileClient::new(&config.user_agent, config.timeout)?;
    let notifier = SystemdNotifier::new(config.notify_systemd);
    let shutdown_token = shutdown::install_signal_handler();

    notifier.notify_ready();
    let result = Crawler::new(
        client,
        sources,
        config.checkpoint_store(),
        config.crawl_options(),
        shutdown_token,
    )
    .with_notifier(notifier)
    .run()
    .await;
    notifier.notify_stopping();
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();
    let config = Config::from_cli(&cli)?;

    if matches!(cli.effective_command(), Command::Status) {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter())),
            )
            .init();
        run_status(&config).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let _log_guard = logging::init_logging(&config.log_file, config.log_level)
        .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
    tracing::info!("------ Start at {} ------", Local::now().format(TIMESTAMP_FORMAT));
    tracing::debug!(?config, "Configuration");

    let ended = || Local::now().format(TIMESTAMP_FORMAT);
    match run_crawl(&config).await {
        Ok(summary) => {
            match &summary.reason {
                StopReason::Shutdown => {
                    tracing::info!("Shutdown received - graceful exit successful.")
                }
                StopReason::PassLimit => tracing::info!(
                    "Completed {} source passes - exiting.",
                    summary.passes
                ),
                StopReason::Fatal(_) => {
                    tracing::error!("Download error - state saved, exiting with error.")
                }
            }
            tracing::info!(
                "------ Download ended at {} after getting {} tiles ({} store writes). ------",
                ended(),
                summary.session_tiles,
                summary.flushes
            );
            if matches!(summary.reason, StopReason::Fatal(_)) {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(e) => {
            tracing::error!("Crawl aborted: {:#}", e);
            tracing::info!("------ Download ended at {} with an error. ------", ended());
            Ok(ExitCode::FAILURE)
        }
    }
}
