use clap::{Args, Parser, Subcommand};

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "tilecrawl",
    version,
    about = "Polite, resumable map tile downloader into MBTiles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub paths: PathArgs,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
}

impl Cli {
    /// The subcommand to run; a bare invocation crawls with default options.
    pub fn effective_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Crawl(CrawlArgs::default()))
    }
}

/// Locations of the source list and the state files.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// JSON source list
    #[arg(
        short = 'c',
        long = "config",
        env = "TILECRAWL_CONFIG",
        default_value = "./mapconfig.json",
        global = true
    )]
    pub config: String,

    /// Global download state file
    #[arg(
        long,
        env = "TILECRAWL_STATE_FILE",
        default_value = "./DownloadState.txt",
        global = true
    )]
    pub state_file: String,

    /// Directory for the per-source `<key>_status.txt` pass counters
    #[arg(
        long,
        env = "TILECRAWL_STATUS_DIR",
        default_value = ".",
        global = true
    )]
    pub status_dir: String,

    /// Log file (appended to, never truncated)
    #[arg(
        long,
        env = "TILECRAWL_LOG_FILE",
        default_value = "./download.log",
        global = true
    )]
    pub log_file: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Crawl all configured sources, resuming from the saved state (default)
    Crawl(CrawlArgs),

    /// Show saved progress, pass counters and stored tile counts
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Write to the store every N collected tiles
    #[arg(long, default_value_t = crate::batch::DEFAULT_WRITE_INTERVAL)]
    pub write_interval: usize,

    /// User-Agent sent with every request
    #[arg(long, env = "TILECRAWL_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Stop after this many completed source passes (default: run until stopped)
    #[arg(long)]
    pub passes: Option<u64>,

    /// Send sd_notify READY/STATUS/WATCHDOG/STOPPING messages
    #[arg(long)]
    pub notify_systemd: bool,
}

impl Default for CrawlArgs {
    fn default() -> Self {
        Self {
            write_interval: crate::batch::DEFAULT_WRITE_INTERVAL,
            user_agent: None,
            timeout: 60,
            passes: None,
            notify_systemd: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_crawls_with_defaults() {
        let cli = Cli::try_parse_from(["tilecrawl"]).unwrap();
        let Command::Crawl(args) = cli.effective_command() else {
            panic!("expected crawl");
        };
        assert_eq!(args.write_interval, 250);
        assert_eq!(args.timeout, 60);
        assert_eq!(args.passes, None);
        assert_eq!(cli.paths.state_file, "./DownloadState.txt");
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn crawl_flags_parse() {
        let cli = Cli::try_parse_from([
            "tilecrawl",
            "crawl",
            "--write-interval",
            "50",
            "--passes",
            "2",
            "--notify-systemd",
            "--config",
            "/etc/tilecrawl/maps.json",
        ])
        .unwrap();
        let Command::Crawl(args) = cli.effective_command() else {
            panic!("expected crawl");
        };
        assert_eq!(args.write_interval, 50);
        assert_eq!(args.passes, Some(2));
        assert!(args.notify_systemd);
        assert_eq!(cli.paths.config, "/etc/tilecrawl/maps.json");
    }

    #[test]
    fn status_accepts_global_paths() {
        let cli =
            Cli::try_parse_from(["tilecrawl", "status", "--status-dir", "/var/lib/tiles"]).unwrap();
        assert!(matches!(cli.effective_command(), Command::Status));
        assert_eq!(cli.paths.status_dir, "/var/lib/tiles");
    }

    #[test]
    fn rejects_unknown_log_level() {
        assert!(Cli::try_parse_from(["tilecrawl", "--log-level", "loud"]).is_err());
    }
}
