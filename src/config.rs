use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{Cli, Command, CrawlArgs};
use crate::crawl::CrawlOptions;
use crate::fetch::DEFAULT_USER_AGENT;
use crate::state::CheckpointStore;
use crate::types::LogLevel;

/// Runtime settings resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub sources_path: PathBuf,
    pub state_file: PathBuf,
    pub status_dir: PathBuf,
    pub log_file: PathBuf,
    pub user_agent: String,

    pub timeout: Duration,
    pub write_interval: usize,
    pub max_passes: Option<u64>,

    pub log_level: LogLevel,
    pub notify_systemd: bool,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// Build the configuration. `status` reuses the crawl defaults since it
    /// only needs the paths.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let crawl = match cli.effective_command() {
            Command::Crawl(args) => args,
            Command::Status => CrawlArgs::default(),
        };

        if crawl.write_interval == 0 {
            anyhow::bail!("--write-interval must be at least 1");
        }
        if crawl.timeout == 0 {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        if crawl.passes == Some(0) {
            anyhow::bail!("--passes must be at least 1 when given");
        }

        let user_agent = crawl
            .user_agent
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Ok(Self {
            sources_path: expand_tilde(&cli.paths.config),
            state_file: expand_tilde(&cli.paths.state_file),
            status_dir: expand_tilde(&cli.paths.status_dir),
            log_file: expand_tilde(&cli.paths.log_file),
            user_agent,
            timeout: Duration::from_secs(crawl.timeout),
            write_interval: crawl.write_interval,
            max_passes: crawl.passes,
            log_level: cli.log_level,
            notify_systemd: crawl.notify_systemd,
        })
    }

    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::new(&self.state_file, &self.status_dir)
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            write_interval: self.write_interval,
            max_passes: self.max_passes,
        }
    }
}
