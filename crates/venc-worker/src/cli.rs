//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::WorkerConfig;

#[derive(Debug, Parser)]
#[command(name = "venc-worker", version, about = "Queue-driven video encoding worker")]
pub struct Cli {
    /// Environment file loaded before reading configuration
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// Queue backend base URL
    #[arg(long)]
    pub api_url: Option<String>,

    /// Local temp directory
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Idle sleep in seconds when the queue is empty
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Retry budget for jobs that do not carry one
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Default log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Poll the queue and encode jobs until interrupted
    Run,
    /// Check disk space, FFmpeg and API connectivity
    HealthCheck,
    /// Load the configuration and report problems
    ValidateConfig,
    /// Print the effective configuration with secrets masked
    ShowConfig,
    /// Print queue statistics
    Stats,
    /// Print the status of one job
    JobStatus { code: String },
    /// Reset jobs stuck in processing
    ResetStuck,
    /// Re-queue a failed job
    Retry { code: String },
}

impl Cli {
    /// Selected subcommand, `run` when none was given.
    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// Apply flag values on top of the environment configuration.
    pub fn apply_overrides(&self, config: &mut WorkerConfig) {
        if let Some(url) = &self.api_url {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = &self.temp_dir {
            config.temp_dir = dir.clone();
        }
        if let Some(secs) = self.poll_interval.filter(|s| *s > 0) {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.to_ascii_lowercase();
        }
    }

    /// API URL given on the command line or in the environment.
    ///
    /// Lets `--api-url` stand in for a missing `ENCODER_API_URL`.
    pub fn env_lookup(&self, key: &str) -> Option<String> {
        match (key, &self.api_url) {
            ("ENCODER_API_URL", Some(url)) => Some(url.clone()),
            _ => std::env::var(key).ok(),
        }
    }
}
