//! Command-line interface for voxbridge
//!
//! Provides argument parsing using clap derive macros.

use crate::config::Config;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Answer spoken questions dropped into a directory, in another language
#[derive(Parser, Debug)]
#[command(name = "voxbridge", version, about = "Spoken question in, translated spoken answer out")]
pub struct Cli {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode: warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a duration string into whole seconds.
///
/// Accepts bare numbers (seconds) and anything `humantime` understands:
/// `30s`, `5m`, `1h30m`.
fn parse_secs(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_secs())
        .map_err(|e| e.to_string())
}

/// Overrides applied on top of the loaded configuration.
#[derive(clap::Args, Debug, Default, Clone, PartialEq)]
pub struct RunOverrides {
    /// Directory to watch for audio artifacts
    #[arg(long, value_name = "DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Directory for synthesized audio segments
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Target language code (e.g., bn-IN, hi-IN)
    #[arg(long, value_name = "LANG")]
    pub target: Option<String>,

    /// Number of pipeline workers
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-job deadline. Examples: 90s, 5m
    #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
    pub job_timeout: Option<u64>,

    /// Keep source artifacts after processing
    #[arg(long)]
    pub keep_source: bool,
}

impl RunOverrides {
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.watch_dir {
            config.watch.dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(target) = &self.target {
            config.languages.target = target.clone();
        }
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(secs) = self.job_timeout {
            config.pipeline.job_timeout_secs = Some(secs);
        }
        if self.keep_source {
            config.pipeline.delete_source = false;
        }
        config
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the input directory and process artifacts until interrupted
    Run {
        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Process a single WAV file and print its status as JSON
    Process {
        /// WAV file to process (kept in place)
        file: PathBuf,

        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (file + environment), keys redacted
    Show,
    /// Print the default configuration file path
    Path,
    /// Dump the default configuration as TOML
    Dump,
}

/// Replaces credentials with a placeholder for display.
pub fn redact(mut config: Config) -> Config {
    const REDACTED: &str = "********";
    if config.providers.api_key.is_some() {
        config.providers.api_key = Some(REDACTED.to_string());
    }
    if config.providers.llm_api_key.is_some() {
        config.providers.llm_api_key = Some(REDACTED.to_string());
    }
    config
}

/// `log` filter for the given verbosity flags.
pub fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    }
}
