//! CLI interface for vibeclock
//!
//! `vibeclock [summary|export|push] [flags]`. When the command is omitted it
//! defaults to `summary`.
//!
//! # Example
//!
//! ```bash
//! # Summary of the last 7 days in Tokyo time
//! vibeclock --days 7 --timezone Asia/Tokyo
//!
//! # Write the sanitized export to a file
//! vibeclock export --sanitized --output stats.json
//!
//! # Show exactly what a push would send, without sending it
//! vibeclock push --dry-run
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

/// Default file written by `export`
pub const DEFAULT_EXPORT_FILE: &str = "vibe-clock-data.json";

/// Summarize and publish AI coding agent usage
#[derive(Parser, Debug, Clone)]
#[command(name = "vibeclock")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Length of the trailing window in days (overrides general.default_days)
    #[arg(long, short = 'd', global = true)]
    pub days: Option<u32>,

    /// Timezone for hour and day buckets (e.g. "America/New_York", "Asia/Tokyo", "UTC")
    /// If not specified, uses the system's local timezone
    #[arg(long, short = 'z', global = true)]
    pub timezone: Option<String>,

    /// Use UTC for hour and day buckets (overrides --timezone)
    #[arg(long, global = true)]
    pub utc: bool,

    /// Path to the config file (default: $VIBE_CLOCK_CONFIG or ~/.config/vibe-clock/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Window length, from `--days` or the config
    pub fn days(&self, config: &Config) -> u32 {
        self.days
            .filter(|days| *days > 0)
            .unwrap_or(config.general.default_days)
    }
}

/// Arguments for the export command
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output file path
    #[arg(long, short = 'o', default_value = DEFAULT_EXPORT_FILE)]
    pub output: PathBuf,

    /// Write the sanitized, PII-checked export instead of the raw local stats
    #[arg(long)]
    pub sanitized: bool,
}

/// Arguments for the push command
#[derive(Args, Debug, Clone)]
pub struct PushArgs {
    /// Preview what would be pushed without actually pushing
    #[arg(long)]
    pub dry_run: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show a summary of agent usage
    Summary,

    /// Export aggregated stats as JSON
    Export(ExportArgs),

    /// Push sanitized stats to a GitHub gist
    Push(PushArgs),
}
