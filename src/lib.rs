//! vibeclock - Summarize and publish AI coding agent usage from local logs
//!
//! This library provides functionality to:
//! - Read session logs written by Claude Code, Codex and OpenCode
//! - Apply local privacy exclusions to the collected sessions
//! - Aggregate sessions into per-source and combined statistics
//! - Render reports in table and JSON formats
//! - Publish a sanitized, PII-checked export to a GitHub gist
//!
//! # Examples
//!
//! ```no_run
//! use vibeclock::{
//!     aggregation::Aggregator,
//!     collector::{collect_sources, readers_from_config},
//!     config::Config,
//! };
//! use vibeclock_core::aggregation_types::AggregationWindow;
//! use vibeclock_core::timezone::TimezoneConfig;
//! use vibeclock_sanitizer::{Sanitize, validate_no_pii};
//!
//! #[tokio::main]
//! async fn main() -> vibeclock::Result<()> {
//!     let config = Config::load(None)?;
//!     let window = AggregationWindow::trailing_days(chrono::Utc::now(), config.general.default_days)?;
//!
//!     let readers = readers_from_config(&config);
//!     let (sessions, _reports) = collect_sources(&readers, window.since, false).await;
//!
//!     let stats = Aggregator::new(TimezoneConfig::default()).aggregate(&sessions, &window);
//!     let verified = validate_no_pii(&stats.sanitize())?;
//!     println!("{}", verified.to_json_pretty()?);
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod collector;
pub mod config;
pub mod filters;
pub mod output;
pub mod publish;

// Re-export commonly used types
pub use vibeclock_core::{Result, Session, Source, TimezoneConfig, TokenCounts, VibeclockError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
