//! Aggregation of normalized sessions into usage statistics
//!
//! The aggregator is a pure fold: it reads the sessions of every source,
//! keeps those inside the window and builds a fresh [`AgentStats`] value per
//! session. Per-source stats are then merged into the cross-source totals.
//! The current time never enters here; it arrives through the
//! [`AggregationWindow`], so identical input always serializes identically.
//!
//! # Examples
//!
//! ```
//! use vibeclock::aggregation::Aggregator;
//! use vibeclock::collector::SessionsBySource;
//! use vibeclock_core::aggregation_types::AggregationWindow;
//! use vibeclock_core::timezone::TimezoneConfig;
//! use vibeclock_core::types::{Session, Source, TokenCounts};
//! use chrono::{TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
//! let session = Session::builder(Source::ClaudeCode, "s1", start)
//!     .message_count(5)
//!     .tokens("claude-3-opus", TokenCounts::new(100, 50, 0, 0))
//!     .build();
//!
//! let mut sessions = SessionsBySource::new();
//! sessions.insert(Source::ClaudeCode, vec![session]);
//!
//! let window = AggregationWindow::trailing_days(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(), 7).unwrap();
//! let stats = Aggregator::new(TimezoneConfig::utc()).aggregate(&sessions, &window);
//! assert_eq!(stats.totals.total_messages, 5);
//! assert_eq!(stats.peak_hour, 10);
//! ```

use std::collections::BTreeMap;
use tracing::debug;
use vibeclock_core::aggregation_types::{AgentStats, AggregationWindow, CombinedStats};
use vibeclock_core::timezone::TimezoneConfig;
use vibeclock_core::types::Session;

use crate::collector::SessionsBySource;

/// Main aggregation engine
#[derive(Debug, Clone)]
pub struct Aggregator {
    timezone_config: TimezoneConfig,
}

impl Aggregator {
    /// Create an aggregator bucketing hours and days in `timezone_config`
    pub fn new(timezone_config: TimezoneConfig) -> Self {
        Self { timezone_config }
    }

    /// Get the timezone configuration
    pub fn timezone_config(&self) -> &TimezoneConfig {
        &self.timezone_config
    }

    /// Stats for one source's sessions that fall inside `window`
    pub fn aggregate_source(&self, sessions: &[Session], window: &AggregationWindow) -> AgentStats {
        let stats = sessions
            .iter()
            .filter(|session| window.contains(session.started_at()))
            .fold(AgentStats::default(), |stats, session| {
                stats.with_session(session, &self.timezone_config)
            });
        debug_assert!(stats.check_invariants().is_ok());
        stats
    }

    /// Per-source stats and their cross-source totals
    ///
    /// Every source present in `sessions` gets an entry, even when none of its
    /// sessions survive the window.
    pub fn aggregate(&self, sessions: &SessionsBySource, window: &AggregationWindow) -> CombinedStats {
        let per_source: BTreeMap<_, _> = sessions
            .iter()
            .map(|(source, list)| {
                let stats = self.aggregate_source(list, window);
                debug!(
                    "{}: {} of {} session(s) inside window",
                    source,
                    stats.total_sessions,
                    list.len()
                );
                (*source, stats)
            })
            .collect();

        let combined = CombinedStats::from_sources(*window, per_source);
        debug_assert!(combined.check_invariants().is_ok());
        combined
    }
}
