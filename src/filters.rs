//! Privacy filters applied before aggregation
//!
//! Sessions can be excluded by project (glob patterns over the raw project
//! label) or by local calendar date. Excluded sessions never reach the
//! aggregator, so they leave no trace in any count.
//!
//! # Examples
//!
//! ```
//! use vibeclock::filters::SessionFilter;
//! use vibeclock_core::timezone::TimezoneConfig;
//!
//! let filter = SessionFilter::new(TimezoneConfig::utc())
//!     .with_project_pattern("*/client-*")
//!     .unwrap();
//! assert!(filter.excludes_project("/work/client-acme"));
//! assert!(!filter.excludes_project("/work/oss"));
//! ```

use chrono::NaiveDate;
use glob::Pattern;
use tracing::debug;
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_core::timezone::TimezoneConfig;
use vibeclock_core::types::Session;

use crate::collector::SessionsBySource;
use crate::config::PrivacyConfig;

/// Exclusion rules for sessions
#[derive(Debug, Clone)]
pub struct SessionFilter {
    project_patterns: Vec<Pattern>,
    date_ranges: Vec<(NaiveDate, NaiveDate)>,
    timezone_config: TimezoneConfig,
}

impl SessionFilter {
    /// A filter that excludes nothing
    pub fn new(timezone_config: TimezoneConfig) -> Self {
        Self {
            project_patterns: Vec::new(),
            date_ranges: Vec::new(),
            timezone_config,
        }
    }

    /// Build from the `[privacy]` config section
    pub fn from_config(privacy: &PrivacyConfig, timezone_config: TimezoneConfig) -> Result<Self> {
        let mut filter = Self::new(timezone_config);
        for pattern in &privacy.exclude_projects {
            filter = filter.with_project_pattern(pattern)?;
        }
        for (start, end) in &privacy.exclude_date_ranges {
            filter = filter.with_date_range(*start, *end);
        }
        Ok(filter)
    }

    /// Exclude projects whose whole raw label matches the glob `pattern`
    ///
    /// `*` also crosses `/`, so `*secret*` catches any path containing it.
    pub fn with_project_pattern(mut self, pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| {
            VibeclockError::Config(format!("invalid exclude_projects pattern '{pattern}': {e}"))
        })?;
        self.project_patterns.push(compiled);
        Ok(self)
    }

    /// Exclude sessions starting on a local date in `[start, end]`
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_ranges.push((start, end));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.project_patterns.is_empty() && self.date_ranges.is_empty()
    }

    pub fn excludes_project(&self, label: &str) -> bool {
        self.project_patterns.iter().any(|p| p.matches(label))
    }

    pub fn excludes_date(&self, date: NaiveDate) -> bool {
        self.date_ranges
            .iter()
            .any(|(start, end)| *start <= date && date <= *end)
    }

    /// Check if a session survives the filter
    pub fn matches(&self, session: &Session) -> bool {
        let date = self.timezone_config.local_date(session.started_at());
        !self.excludes_project(session.project_label()) && !self.excludes_date(date)
    }

    /// Fresh mapping holding only the sessions that survive
    pub fn apply(&self, sessions: &SessionsBySource) -> SessionsBySource {
        sessions
            .iter()
            .map(|(source, list)| {
                let kept: Vec<Session> = list.iter().filter(|s| self.matches(s)).cloned().collect();
                if kept.len() != list.len() {
                    debug!(
                        "Privacy filter removed {} {} session(s)",
                        list.len() - kept.len(),
                        source
                    );
                }
                (*source, kept)
            })
            .collect()
    }
}
