//! The export schema
//!
//! These are the only types allowed to leave the machine. None of them has a
//! field that can hold a path, a username or message text; project identity is
//! reduced to an ordinal [`ProjectLabel`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use vibeclock_core::aggregation_types::DailyActivity;
use vibeclock_core::types::{Source, TokenCounts};

/// Anonymous project name such as "Project A" or "Project AB"
///
/// Can only be built from an ordinal, so no raw label can ever end up inside.
///
/// # Examples
/// ```
/// use vibeclock_sanitizer::ProjectLabel;
///
/// assert_eq!(ProjectLabel::from_ordinal(0).as_str(), "Project A");
/// assert_eq!(ProjectLabel::from_ordinal(25).as_str(), "Project Z");
/// assert_eq!(ProjectLabel::from_ordinal(26).as_str(), "Project AA");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProjectLabel(String);

impl ProjectLabel {
    /// Label for the zero-based `ordinal`, in bijective base 26
    pub fn from_ordinal(ordinal: usize) -> Self {
        let mut letters = Vec::new();
        let mut n = ordinal + 1;
        while n > 0 {
            n -= 1;
            letters.push(char::from(b'A' + (n % 26) as u8));
            n /= 26;
        }
        let suffix: String = letters.into_iter().rev().collect();
        Self(format!("Project {suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session count for one anonymized project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymizedProject {
    pub label: ProjectLabel,
    pub sessions: u64,
}

/// Publishable view of one source's stats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizedAgentStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub total_duration_secs: u64,
    pub longest_session_secs: u64,
    pub token_totals: BTreeMap<String, TokenCounts>,
    pub hourly_histogram: [u64; 24],
    pub weekly_histogram: [u64; 7],
    pub daily: Vec<DailyActivity>,
    /// Descending session count
    pub projects: Vec<AnonymizedProject>,
}

impl SanitizedAgentStats {
    /// Token counts summed across every model
    pub fn total_tokens(&self) -> TokenCounts {
        self.token_totals
            .values()
            .fold(TokenCounts::default(), |acc, tokens| acc + *tokens)
    }
}

/// Everything that is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizedExport {
    /// End of the aggregation window
    pub generated_at: DateTime<Utc>,
    pub since: DateTime<Utc>,
    pub days_covered: i64,
    pub totals: SanitizedAgentStats,
    pub per_source: BTreeMap<Source, SanitizedAgentStats>,
    pub active_sources: Vec<Source>,
    pub favorite_model: Option<String>,
    pub peak_hour: u8,
}
