//! Aggregation data types for vibeclock
//!
//! Pure data structures produced by the aggregator. Every fold step builds a
//! fresh value; nothing here performs I/O.
//!
//! `AgentStats` and `CombinedStats` still carry raw project labels, so they
//! are only fit for local rendering. Anything leaving the machine goes through
//! the sanitizer first.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{Result, VibeclockError};
use crate::timezone::TimezoneConfig;
use crate::types::{ModelName, Session, Source, TokenCounts, merge_model_usage};

/// Time range `[since, until]` stats are computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregationWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl AggregationWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    /// The `days` days ending at `now`
    ///
    /// # Examples
    /// ```
    /// use vibeclock_core::aggregation_types::AggregationWindow;
    /// use chrono::{TimeZone, Utc};
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
    /// let window = AggregationWindow::trailing_days(now, 30).unwrap();
    /// assert_eq!(window.days(), 30);
    /// assert_eq!(window.since, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    ///
    /// // Reaching past the earliest representable date is a config error
    /// assert!(AggregationWindow::trailing_days(now, 100_000_000).is_err());
    /// ```
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Result<Self> {
        let since = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| VibeclockError::Config(format!("window of {days} days is out of range")))?;
        Ok(Self { since, until: now })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.since && ts <= self.until
    }

    /// Whole days covered by the window
    pub fn days(&self) -> i64 {
        (self.until - self.since).num_days().max(0)
    }
}

/// Activity on one local calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub sessions: u64,
    pub messages: u64,
    pub duration_secs: u64,
    /// Total tokens across all models
    pub tokens: u64,
}

impl DailyActivity {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            sessions: 0,
            messages: 0,
            duration_secs: 0,
            tokens: 0,
        }
    }

    fn combined(&self, other: &Self) -> Self {
        Self {
            date: self.date,
            sessions: self.sessions + other.sessions,
            messages: self.messages + other.messages,
            duration_secs: self.duration_secs + other.duration_secs,
            tokens: self.tokens.saturating_add(other.tokens),
        }
    }
}

/// Session count for one raw project label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSessions {
    pub label: String,
    pub sessions: u64,
}

/// Aggregated view of one source, or of all sources combined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub total_duration_secs: u64,
    pub longest_session_secs: u64,
    pub token_totals: BTreeMap<ModelName, TokenCounts>,
    /// Sessions by local hour of `started_at`
    pub hourly_histogram: [u64; 24],
    /// Sessions by local weekday of `started_at`, Monday first
    pub weekly_histogram: [u64; 7],
    /// Sorted by date
    pub daily: Vec<DailyActivity>,
    /// First-seen order
    pub project_sessions: Vec<ProjectSessions>,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            total_sessions: 0,
            total_messages: 0,
            total_duration_secs: 0,
            longest_session_secs: 0,
            token_totals: BTreeMap::new(),
            hourly_histogram: [0; 24],
            weekly_histogram: [0; 7],
            daily: Vec::new(),
            project_sessions: Vec::new(),
        }
    }
}

impl AgentStats {
    /// Fold one session into these stats
    pub fn with_session(self, session: &Session, tz: &TimezoneConfig) -> Self {
        let duration_secs = session.duration().num_seconds().max(0) as u64;
        let session_tokens = session.total_tokens().total();

        let mut hourly_histogram = self.hourly_histogram;
        hourly_histogram[tz.hour_of(session.started_at())] += 1;
        let mut weekly_histogram = self.weekly_histogram;
        weekly_histogram[tz.weekday_of(session.started_at())] += 1;

        let date = tz.local_date(session.started_at());
        let single_day = DailyActivity {
            date,
            sessions: 1,
            messages: session.message_count(),
            duration_secs,
            tokens: session_tokens,
        };

        let single_project = [ProjectSessions {
            label: session.project_label().to_string(),
            sessions: 1,
        }];

        Self {
            total_sessions: self.total_sessions + 1,
            total_messages: self.total_messages + session.message_count(),
            total_duration_secs: self.total_duration_secs + duration_secs,
            longest_session_secs: self.longest_session_secs.max(duration_secs),
            token_totals: merge_model_usage(&self.token_totals, session.model_usage()),
            hourly_histogram,
            weekly_histogram,
            daily: merge_daily(&self.daily, std::slice::from_ref(&single_day)),
            project_sessions: merge_projects(&self.project_sessions, &single_project),
        }
    }

    /// Elementwise combination; associative, left projects first
    pub fn merge(&self, other: &Self) -> Self {
        let mut hourly_histogram = self.hourly_histogram;
        for (slot, count) in hourly_histogram.iter_mut().zip(other.hourly_histogram) {
            *slot += count;
        }
        let mut weekly_histogram = self.weekly_histogram;
        for (slot, count) in weekly_histogram.iter_mut().zip(other.weekly_histogram) {
            *slot += count;
        }

        Self {
            total_sessions: self.total_sessions + other.total_sessions,
            total_messages: self.total_messages + other.total_messages,
            total_duration_secs: self.total_duration_secs + other.total_duration_secs,
            longest_session_secs: self.longest_session_secs.max(other.longest_session_secs),
            token_totals: merge_model_usage(&self.token_totals, &other.token_totals),
            hourly_histogram,
            weekly_histogram,
            daily: merge_daily(&self.daily, &other.daily),
            project_sessions: merge_projects(&self.project_sessions, &other.project_sessions),
        }
    }

    /// Projects by descending session count, ties in first-seen order
    pub fn top_projects(&self) -> Vec<ProjectSessions> {
        let mut projects = self.project_sessions.clone();
        projects.sort_by(|a, b| b.sessions.cmp(&a.sessions));
        projects
    }

    /// Token counts summed across every model
    pub fn total_tokens(&self) -> TokenCounts {
        self.token_totals
            .values()
            .fold(TokenCounts::default(), |acc, tokens| acc + *tokens)
    }

    /// Verify the internal consistency of the counters
    pub fn check_invariants(&self) -> Result<()> {
        let hourly: u64 = self.hourly_histogram.iter().sum();
        if hourly != self.total_sessions {
            return Err(VibeclockError::InvariantViolation(format!(
                "hourly histogram sums to {hourly}, expected {}",
                self.total_sessions
            )));
        }
        let weekly: u64 = self.weekly_histogram.iter().sum();
        if weekly != self.total_sessions {
            return Err(VibeclockError::InvariantViolation(format!(
                "weekly histogram sums to {weekly}, expected {}",
                self.total_sessions
            )));
        }
        let daily: u64 = self.daily.iter().map(|d| d.sessions).sum();
        if daily != self.total_sessions {
            return Err(VibeclockError::InvariantViolation(format!(
                "daily activity sums to {daily}, expected {}",
                self.total_sessions
            )));
        }
        let projects: u64 = self.project_sessions.iter().map(|p| p.sessions).sum();
        if projects != self.total_sessions {
            return Err(VibeclockError::InvariantViolation(format!(
                "project counts sum to {projects}, expected {}",
                self.total_sessions
            )));
        }
        if self.daily.windows(2).any(|pair| pair[0].date >= pair[1].date) {
            return Err(VibeclockError::InvariantViolation(
                "daily activity is not strictly sorted by date".to_string(),
            ));
        }
        Ok(())
    }
}

fn merge_daily(left: &[DailyActivity], right: &[DailyActivity]) -> Vec<DailyActivity> {
    let mut by_date: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
    for day in left.iter().chain(right) {
        let current = by_date
            .remove(&day.date)
            .unwrap_or_else(|| DailyActivity::empty(day.date));
        by_date.insert(day.date, current.combined(day));
    }
    by_date.into_values().collect()
}

fn merge_projects(left: &[ProjectSessions], right: &[ProjectSessions]) -> Vec<ProjectSessions> {
    let mut merged = left.to_vec();
    for project in right {
        match merged.iter_mut().find(|p| p.label == project.label) {
            Some(existing) => existing.sessions += project.sessions,
            None => merged.push(project.clone()),
        }
    }
    merged
}

/// Stats for every source plus their cross-source totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedStats {
    pub window: AggregationWindow,
    pub days_covered: i64,
    pub per_source: BTreeMap<Source, AgentStats>,
    pub totals: AgentStats,
    /// Sources with at least one session, in canonical order
    pub active_sources: Vec<Source>,
    pub favorite_model: Option<ModelName>,
    pub peak_hour: u8,
}

impl CombinedStats {
    /// Combine per-source stats; totals merge in canonical source order
    pub fn from_sources(window: AggregationWindow, per_source: BTreeMap<Source, AgentStats>) -> Self {
        let totals = per_source
            .values()
            .fold(AgentStats::default(), |acc, stats| acc.merge(stats));
        let active_sources = per_source
            .iter()
            .filter(|(_, stats)| stats.total_sessions > 0)
            .map(|(source, _)| *source)
            .collect();
        let favorite_model = favorite_model(&totals.token_totals);
        let peak_hour = peak_hour(&totals.hourly_histogram);

        Self {
            window,
            days_covered: window.days(),
            per_source,
            totals,
            active_sources,
            favorite_model,
            peak_hour,
        }
    }

    /// Run [`AgentStats::check_invariants`] on every source and the totals
    pub fn check_invariants(&self) -> Result<()> {
        for stats in self.per_source.values() {
            stats.check_invariants()?;
        }
        self.totals.check_invariants()?;

        let summed: u64 = self.per_source.values().map(|s| s.total_sessions).sum();
        if summed != self.totals.total_sessions {
            return Err(VibeclockError::InvariantViolation(format!(
                "per-source sessions sum to {summed}, totals say {}",
                self.totals.total_sessions
            )));
        }
        Ok(())
    }
}

/// Model with the most tokens; ties go to the smallest name
pub fn favorite_model(token_totals: &BTreeMap<ModelName, TokenCounts>) -> Option<ModelName> {
    let mut best: Option<(&ModelName, u64)> = None;
    for (model, tokens) in token_totals {
        let total = tokens.total();
        if best.is_none_or(|(_, best_total)| total > best_total) {
            best = Some((model, total));
        }
    }
    best.map(|(model, _)| model.clone())
}

/// Hour with the most sessions; ties go to the earliest hour
pub fn peak_hour(hourly: &[u64; 24]) -> u8 {
    let mut peak = 0;
    for (hour, count) in hourly.iter().enumerate() {
        if *count > hourly[peak] {
            peak = hour;
        }
    }
    peak as u8
}
