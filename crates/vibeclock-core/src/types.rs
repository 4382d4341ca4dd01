//! Core domain types for vibeclock
//!
//! This module contains the normalized session model every reader produces and
//! the small strongly-typed wrappers it is built from.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::error::VibeclockError;

/// A supported AI coding agent
///
/// The declaration order is the canonical source order used for iteration,
/// map keys and cross-source first-seen ordering.
///
/// # Examples
/// ```
/// use vibeclock_core::types::Source;
///
/// let source: Source = "codex".parse().unwrap();
/// assert_eq!(source, Source::Codex);
/// assert_eq!(Source::ClaudeCode.to_string(), "claude_code");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    ClaudeCode,
    Codex,
    #[serde(rename = "opencode")]
    OpenCode,
}

impl Source {
    /// Every supported source in canonical order
    pub const ALL: [Source; 3] = [Source::ClaudeCode, Source::Codex, Source::OpenCode];

    /// Stable identifier used in config files and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::ClaudeCode => "claude_code",
            Source::Codex => "codex",
            Source::OpenCode => "opencode",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::ClaudeCode => "Claude Code",
            Source::Codex => "Codex",
            Source::OpenCode => "OpenCode",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = VibeclockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "claude_code" | "claude" => Ok(Source::ClaudeCode),
            "codex" => Ok(Source::Codex),
            "opencode" | "open_code" => Ok(Source::OpenCode),
            _ => Err(VibeclockError::UnknownSource(s.to_string())),
        }
    }
}

/// Strongly-typed model name wrapper
///
/// Model identifiers are kept verbatim; unknown or new models simply become
/// new keys.
///
/// # Examples
/// ```
/// use vibeclock_core::types::ModelName;
///
/// let model = ModelName::new("claude-3-opus");
/// assert_eq!(model.as_str(), "claude-3-opus");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelName(String);

impl ModelName {
    /// Placeholder for entries that carry no model identifier
    pub const UNKNOWN: &'static str = "unknown";

    /// Create a new ModelName from any string-like type
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The placeholder model
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly-typed session ID wrapper
///
/// Opaque and only unique within one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Token counts for usage tracking
///
/// # Examples
/// ```
/// use vibeclock_core::types::TokenCounts;
///
/// let tokens = TokenCounts::new(100, 50, 10, 5);
/// assert_eq!(tokens.total(), 165);
///
/// let combined = tokens + TokenCounts::new(50, 25, 5, 2);
/// assert_eq!(combined.input_tokens, 150);
/// ```
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenCounts {
    /// Input tokens used
    pub input_tokens: u64,
    /// Output tokens generated
    pub output_tokens: u64,
    /// Tokens served from the prompt cache
    pub cache_read_tokens: u64,
    /// Tokens written to the prompt cache
    pub cache_write_tokens: u64,
}

impl TokenCounts {
    /// Create new TokenCounts
    pub fn new(
        input_tokens: u64,
        output_tokens: u64,
        cache_read_tokens: u64,
        cache_write_tokens: u64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_read_tokens,
            cache_write_tokens,
        }
    }

    /// Calculate total tokens, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_read_tokens)
            .saturating_add(self.cache_write_tokens)
    }

    /// Counter-wise addition, `None` when any counter would overflow
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        Some(Self {
            input_tokens: self.input_tokens.checked_add(other.input_tokens)?,
            output_tokens: self.output_tokens.checked_add(other.output_tokens)?,
            cache_read_tokens: self.cache_read_tokens.checked_add(other.cache_read_tokens)?,
            cache_write_tokens: self.cache_write_tokens.checked_add(other.cache_write_tokens)?,
        })
    }

    /// True when every counter is zero
    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

impl Add for TokenCounts {
    type Output = Self;

    /// Saturating; readers use [`TokenCounts::checked_add`] to reject overflow
    fn add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            cache_read_tokens: self.cache_read_tokens.saturating_add(other.cache_read_tokens),
            cache_write_tokens: self.cache_write_tokens.saturating_add(other.cache_write_tokens),
        }
    }
}

impl AddAssign for TokenCounts {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Per-model token counts
pub type ModelUsage = BTreeMap<ModelName, TokenCounts>;

/// Add `tokens` under `model`, `None` on overflow with `usage` untouched
pub fn checked_add_model_tokens(
    usage: &mut ModelUsage,
    model: ModelName,
    tokens: TokenCounts,
) -> Option<()> {
    let sum = usage.get(&model).copied().unwrap_or_default().checked_add(&tokens)?;
    usage.insert(model, sum);
    Some(())
}

/// Elementwise sum of two model usage maps into a fresh map
pub fn merge_model_usage(left: &ModelUsage, right: &ModelUsage) -> ModelUsage {
    let mut merged = left.clone();
    for (model, tokens) in right {
        *merged.entry(model.clone()).or_default() += *tokens;
    }
    merged
}

/// One interactive usage episode from one agent
///
/// Sessions are immutable once built. `project_label` is a raw local
/// identifier and therefore sensitive; the type deliberately does not
/// implement `Serialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    source: Source,
    session_id: SessionId,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    project_label: String,
    message_count: u64,
    model_usage: ModelUsage,
}

impl Session {
    /// Start building a session
    pub fn builder(
        source: Source,
        session_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> SessionBuilder {
        SessionBuilder {
            source,
            session_id: SessionId::new(session_id),
            started_at,
            ended_at: None,
            project_label: None,
            message_count: 0,
            model_usage: ModelUsage::new(),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Raw project identifier (path or directory name)
    pub fn project_label(&self) -> &str {
        &self.project_label
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn model_usage(&self) -> &ModelUsage {
        &self.model_usage
    }

    /// Wall-clock duration, never negative
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at).max(Duration::zero())
    }

    /// Token counts summed across every model
    pub fn total_tokens(&self) -> TokenCounts {
        self.model_usage
            .values()
            .fold(TokenCounts::default(), |acc, tokens| acc + *tokens)
    }
}

/// Builder for [`Session`]
///
/// # Examples
/// ```
/// use vibeclock_core::types::{Session, Source, TokenCounts};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
/// let session = Session::builder(Source::ClaudeCode, "abc", start)
///     .ended_at(start - Duration::minutes(5))
///     .message_count(3)
///     .tokens("claude-3-opus", TokenCounts::new(10, 5, 0, 0))
///     .build();
///
/// // An end before the start is clamped
/// assert_eq!(session.ended_at(), start);
/// assert_eq!(session.total_tokens().total(), 15);
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    source: Source,
    session_id: SessionId,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    project_label: Option<String>,
    message_count: u64,
    model_usage: ModelUsage,
}

impl SessionBuilder {
    pub fn ended_at(mut self, ended_at: DateTime<Utc>) -> Self {
        self.ended_at = Some(ended_at);
        self
    }

    pub fn project_label(mut self, label: impl Into<String>) -> Self {
        self.project_label = Some(label.into());
        self
    }

    pub fn message_count(mut self, count: u64) -> Self {
        self.message_count = count;
        self
    }

    /// Add token counts for a model, summing with anything already recorded
    pub fn tokens(mut self, model: impl Into<String>, tokens: TokenCounts) -> Self {
        *self.model_usage.entry(ModelName::new(model)).or_default() += tokens;
        self
    }

    pub fn model_usage(mut self, usage: ModelUsage) -> Self {
        self.model_usage = usage;
        self
    }

    pub fn build(self) -> Session {
        let ended_at = self
            .ended_at
            .map_or(self.started_at, |end| end.max(self.started_at));
        Session {
            source: self.source,
            session_id: self.session_id,
            started_at: self.started_at,
            ended_at,
            project_label: self.project_label.unwrap_or_else(|| "unknown".to_string()),
            message_count: self.message_count,
            model_usage: self.model_usage,
        }
    }
}
