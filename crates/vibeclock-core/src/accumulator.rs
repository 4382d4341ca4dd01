//! Incremental session building for readers
//!
//! Readers see a session as a stream of records. `SessionAccumulator` tracks
//! the time span, message count and per-model tokens as records arrive and
//! produces an immutable [`Session`] at the end.

use chrono::{DateTime, Utc};

use crate::error::{Result, VibeclockError};
use crate::types::{ModelName, ModelUsage, Session, Source, TokenCounts, checked_add_model_tokens};

/// Accumulator for one in-progress session
#[derive(Debug, Clone)]
pub struct SessionAccumulator {
    source: Source,
    session_id: String,
    project_label: Option<String>,
    first_timestamp: Option<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
    message_count: u64,
    model_usage: ModelUsage,
}

impl SessionAccumulator {
    pub fn new(source: Source, session_id: impl Into<String>) -> Self {
        Self {
            source,
            session_id: session_id.into(),
            project_label: None,
            first_timestamp: None,
            last_timestamp: None,
            message_count: 0,
            model_usage: ModelUsage::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Set the project label, keeping the first non-empty one seen
    pub fn set_project_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if self.project_label.is_none() && !label.is_empty() {
            self.project_label = Some(label);
        }
    }

    /// Widen the session span to include `ts`
    pub fn observe(&mut self, ts: DateTime<Utc>) {
        self.first_timestamp = Some(self.first_timestamp.map_or(ts, |first| first.min(ts)));
        self.last_timestamp = Some(self.last_timestamp.map_or(ts, |last| last.max(ts)));
    }

    pub fn add_message(&mut self) {
        self.message_count += 1;
    }

    /// Add tokens under a model; an empty model name becomes `"unknown"`
    ///
    /// Fails without changing anything when a counter would overflow.
    pub fn add_tokens(&mut self, model: Option<&str>, tokens: TokenCounts) -> Result<()> {
        let model = match model {
            Some(name) if !name.trim().is_empty() => ModelName::new(name),
            _ => ModelName::unknown(),
        };
        checked_add_model_tokens(&mut self.model_usage, model.clone(), tokens).ok_or_else(|| {
            VibeclockError::TokenOverflow {
                session: self.session_id.clone(),
                model: model.to_string(),
            }
        })
    }

    pub fn has_timestamps(&self) -> bool {
        self.first_timestamp.is_some()
    }

    /// Finish the session; `None` when no timestamp was ever observed
    pub fn into_session(self) -> Option<Session> {
        let started_at = self.first_timestamp?;
        let mut builder = Session::builder(self.source, self.session_id, started_at)
            .message_count(self.message_count)
            .model_usage(self.model_usage);
        if let Some(end) = self.last_timestamp {
            builder = builder.ended_at(end);
        }
        if let Some(label) = self.project_label {
            builder = builder.project_label(label);
        }
        Some(builder.build())
    }
}
