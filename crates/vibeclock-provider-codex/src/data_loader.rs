//! Codex CLI session reader
//!
//! Codex writes one rollout file per session at
//! `<root>/sessions/YYYY/MM/DD/rollout-*.jsonl`. Every line is an envelope
//! `{timestamp, type, payload}` whose payload shape depends on `type`:
//!
//! - `session_meta`: session id, working directory, sometimes the model
//! - `turn_context`: the model used for the following turn
//! - `event_msg`: user messages and `token_count` usage snapshots
//! - `response_item`: model output items
//!
//! The root defaults to `~/.codex` and can be overridden with `CODEX_HOME`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::trace;
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_core::provider::{CollectReport, SessionReader, file_name_str, find_files};
use vibeclock_core::timestamp::RawTimestamp;
use vibeclock_core::types::{
    ModelName, ModelUsage, Session, Source, TokenCounts, checked_add_model_tokens,
};

/// Environment variable overriding the Codex data root
pub const ROOT_ENV: &str = "CODEX_HOME";

/// Reader for Codex rollout files
pub struct DataLoader {
    root: PathBuf,
}

impl DataLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$CODEX_HOME`, else `~/.codex`
    pub fn default_root() -> PathBuf {
        if let Ok(dir) = std::env::var(ROOT_ENV)
            && !dir.trim().is_empty()
        {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".codex")
    }
}

#[async_trait]
impl SessionReader for DataLoader {
    fn source(&self) -> Source {
        Source::Codex
    }

    fn root_dir(&self) -> &Path {
        &self.root
    }

    async fn find_session_files(&self) -> Result<Vec<PathBuf>> {
        let sessions = self.root.join("sessions");
        if !sessions.is_dir() {
            return Ok(Vec::new());
        }
        find_files(&sessions, |path| {
            let name = file_name_str(path);
            name.starts_with("rollout-") && name.ends_with(".jsonl")
        })
        .await
    }

    async fn parse_file(&self, path: &Path, _report: &mut CollectReport) -> Result<Vec<Session>> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut state = RolloutState::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let envelope: Envelope = decode(path, index, serde_json::from_str(line))?;
            state.apply(path, index, envelope)?;
        }

        state.into_session(path).map(|session| vec![session])
    }
}

// ---------------------------------------------------------------------------
// Rollout schema
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Envelope {
    timestamp: Option<RawTimestamp>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct SessionMetaPayload {
    id: Option<String>,
    cwd: Option<String>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct TurnContextPayload {
    model: Option<String>,
}

#[derive(Deserialize)]
struct EventPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    info: Option<TokenInfo>,
}

#[derive(Deserialize)]
struct TokenInfo {
    total_token_usage: Option<UsageSnapshot>,
    last_token_usage: Option<UsageSnapshot>,
}

#[derive(Deserialize)]
struct ResponseItemPayload {
    role: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
struct UsageSnapshot {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    cached_input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    reasoning_output_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl UsageSnapshot {
    fn saturating_sub(&self, earlier: &Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_sub(earlier.input_tokens),
            cached_input_tokens: self.cached_input_tokens.saturating_sub(earlier.cached_input_tokens),
            output_tokens: self.output_tokens.saturating_sub(earlier.output_tokens),
            reasoning_output_tokens: self
                .reasoning_output_tokens
                .saturating_sub(earlier.reasoning_output_tokens),
            total_tokens: self.total_tokens.saturating_sub(earlier.total_tokens),
        }
    }
}

impl From<UsageSnapshot> for TokenCounts {
    fn from(usage: UsageSnapshot) -> Self {
        TokenCounts::new(usage.input_tokens, usage.output_tokens, usage.cached_input_tokens, 0)
    }
}

fn decode<T>(path: &Path, index: usize, result: serde_json::Result<T>) -> Result<T> {
    result.map_err(|e| VibeclockError::Parse {
        file: path.to_path_buf(),
        error: format!("line {}: {}", index + 1, e),
    })
}

fn decode_payload<T: DeserializeOwned>(path: &Path, index: usize, payload: serde_json::Value) -> Result<T> {
    decode(path, index, serde_json::from_value(payload))
}

// ---------------------------------------------------------------------------
// Accumulation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RolloutState {
    session_id: Option<String>,
    project: Option<String>,
    meta_model: Option<String>,
    turn_model: Option<String>,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    messages: u64,
    usage: Vec<(Option<String>, TokenCounts)>,
    previous_total: Option<UsageSnapshot>,
}

impl RolloutState {
    fn apply(&mut self, path: &Path, index: usize, envelope: Envelope) -> Result<()> {
        if let Some(raw) = &envelope.timestamp {
            let ts = raw.to_utc()?;
            self.first = Some(self.first.map_or(ts, |first| first.min(ts)));
            self.last = Some(self.last.map_or(ts, |last| last.max(ts)));
        }

        match envelope.kind.as_deref() {
            Some("session_meta") => {
                let meta: SessionMetaPayload = decode_payload(path, index, envelope.payload)?;
                if self.session_id.is_none() {
                    self.session_id = meta.id;
                }
                if self.project.is_none() {
                    self.project = meta.cwd;
                }
                if self.meta_model.is_none() {
                    self.meta_model = meta.model;
                }
            }
            Some("turn_context") => {
                let context: TurnContextPayload = decode_payload(path, index, envelope.payload)?;
                if context.model.is_some() {
                    self.turn_model = context.model;
                }
            }
            Some("event_msg") => {
                let event: EventPayload = decode_payload(path, index, envelope.payload)?;
                match event.kind.as_deref() {
                    Some("user_message") => self.messages += 1,
                    Some("token_count") => {
                        if let Some(info) = event.info {
                            self.record_token_count(info);
                        }
                    }
                    _ => {}
                }
            }
            Some("response_item") => {
                let item: ResponseItemPayload = decode_payload(path, index, envelope.payload)?;
                if item.role.as_deref() == Some("assistant") {
                    self.messages += 1;
                }
            }
            other => trace!("Ignoring Codex record kind {:?}", other),
        }
        Ok(())
    }

    fn record_token_count(&mut self, info: TokenInfo) {
        let previous = self.previous_total;
        if let Some(total) = info.total_token_usage {
            if previous == Some(total) {
                trace!("Skipping repeated token_count event");
                return;
            }
            self.previous_total = Some(total);
        }

        let delta = match (info.last_token_usage, info.total_token_usage) {
            (Some(last), _) => last,
            (None, Some(total)) => total.saturating_sub(&previous.unwrap_or_default()),
            (None, None) => return,
        };

        let model = self.turn_model.clone().or_else(|| self.meta_model.clone());
        self.usage.push((model, delta.into()));
    }

    fn into_session(self, path: &Path) -> Result<Session> {
        let session_id = self.session_id.ok_or_else(|| VibeclockError::MissingField {
            file: path.to_path_buf(),
            field: "session_meta.id",
        })?;
        let started_at = self.first.ok_or_else(|| VibeclockError::MissingField {
            file: path.to_path_buf(),
            field: "timestamp",
        })?;

        let mut model_usage = ModelUsage::new();
        for (model, tokens) in self.usage {
            let model = model
                .filter(|m| !m.trim().is_empty())
                .map_or_else(ModelName::unknown, ModelName::new);
            checked_add_model_tokens(&mut model_usage, model.clone(), tokens).ok_or_else(|| {
                VibeclockError::TokenOverflow {
                    session: session_id.clone(),
                    model: model.to_string(),
                }
            })?;
        }

        let mut builder = Session::builder(Source::Codex, session_id, started_at)
            .message_count(self.messages)
            .project_label(self.project.unwrap_or_else(|| "unknown".to_string()))
            .model_usage(model_usage);
        if let Some(end) = self.last {
            builder = builder.ended_at(end);
        }
        Ok(builder.build())
    }
}
