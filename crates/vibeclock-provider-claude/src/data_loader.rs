//! Claude Code session reader
//!
//! Claude Code writes one JSONL transcript per conversation under
//! `<root>/projects/<project-slug>/`. Each line is a record; only assistant
//! records carry token usage, and streamed responses are logged several times
//! with the same message and request ids. One session can span several
//! transcripts, so sessions and repeated messages are tracked across files.
//!
//! The root defaults to `~/.claude` and can be overridden with the
//! `CLAUDE_CONFIG_DIR` environment variable.
//!
//! # Examples
//!
//! ```no_run
//! use vibeclock_provider_claude::DataLoader;
//! use vibeclock_core::provider::SessionReader;
//! use chrono::{Duration, Utc};
//!
//! # async fn example() {
//! let reader = DataLoader::new(DataLoader::default_root());
//! let collection = reader.collect(Utc::now() - Duration::days(30)).await;
//! println!("{} sessions", collection.sessions.len());
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::trace;
use vibeclock_core::accumulator::SessionAccumulator;
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_core::provider::{CollectReport, Collection, SessionReader, discover_files, find_files};
use vibeclock_core::timestamp::RawTimestamp;
use vibeclock_core::types::{Session, Source, TokenCounts};

/// Environment variable overriding the Claude Code data root
pub const ROOT_ENV: &str = "CLAUDE_CONFIG_DIR";

const SYNTHETIC_MODEL: &str = "<synthetic>";

/// Reader for Claude Code transcripts
pub struct DataLoader {
    root: PathBuf,
}

impl DataLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$CLAUDE_CONFIG_DIR`, else `~/.claude`
    pub fn default_root() -> PathBuf {
        if let Ok(dir) = std::env::var(ROOT_ENV)
            && !dir.trim().is_empty()
        {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
    }

    fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// First directory component under `projects/`
    fn project_label(&self, path: &Path) -> String {
        path.strip_prefix(self.projects_dir())
            .ok()
            .and_then(|relative| {
                let mut components = relative.components();
                let first = components.next()?;
                // a transcript directly under projects/ has no project dir
                components.next()?;
                match first {
                    Component::Normal(name) => name.to_str().map(str::to_string),
                    _ => None,
                }
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Decode every countable record in one transcript
    ///
    /// Any bad line fails the whole file.
    async fn parse_records(&self, path: &Path) -> Result<Vec<UsageRecord>> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut records = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: TranscriptRecord =
                serde_json::from_str(line).map_err(|e| VibeclockError::Parse {
                    file: path.to_path_buf(),
                    error: format!("line {}: {}", index + 1, e),
                })?;

            let Some(usage) = record.assistant_usage(path, index)? else {
                continue;
            };

            let session_id = record.session_id.ok_or_else(|| VibeclockError::MissingField {
                file: path.to_path_buf(),
                field: "sessionId",
            })?;
            let timestamp = record
                .timestamp
                .ok_or_else(|| VibeclockError::MissingField {
                    file: path.to_path_buf(),
                    field: "timestamp",
                })?
                .to_utc()?;

            records.push(UsageRecord {
                session_id,
                timestamp,
                message_key: usage.message_id.zip(record.request_id),
                model: usage.model,
                tokens: usage.tokens,
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl SessionReader for DataLoader {
    fn source(&self) -> Source {
        Source::ClaudeCode
    }

    fn root_dir(&self) -> &Path {
        &self.root
    }

    async fn find_session_files(&self) -> Result<Vec<PathBuf>> {
        let projects = self.projects_dir();
        if !projects.is_dir() {
            return Ok(Vec::new());
        }
        find_files(&projects, |path| {
            path.extension().and_then(|s| s.to_str()) == Some("jsonl")
        })
        .await
    }

    async fn parse_file(&self, path: &Path, _report: &mut CollectReport) -> Result<Vec<Session>> {
        let records = self.parse_records(path).await?;
        let mut sessions = TranscriptSessions::default();
        sessions.absorb(&self.project_label(path), records)?;
        Ok(sessions.into_sessions())
    }

    /// Sessions are merged by id across every transcript, since sidechain
    /// files such as `agent-*.jsonl` carry their parent's `sessionId`
    async fn collect(&self, since: DateTime<Utc>) -> Collection {
        let mut collection = Collection::empty(Source::ClaudeCode);
        let Some(files) = discover_files(self, &mut collection).await else {
            return collection;
        };

        let mut sessions = TranscriptSessions::default();
        for path in files {
            collection.report.files_scanned += 1;
            let absorbed = self
                .parse_records(&path)
                .await
                .and_then(|records| sessions.absorb(&self.project_label(&path), records));
            if let Err(e) = absorbed {
                collection.skip_file(path, &e);
            }
        }

        let mut seen_ids = HashSet::new();
        for session in sessions.into_sessions() {
            collection.admit(session, since, &mut seen_ids);
        }
        collection.finish()
    }
}

// ---------------------------------------------------------------------------
// Cross-file accumulation
// ---------------------------------------------------------------------------

/// One countable assistant record
struct UsageRecord {
    session_id: String,
    timestamp: DateTime<Utc>,
    /// `(message.id, requestId)`; streamed responses repeat it
    message_key: Option<(String, String)>,
    model: Option<String>,
    tokens: TokenCounts,
}

/// Sessions keyed by id, built up file by file
#[derive(Default)]
struct TranscriptSessions {
    sessions: Vec<SessionAccumulator>,
    by_id: HashMap<String, usize>,
    seen_messages: HashSet<(String, String)>,
}

impl TranscriptSessions {
    /// Fold one file's records in, all or nothing
    fn absorb(&mut self, label: &str, records: Vec<UsageRecord>) -> Result<()> {
        let mut staged: Vec<SessionAccumulator> = Vec::new();
        let mut staged_ids: HashMap<String, usize> = HashMap::new();
        let mut new_messages: HashSet<(String, String)> = HashSet::new();

        for record in records {
            if let Some(key) = record.message_key
                && (self.seen_messages.contains(&key) || !new_messages.insert(key))
            {
                trace!("Skipping repeated message in session {}", record.session_id);
                continue;
            }

            let slot = match staged_ids.get(&record.session_id) {
                Some(&slot) => slot,
                None => {
                    let mut acc = match self.by_id.get(&record.session_id) {
                        Some(&index) => self.sessions[index].clone(),
                        None => SessionAccumulator::new(Source::ClaudeCode, record.session_id.clone()),
                    };
                    acc.set_project_label(label);
                    staged.push(acc);
                    staged_ids.insert(record.session_id.clone(), staged.len() - 1);
                    staged.len() - 1
                }
            };

            let acc = &mut staged[slot];
            acc.observe(record.timestamp);
            acc.add_message();
            acc.add_tokens(record.model.as_deref(), record.tokens)?;
        }

        self.seen_messages.extend(new_messages);
        for acc in staged {
            match self.by_id.get(acc.session_id()) {
                Some(&index) => self.sessions[index] = acc,
                None => {
                    self.by_id.insert(acc.session_id().to_string(), self.sessions.len());
                    self.sessions.push(acc);
                }
            }
        }
        Ok(())
    }

    /// Sessions in first-seen order
    fn into_sessions(self) -> Vec<Session> {
        self.sessions
            .into_iter()
            .filter_map(SessionAccumulator::into_session)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Transcript schema
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptRecord {
    session_id: Option<String>,
    timestamp: Option<RawTimestamp>,
    #[serde(rename = "type")]
    record_type: Option<String>,
    // user records put strings or arrays here, so decode lazily
    message: Option<serde_json::Value>,
    request_id: Option<String>,
    #[serde(default)]
    is_api_error_message: bool,
}

#[derive(Deserialize)]
struct AssistantMessage {
    id: Option<String>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

impl From<Usage> for TokenCounts {
    fn from(usage: Usage) -> Self {
        TokenCounts::new(
            usage.input_tokens.unwrap_or_default(),
            usage.output_tokens.unwrap_or_default(),
            usage.cache_read_input_tokens.unwrap_or_default(),
            usage.cache_creation_input_tokens.unwrap_or_default(),
        )
    }
}

/// Usage carried by one countable assistant record
struct AssistantUsage {
    message_id: Option<String>,
    model: Option<String>,
    tokens: TokenCounts,
}

impl TranscriptRecord {
    /// `Some` only for assistant records that carry usage and should count
    fn assistant_usage(&self, path: &Path, index: usize) -> Result<Option<AssistantUsage>> {
        if self.record_type.as_deref() != Some("assistant") || self.is_api_error_message {
            return Ok(None);
        }
        let Some(message) = &self.message else {
            return Ok(None);
        };

        let message: AssistantMessage =
            serde_json::from_value(message.clone()).map_err(|e| VibeclockError::Parse {
                file: path.to_path_buf(),
                error: format!("line {}: {}", index + 1, e),
            })?;

        if message.model.as_deref() == Some(SYNTHETIC_MODEL) {
            return Ok(None);
        }
        let Some(usage) = message.usage else {
            return Ok(None);
        };

        Ok(Some(AssistantUsage {
            message_id: message.id,
            model: message.model,
            tokens: usage.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;
    use vibeclock_core::test_utils::{ENV_MUTEX, EnvVarGuard};
    use vibeclock_core::types::ModelName;

    fn assistant(session: &str, ts: &str, msg_id: &str, req_id: &str, input: u64, output: u64) -> String {
        json!({
            "type": "assistant",
            "sessionId": session,
            "timestamp": ts,
            "requestId": req_id,
            "cwd": "/home/someone/project",
            "message": {
                "id": msg_id,
                "model": "claude-3-opus",
                "role": "assistant",
                "usage": {
                    "input_tokens": input,
                    "output_tokens": output,
                    "cache_creation_input_tokens": 7,
                    "cache_read_input_tokens": 3
                }
            }
        })
        .to_string()
    }

    fn write_transcript(root: &Path, project: &str, name: &str, lines: &[String]) -> PathBuf {
        let dir = root.join("projects").join(project);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_parse_transcript() {
        let temp = TempDir::new().unwrap();
        let user = json!({
            "type": "user",
            "sessionId": "s1",
            "timestamp": "2024-01-01T09:59:00Z",
            "message": {"role": "user", "content": "hello"}
        })
        .to_string();
        write_transcript(
            temp.path(),
            "-work-alpha",
            "s1.jsonl",
            &[
                user,
                assistant("s1", "2024-01-01T10:00:00Z", "m1", "r1", 100, 50),
                assistant("s1", "2024-01-01T10:00:00Z", "m1", "r1", 100, 50),
                assistant("s1", "2024-01-01T10:20:00Z", "m2", "r2", 40, 20),
            ],
        );

        let reader = DataLoader::new(temp.path());
        let collection = reader.collect(epoch()).await;
        assert!(collection.report.is_clean());
        assert_eq!(collection.sessions.len(), 1);

        let session = &collection.sessions[0];
        assert_eq!(session.project_label(), "-work-alpha");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.started_at(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(session.duration().num_minutes(), 20);
        assert_eq!(
            session.model_usage()[&ModelName::new("claude-3-opus")],
            TokenCounts::new(140, 70, 6, 14)
        );
    }

    #[tokio::test]
    async fn test_skips_api_errors_and_synthetic() {
        let temp = TempDir::new().unwrap();
        let api_error = json!({
            "type": "assistant",
            "sessionId": "s1",
            "timestamp": "2024-01-01T11:00:00Z",
            "isApiErrorMessage": true,
            "message": {"id": "e", "model": "claude-3-opus", "usage": {"input_tokens": 999}}
        })
        .to_string();
        let synthetic = json!({
            "type": "assistant",
            "sessionId": "s1",
            "timestamp": "2024-01-01T12:00:00Z",
            "message": {"id": "x", "model": "<synthetic>", "usage": {"input_tokens": 999}}
        })
        .to_string();
        write_transcript(
            temp.path(),
            "p",
            "s1.jsonl",
            &[
                assistant("s1", "2024-01-01T10:00:00Z", "m1", "r1", 1, 1),
                api_error,
                synthetic,
            ],
        );

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        let session = &collection.sessions[0];
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.total_tokens().input_tokens, 1);
        assert_eq!(session.ended_at(), session.started_at());
    }

    #[tokio::test]
    async fn test_multiple_sessions_in_first_seen_order() {
        let temp = TempDir::new().unwrap();
        write_transcript(
            temp.path(),
            "p",
            "mixed.jsonl",
            &[
                assistant("later", "2024-01-02T10:00:00Z", "m1", "r1", 1, 1),
                assistant("earlier", "2024-01-01T10:00:00Z", "m2", "r2", 1, 1),
            ],
        );

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        let ids: Vec<_> = collection.sessions.iter().map(|s| s.session_id().as_str()).collect();
        assert_eq!(ids, vec!["later", "earlier"]);
    }

    #[tokio::test]
    async fn test_malformed_files_are_isolated() {
        let temp = TempDir::new().unwrap();
        write_transcript(
            temp.path(),
            "p",
            "a.jsonl",
            &[assistant("good", "2024-01-01T10:00:00Z", "m1", "r1", 1, 1)],
        );
        write_transcript(
            temp.path(),
            "p",
            "b.jsonl",
            &[
                assistant("broken", "2024-01-01T10:00:00Z", "m1", "r1", 1, 1),
                "{\"type\": \"assistant\", \"sessionId\"".to_string(),
            ],
        );
        let no_session = json!({
            "type": "assistant",
            "timestamp": "2024-01-01T10:00:00Z",
            "message": {"id": "m", "model": "claude-3-opus", "usage": {"input_tokens": 1}}
        })
        .to_string();
        write_transcript(temp.path(), "p", "c.jsonl", &[no_session]);
        let bad_time = assistant("bad-time", "not a time", "m1", "r1", 1, 1);
        write_transcript(temp.path(), "p", "d.jsonl", &[bad_time]);

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.sessions[0].session_id().as_str(), "good");
        assert_eq!(collection.report.files_scanned, 4);
        assert_eq!(collection.report.skipped.len(), 3);
        assert!(collection.report.skipped[1].reason.contains("sessionId"));
    }

    #[tokio::test]
    async fn test_session_spanning_files_is_merged() {
        let temp = TempDir::new().unwrap();
        write_transcript(
            temp.path(),
            "-work-alpha",
            "main.jsonl",
            &[assistant("s1", "2024-01-01T10:00:00Z", "m1", "r1", 100, 10)],
        );
        write_transcript(
            temp.path(),
            "-work-alpha",
            "agent-x.jsonl",
            &[assistant("s1", "2024-01-01T10:30:00Z", "m2", "r2", 900, 90)],
        );

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert!(collection.report.is_clean());
        assert_eq!(collection.report.files_scanned, 2);
        assert_eq!(collection.report.duplicate_sessions, 0);
        assert_eq!(collection.sessions.len(), 1);

        let session = &collection.sessions[0];
        assert_eq!(session.session_id().as_str(), "s1");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.total_tokens().input_tokens, 1000);
        assert_eq!(session.total_tokens().output_tokens, 100);
        assert_eq!(session.started_at(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(session.duration().num_minutes(), 30);
    }

    #[tokio::test]
    async fn test_repeated_messages_are_dropped_across_files() {
        let temp = TempDir::new().unwrap();
        write_transcript(
            temp.path(),
            "p",
            "a.jsonl",
            &[assistant("s1", "2024-01-01T10:00:00Z", "m1", "r1", 100, 10)],
        );
        // a resumed transcript replays the earlier message
        write_transcript(
            temp.path(),
            "p",
            "b.jsonl",
            &[
                assistant("s1", "2024-01-01T10:00:00Z", "m1", "r1", 100, 10),
                assistant("s1", "2024-01-01T10:05:00Z", "m2", "r2", 5, 5),
            ],
        );

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        let session = &collection.sessions[0];
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.total_tokens().input_tokens, 105);
    }

    #[tokio::test]
    async fn test_token_overflow_skips_only_that_file() {
        let temp = TempDir::new().unwrap();
        let huge = u64::MAX / 2 + 10;
        write_transcript(
            temp.path(),
            "p",
            "a_good.jsonl",
            &[assistant("good", "2024-01-01T10:00:00Z", "m1", "r1", 100, 10)],
        );
        write_transcript(
            temp.path(),
            "p",
            "b_bad.jsonl",
            &[
                assistant("good", "2024-01-01T11:00:00Z", "m2", "r2", 7, 7),
                assistant("bad", "2024-01-01T12:00:00Z", "m3", "r3", huge, 0),
                assistant("bad", "2024-01-01T12:01:00Z", "m4", "r4", huge, 0),
            ],
        );

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.report.skipped.len(), 1);
        assert!(collection.report.skipped[0].path.ends_with("b_bad.jsonl"));
        assert!(collection.report.skipped[0].reason.contains("overflow"));

        // nothing from the rejected file leaks into the surviving session
        let good = &collection.sessions[0];
        assert_eq!(good.message_count(), 1);
        assert_eq!(good.total_tokens().input_tokens, 100);
        assert_eq!(good.duration().num_minutes(), 0);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let reader = DataLoader::new(temp.path().join("nope"));
        let collection = reader.collect(epoch()).await;
        assert!(collection.sessions.is_empty());
        assert_eq!(collection.report.files_scanned, 0);
    }

    #[tokio::test]
    async fn test_default_root_env_override() {
        let _lock = ENV_MUTEX.lock().await;
        let mut guard = EnvVarGuard::new();
        guard.set(ROOT_ENV, "/tmp/claude-alt");
        assert_eq!(DataLoader::default_root(), PathBuf::from("/tmp/claude-alt"));

        guard.set(ROOT_ENV, "");
        assert!(DataLoader::default_root().ends_with(".claude"));
    }
}
