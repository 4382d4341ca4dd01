//! OpenCode session reader
//!
//! OpenCode keeps session metadata and messages in separate trees:
//!
//! - `<root>/storage/session/<project id>/ses_*.json` holds one session each
//! - `<root>/storage/message/<session id>/msg_*.json` holds one message each
//!
//! Session files decide whether a session exists. Message files only enrich
//! it, so a broken message file is reported as a warning instead of sinking
//! the session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use vibeclock_core::accumulator::SessionAccumulator;
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_core::provider::{CollectReport, SessionReader, file_name_str, find_files};
use vibeclock_core::timestamp::RawTimestamp;
use vibeclock_core::types::{Session, Source, TokenCounts};

/// Environment variable overriding the OpenCode data root
pub const ROOT_ENV: &str = "OPENCODE_DATA_DIR";

/// Reader for OpenCode storage
pub struct DataLoader {
    root: PathBuf,
}

impl DataLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$OPENCODE_DATA_DIR`, else `$XDG_DATA_HOME/opencode`, else
    /// `~/.local/share/opencode`
    pub fn default_root() -> PathBuf {
        if let Ok(dir) = std::env::var(ROOT_ENV)
            && !dir.trim().is_empty()
        {
            return PathBuf::from(dir);
        }
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME")
            && !xdg.trim().is_empty()
        {
            return PathBuf::from(xdg).join("opencode");
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local/share/opencode")
    }

    fn storage_dir(&self) -> PathBuf {
        self.root.join("storage")
    }

    async fn read_messages(
        &self,
        session_id: &str,
        acc: &mut SessionAccumulator,
        report: &mut CollectReport,
    ) -> Result<()> {
        let dir = self.storage_dir().join("message").join(session_id);
        if !dir.is_dir() {
            debug!("No OpenCode messages for session {}", session_id);
            return Ok(());
        }

        let files = find_files(&dir, |path| {
            let name = file_name_str(path);
            name.starts_with("msg_") && name.ends_with(".json")
        })
        .await?;

        for path in files {
            match read_message(&path).await {
                Ok(message) => message.apply(acc)?,
                Err(e) => {
                    warn!("Skipping malformed OpenCode message {}: {}", path.display(), e);
                    report
                        .warnings
                        .push(format!("malformed message file {}: {}", path.display(), e));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionReader for DataLoader {
    fn source(&self) -> Source {
        Source::OpenCode
    }

    fn root_dir(&self) -> &Path {
        &self.root
    }

    async fn find_session_files(&self) -> Result<Vec<PathBuf>> {
        let sessions = self.storage_dir().join("session");
        if !sessions.is_dir() {
            return Ok(Vec::new());
        }
        find_files(&sessions, |path| {
            let name = file_name_str(path);
            name.starts_with("ses_") && name.ends_with(".json")
        })
        .await
    }

    async fn parse_file(&self, path: &Path, report: &mut CollectReport) -> Result<Vec<Session>> {
        let content = tokio::fs::read_to_string(path).await?;
        let info: SessionInfo = serde_json::from_str(&content).map_err(|e| VibeclockError::Parse {
            file: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let id = info.id.filter(|id| !id.is_empty()).ok_or_else(|| VibeclockError::MissingField {
            file: path.to_path_buf(),
            field: "id",
        })?;
        let times = info.time.unwrap_or_default();
        let created = times
            .created
            .ok_or_else(|| VibeclockError::MissingField {
                file: path.to_path_buf(),
                field: "time.created",
            })?
            .to_utc()?;

        let mut acc = SessionAccumulator::new(Source::OpenCode, id.clone());
        acc.set_project_label(info.directory.unwrap_or_default());
        acc.observe(created);
        if let Some(updated) = times.updated {
            acc.observe(updated.to_utc()?);
        }

        self.read_messages(&id, &mut acc, report).await?;

        Ok(acc.into_session().into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Storage schema
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SessionInfo {
    id: Option<String>,
    directory: Option<String>,
    time: Option<SessionTime>,
}

#[derive(Deserialize, Default)]
struct SessionTime {
    created: Option<RawTimestamp>,
    updated: Option<RawTimestamp>,
}

#[derive(Deserialize)]
struct Message {
    role: Option<String>,
    #[serde(rename = "modelID")]
    model_id: Option<String>,
    tokens: Option<MessageTokens>,
    time: Option<MessageTime>,
}

#[derive(Deserialize)]
struct MessageTime {
    completed: Option<RawTimestamp>,
}

#[derive(Deserialize)]
struct MessageTokens {
    #[serde(default)]
    input: u64,
    #[serde(default)]
    output: u64,
    #[serde(default)]
    cache: Option<CacheTokens>,
}

#[derive(Deserialize)]
struct CacheTokens {
    #[serde(default)]
    read: u64,
    #[serde(default)]
    write: u64,
}

/// A decoded assistant message, ready to fold into a session
struct AssistantMessage {
    model: Option<String>,
    tokens: TokenCounts,
    completed: Option<DateTime<Utc>>,
}

enum ParsedMessage {
    Assistant(AssistantMessage),
    Other,
}

impl ParsedMessage {
    /// Overflowing token counts fail the whole session
    fn apply(self, acc: &mut SessionAccumulator) -> Result<()> {
        if let ParsedMessage::Assistant(message) = self {
            acc.add_tokens(message.model.as_deref(), message.tokens)?;
            acc.add_message();
            if let Some(completed) = message.completed {
                acc.observe(completed);
            }
        }
        Ok(())
    }
}

async fn read_message(path: &Path) -> Result<ParsedMessage> {
    let content = tokio::fs::read_to_string(path).await?;
    let message: Message = serde_json::from_str(&content)?;
    if message.role.as_deref() != Some("assistant") {
        return Ok(ParsedMessage::Other);
    }

    let tokens = message
        .tokens
        .map(|t| {
            let (read, write) = t.cache.map_or((0, 0), |c| (c.read, c.write));
            TokenCounts::new(t.input, t.output, read, write)
        })
        .unwrap_or_default();
    let completed = match message.time.and_then(|t| t.completed) {
        Some(raw) => Some(raw.to_utc()?),
        None => None,
    };

    Ok(ParsedMessage::Assistant(AssistantMessage {
        model: message.model_id,
        tokens,
        completed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;
    use vibeclock_core::test_utils::{ENV_MUTEX, EnvVarGuard};
    use vibeclock_core::types::ModelName;

    const CREATED_MS: i64 = 1_704_103_200_000; // 2024-01-01T10:00:00Z

    fn write_session(root: &Path, id: &str, created: Option<i64>, updated: Option<i64>) {
        let dir = root.join("storage/session/proj_1");
        std::fs::create_dir_all(&dir).unwrap();
        let body = json!({
            "id": id,
            "directory": "/work/gamma",
            "title": "fix the thing",
            "time": {"created": created, "updated": updated}
        });
        std::fs::write(dir.join(format!("{id}.json")), body.to_string()).unwrap();
    }

    fn write_message(root: &Path, session: &str, name: &str, body: &str) {
        let dir = root.join("storage/message").join(session);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn assistant(model: &str, input: u64, output: u64, completed: i64) -> String {
        json!({
            "id": "msg",
            "role": "assistant",
            "modelID": model,
            "providerID": "anthropic",
            "tokens": {"input": input, "output": output, "reasoning": 0, "cache": {"read": 4, "write": 2}},
            "time": {"created": completed - 1000, "completed": completed}
        })
        .to_string()
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_parse_session_with_messages() {
        let temp = TempDir::new().unwrap();
        write_session(temp.path(), "ses_1", Some(CREATED_MS), Some(CREATED_MS + 60_000));
        write_message(temp.path(), "ses_1", "msg_a.json", &assistant("claude-sonnet-4", 10, 5, CREATED_MS + 30_000));
        write_message(temp.path(), "ses_1", "msg_b.json", &assistant("claude-sonnet-4", 20, 5, CREATED_MS + 300_000));
        write_message(
            temp.path(),
            "ses_1",
            "msg_c.json",
            &json!({"id": "u", "role": "user", "time": {"created": CREATED_MS}}).to_string(),
        );

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert!(collection.report.is_clean());
        let session = &collection.sessions[0];
        assert_eq!(session.session_id().as_str(), "ses_1");
        assert_eq!(session.project_label(), "/work/gamma");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.started_at(), Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        assert_eq!(session.duration().num_minutes(), 5);
        assert_eq!(
            session.model_usage()[&ModelName::new("claude-sonnet-4")],
            TokenCounts::new(30, 10, 8, 4)
        );
    }

    #[tokio::test]
    async fn test_malformed_message_is_a_warning() {
        let temp = TempDir::new().unwrap();
        write_session(temp.path(), "ses_1", Some(CREATED_MS), None);
        write_message(temp.path(), "ses_1", "msg_a.json", &assistant("gpt-5", 1, 1, CREATED_MS + 1000));
        write_message(temp.path(), "ses_1", "msg_b.json", "{\"role\": \"assis");

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.sessions[0].message_count(), 1);
        assert!(collection.report.skipped.is_empty());
        assert_eq!(collection.report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_created_is_malformed() {
        let temp = TempDir::new().unwrap();
        write_session(temp.path(), "ses_1", None, Some(CREATED_MS));
        write_session(temp.path(), "ses_2", Some(CREATED_MS), None);

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.sessions[0].session_id().as_str(), "ses_2");
        assert_eq!(collection.sessions[0].message_count(), 0);
        assert!(collection.report.skipped[0].reason.contains("time.created"));
    }

    #[tokio::test]
    async fn test_token_overflow_skips_the_session() {
        let temp = TempDir::new().unwrap();
        let huge = u64::MAX / 2 + 10;
        write_session(temp.path(), "ses_1", Some(CREATED_MS), None);
        write_message(temp.path(), "ses_1", "msg_a.json", &assistant("gpt-5", 1, 1, CREATED_MS + 1000));
        write_session(temp.path(), "ses_2", Some(CREATED_MS), None);
        write_message(temp.path(), "ses_2", "msg_a.json", &assistant("gpt-5", huge, 1, CREATED_MS + 1000));
        write_message(temp.path(), "ses_2", "msg_b.json", &assistant("gpt-5", huge, 1, CREATED_MS + 2000));

        let collection = DataLoader::new(temp.path()).collect(epoch()).await;
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.sessions[0].session_id().as_str(), "ses_1");
        assert_eq!(collection.report.skipped.len(), 1);
        assert!(collection.report.skipped[0].path.ends_with("ses_2.json"));
    }

    #[tokio::test]
    async fn test_default_root_precedence() {
        let _lock = ENV_MUTEX.lock().await;
        let mut guard = EnvVarGuard::new();
        guard.set("XDG_DATA_HOME", "/tmp/xdg");
        guard.remove(ROOT_ENV);
        assert_eq!(DataLoader::default_root(), PathBuf::from("/tmp/xdg/opencode"));

        guard.set(ROOT_ENV, "/tmp/oc");
        assert_eq!(DataLoader::default_root(), PathBuf::from("/tmp/oc"));
    }
}
