//! Common test utilities and helpers for vibeclock tests
//!
//! Fixture writers lay out agent logs the way each agent does on disk, so
//! integration tests can run the real readers against a temporary directory.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use vibeclock::config::Config;
use vibeclock_core::types::{Session, Source, TokenCounts};

/// Common test models
pub const TEST_MODELS: &[&str] = &["claude-3-opus", "gpt-5-codex", "claude-sonnet-4"];

/// Common test projects
pub const TEST_PROJECTS: &[&str] = &["project-alpha", "project-beta", "project-gamma"];

/// Start of the fixture month
pub fn jan(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

/// Builder for in-memory sessions
pub struct SessionFixture {
    source: Source,
    id: String,
    started_at: DateTime<Utc>,
    minutes: i64,
    project: String,
    messages: u64,
    model: String,
    tokens: TokenCounts,
}

impl SessionFixture {
    pub fn new(source: Source, id: &str) -> Self {
        Self {
            source,
            id: id.to_string(),
            started_at: jan(1, 10),
            minutes: 15,
            project: TEST_PROJECTS[0].to_string(),
            messages: 1,
            model: TEST_MODELS[0].to_string(),
            tokens: TokenCounts::new(10, 5, 0, 0),
        }
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.started_at = ts;
        self
    }

    pub fn minutes(mut self, minutes: i64) -> Self {
        self.minutes = minutes;
        self
    }

    pub fn project(mut self, project: &str) -> Self {
        self.project = project.to_string();
        self
    }

    pub fn messages(mut self, messages: u64) -> Self {
        self.messages = messages;
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens = TokenCounts::new(input, output, 0, 0);
        self
    }

    pub fn build(self) -> Session {
        Session::builder(self.source, self.id, self.started_at)
            .ended_at(self.started_at + Duration::minutes(self.minutes))
            .project_label(self.project)
            .message_count(self.messages)
            .tokens(self.model, self.tokens)
            .build()
    }
}

/// Temporary home holding one data root per agent
pub struct AgentHome {
    pub temp: TempDir,
}

impl AgentHome {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn claude_root(&self) -> PathBuf {
        self.temp.path().join("claude")
    }

    pub fn codex_root(&self) -> PathBuf {
        self.temp.path().join("codex")
    }

    pub fn opencode_root(&self) -> PathBuf {
        self.temp.path().join("opencode")
    }

    /// Config pointing every reader into this home
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.paths.claude_code = Some(self.claude_root().display().to_string());
        config.paths.codex = Some(self.codex_root().display().to_string());
        config.paths.opencode = Some(self.opencode_root().display().to_string());
        config
    }

    /// One Claude Code transcript with a single session
    pub async fn write_claude_session(
        &self,
        project: &str,
        session_id: &str,
        start: DateTime<Utc>,
        messages: u64,
        input: u64,
        output: u64,
    ) -> PathBuf {
        let mut lines = Vec::new();
        for i in 0..messages {
            let ts = start + Duration::minutes(i as i64);
            lines.push(
                json!({
                    "type": "assistant",
                    "sessionId": session_id,
                    "timestamp": ts.to_rfc3339(),
                    "requestId": format!("req_{session_id}_{i}"),
                    "cwd": format!("/home/dev/{project}"),
                    "message": {
                        "id": format!("msg_{session_id}_{i}"),
                        "model": "claude-3-opus",
                        "role": "assistant",
                        "usage": {
                            "input_tokens": if i == 0 { input } else { 0 },
                            "output_tokens": if i == 0 { output } else { 0 }
                        }
                    }
                })
                .to_string(),
            );
        }
        let path = self
            .claude_root()
            .join("projects")
            .join(project)
            .join(format!("{session_id}.jsonl"));
        write_file(&path, &lines.join("\n")).await;
        path
    }

    /// One Codex rollout
    pub async fn write_codex_session(
        &self,
        session_id: &str,
        cwd: &str,
        start: DateTime<Utc>,
        input: u64,
        output: u64,
    ) -> PathBuf {
        let ts = |offset: i64| (start + Duration::seconds(offset)).to_rfc3339();
        let usage = json!({
            "input_tokens": input,
            "cached_input_tokens": 0,
            "output_tokens": output,
            "total_tokens": input + output
        });
        let lines = [
            json!({"timestamp": ts(0), "type": "session_meta", "payload": {"id": session_id, "cwd": cwd}}),
            json!({"timestamp": ts(1), "type": "turn_context", "payload": {"model": "gpt-5-codex"}}),
            json!({"timestamp": ts(2), "type": "event_msg", "payload": {"type": "user_message", "message": "go"}}),
            json!({"timestamp": ts(60), "type": "response_item", "payload": {"type": "message", "role": "assistant"}}),
            json!({
                "timestamp": ts(61),
                "type": "event_msg",
                "payload": {"type": "token_count", "info": {"total_token_usage": usage, "last_token_usage": usage}}
            }),
        ];
        let content: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        let path = self
            .codex_root()
            .join("sessions/2024/01/01")
            .join(format!("rollout-2024-01-01-{session_id}.jsonl"));
        write_file(&path, &content.join("\n")).await;
        path
    }

    /// One OpenCode session with a single assistant message
    pub async fn write_opencode_session(
        &self,
        session_id: &str,
        directory: &str,
        start: DateTime<Utc>,
        input: u64,
        output: u64,
    ) -> PathBuf {
        let created = start.timestamp_millis();
        let session = json!({
            "id": session_id,
            "directory": directory,
            "title": "fixture",
            "time": {"created": created, "updated": created + 120_000}
        });
        let path = self
            .opencode_root()
            .join("storage/session/proj_1")
            .join(format!("{session_id}.json"));
        write_file(&path, &session.to_string()).await;

        let message = json!({
            "id": "msg_1",
            "role": "assistant",
            "modelID": "claude-sonnet-4",
            "tokens": {"input": input, "output": output, "cache": {"read": 0, "write": 0}},
            "time": {"created": created + 1_000, "completed": created + 60_000}
        });
        write_file(
            &self
                .opencode_root()
                .join("storage/message")
                .join(session_id)
                .join("msg_1.json"),
            &message.to_string(),
        )
        .await;
        path
    }
}

/// Write `content` to `path`, creating parent directories
pub async fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.unwrap();
    }
    fs::write(path, content).await.unwrap();
}
