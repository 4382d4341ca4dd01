//! Reader trait for agent log sources
//!
//! Every source crate implements [`SessionReader`]. The trait supplies a
//! default [`SessionReader::collect`] that owns the behavior shared by all
//! sources: a missing root yields nothing, each file is parsed in isolation,
//! failures are recorded instead of propagated, session ids are de-duplicated
//! and sessions older than the window start are dropped.
//!
//! A source whose sessions span several files overrides `collect` and builds
//! it from [`discover_files`], [`Collection::skip_file`] and
//! [`Collection::admit`] instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, VibeclockError};
use crate::types::{Session, SessionId, Source};

/// A file that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Side channel describing what a collection pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Candidate files examined
    pub files_scanned: usize,
    /// Files rejected as malformed, with the reason
    pub skipped: Vec<SkippedFile>,
    /// Sessions dropped because their id was already seen
    pub duplicate_sessions: usize,
    /// Sessions dropped because they started before the window
    pub sessions_outside_window: usize,
    /// Problems in auxiliary files that did not sink a session
    pub warnings: Vec<String>,
}

impl CollectReport {
    /// True when nothing was skipped or warned about
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.warnings.is_empty()
    }
}

/// Result of collecting one source
#[derive(Debug, Clone)]
pub struct Collection {
    pub source: Source,
    pub sessions: Vec<Session>,
    pub report: CollectReport,
}

impl Collection {
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            sessions: Vec::new(),
            report: CollectReport::default(),
        }
    }

    /// Record `path` as malformed
    pub fn skip_file(&mut self, path: PathBuf, error: &VibeclockError) {
        warn!("Skipping malformed {} file {}: {}", self.source, path.display(), error);
        self.report.skipped.push(SkippedFile {
            path,
            reason: error.to_string(),
        });
    }

    /// Keep `session` unless its id was already kept or it starts before `since`
    pub fn admit(&mut self, session: Session, since: DateTime<Utc>, seen_ids: &mut HashSet<SessionId>) {
        if !seen_ids.insert(session.session_id().clone()) {
            debug!("Duplicate {} session {}", self.source, session.session_id());
            self.report.duplicate_sessions += 1;
            return;
        }
        if session.started_at() < since {
            self.report.sessions_outside_window += 1;
            return;
        }
        self.sessions.push(session);
    }

    fn log_summary(&self) {
        info!(
            "{}: {} sessions from {} files ({} skipped, {} duplicates, {} outside window)",
            self.source,
            self.sessions.len(),
            self.report.files_scanned,
            self.report.skipped.len(),
            self.report.duplicate_sessions,
            self.report.sessions_outside_window
        );
    }

    /// Log the totals and hand the collection back
    pub fn finish(self) -> Self {
        self.log_summary();
        self
    }
}

/// Candidate files for `reader`, or `None` when there is nothing to read
///
/// A missing root is silent; a failed walk is recorded in `collection`.
pub async fn discover_files<R>(reader: &R, collection: &mut Collection) -> Option<Vec<PathBuf>>
where
    R: SessionReader + ?Sized,
{
    let root = reader.root_dir();
    if !root.is_dir() {
        debug!("{} data directory {} not found, skipping", collection.source, root.display());
        return None;
    }

    match reader.find_session_files().await {
        Ok(files) => Some(files),
        Err(e) => {
            warn!("Failed to enumerate {} session files: {}", collection.source, e);
            collection.report.skipped.push(SkippedFile {
                path: root.to_path_buf(),
                reason: e.to_string(),
            });
            None
        }
    }
}

/// Trait implemented by each agent's log reader
#[async_trait]
pub trait SessionReader: Send + Sync {
    /// Which agent this reader handles
    fn source(&self) -> Source;

    /// Root of the agent's data directory
    fn root_dir(&self) -> &Path;

    /// Enumerate candidate session files in sorted path order
    async fn find_session_files(&self) -> Result<Vec<PathBuf>>;

    /// Parse one file into sessions
    ///
    /// Any error marks the whole file as malformed. Problems that only affect
    /// auxiliary data go into `report.warnings`.
    async fn parse_file(&self, path: &Path, report: &mut CollectReport) -> Result<Vec<Session>>;

    /// Collect every session starting at or after `since`
    ///
    /// Never fails; everything that went wrong is described in the returned
    /// [`CollectReport`].
    async fn collect(&self, since: DateTime<Utc>) -> Collection {
        let mut collection = Collection::empty(self.source());
        let Some(files) = discover_files(self, &mut collection).await else {
            return collection;
        };

        let mut seen_ids = HashSet::new();
        for path in files {
            collection.report.files_scanned += 1;
            match self.parse_file(&path, &mut collection.report).await {
                Ok(sessions) => {
                    for session in sessions {
                        collection.admit(session, since, &mut seen_ids);
                    }
                }
                Err(e) => collection.skip_file(path, &e),
            }
        }
        collection.finish()
    }
}

/// Walk `root` on the blocking pool and return matching files, sorted
pub async fn find_files<F>(root: &Path, predicate: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool + Send + 'static,
{
    let root = root.to_path_buf();
    let mut files = tokio::task::spawn_blocking(move || {
        use walkdir::WalkDir;
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if entry.file_type().is_file() && predicate(path) {
                files.push(path.to_path_buf());
            }
        }
        files
    })
    .await
    .map_err(|e| VibeclockError::Io(std::io::Error::other(e.to_string())))?;

    files.sort();
    Ok(files)
}

/// File name of `path` as a string, empty when not UTF-8
pub fn file_name_str(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or_default()
}
