//! Driving the source readers
//!
//! Builds one reader per enabled source and runs them concurrently. Readers
//! touch disjoint directory trees and results are keyed by source, so the
//! outcome does not depend on which reader finishes first.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use tracing::debug;
use vibeclock_core::provider::{CollectReport, SessionReader};
use vibeclock_core::types::{Session, Source};

use crate::config::Config;

/// Sessions grouped by the agent that recorded them
pub type SessionsBySource = BTreeMap<Source, Vec<Session>>;

/// Per-source collection reports
pub type ReportsBySource = BTreeMap<Source, CollectReport>;

/// Reader for `source` rooted at the configured or default directory
pub fn reader_for(source: Source, config: &Config) -> Box<dyn SessionReader> {
    let root = config.paths.root_for(source);
    match source {
        Source::ClaudeCode => Box::new(vibeclock_provider_claude::DataLoader::new(
            root.unwrap_or_else(vibeclock_provider_claude::DataLoader::default_root),
        )),
        Source::Codex => Box::new(vibeclock_provider_codex::DataLoader::new(
            root.unwrap_or_else(vibeclock_provider_codex::DataLoader::default_root),
        )),
        Source::OpenCode => Box::new(vibeclock_provider_opencode::DataLoader::new(
            root.unwrap_or_else(vibeclock_provider_opencode::DataLoader::default_root),
        )),
    }
}

/// Readers for every enabled source, in canonical order
pub fn readers_from_config(config: &Config) -> Vec<Box<dyn SessionReader>> {
    config
        .agents
        .enabled_sources()
        .into_iter()
        .map(|source| {
            let reader = reader_for(source, config);
            debug!("{} reader rooted at {}", source, reader.root_dir().display());
            reader
        })
        .collect()
}

/// Run every reader and gather sessions and reports by source
///
/// Every reader gets an entry in both maps, even when it found nothing.
pub async fn collect_sources(
    readers: &[Box<dyn SessionReader>],
    since: DateTime<Utc>,
    show_progress: bool,
) -> (SessionsBySource, ReportsBySource) {
    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed_precise}]")
        {
            pb.set_style(style);
        }
        pb.set_message("Reading agent logs");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let collections = join_all(readers.iter().map(|reader| reader.collect(since))).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut sessions = SessionsBySource::new();
    let mut reports = ReportsBySource::new();
    for collection in collections {
        sessions
            .entry(collection.source)
            .or_default()
            .extend(collection.sessions);
        reports.insert(collection.source, collection.report);
    }
    (sessions, reports)
}
