//! Conversion from aggregated stats to the export schema
//!
//! Project labels are ranked by descending session count, ties kept in
//! first-seen order, and numbered from "Project A". The raw label to
//! anonymous label map only lives for the duration of one `sanitize` call.
//!
//! Placeholder models (`unknown`, `<synthetic>`) are left out of the export;
//! their tokens still count locally.

use std::collections::{BTreeMap, HashMap};
use vibeclock_core::aggregation_types::{AgentStats, CombinedStats, favorite_model};
use vibeclock_core::types::{ModelName, ModelUsage};

use crate::export::{AnonymizedProject, ProjectLabel, SanitizedAgentStats, SanitizedExport};

/// Types that can be reduced to publishable form
pub trait Sanitize {
    type Output;

    fn sanitize(&self) -> Self::Output;
}

/// Model names that say nothing about real usage
const PLACEHOLDER_MODELS: &[&str] = &[ModelName::UNKNOWN, "<synthetic>"];

fn is_placeholder(model: &ModelName) -> bool {
    PLACEHOLDER_MODELS.contains(&model.as_str())
}

fn published_models(token_totals: &ModelUsage) -> ModelUsage {
    token_totals
        .iter()
        .filter(|(model, _)| !is_placeholder(model))
        .map(|(model, tokens)| (model.clone(), *tokens))
        .collect()
}

/// Hands out ordinal labels in the order raw labels are first requested
#[derive(Default)]
struct ProjectAnonymizer {
    labels: HashMap<String, ProjectLabel>,
}

impl ProjectAnonymizer {
    fn label_for(&mut self, raw: &str) -> ProjectLabel {
        let next = self.labels.len();
        self.labels
            .entry(raw.to_string())
            .or_insert_with(|| ProjectLabel::from_ordinal(next))
            .clone()
    }
}

fn sanitize_stats(stats: &AgentStats, anonymizer: &mut ProjectAnonymizer) -> SanitizedAgentStats {
    let projects = stats
        .top_projects()
        .into_iter()
        .map(|project| AnonymizedProject {
            label: anonymizer.label_for(&project.label),
            sessions: project.sessions,
        })
        .collect();

    SanitizedAgentStats {
        total_sessions: stats.total_sessions,
        total_messages: stats.total_messages,
        total_duration_secs: stats.total_duration_secs,
        longest_session_secs: stats.longest_session_secs,
        token_totals: published_models(&stats.token_totals)
            .into_iter()
            .map(|(model, tokens)| (model.as_str().to_string(), tokens))
            .collect(),
        hourly_histogram: stats.hourly_histogram,
        weekly_histogram: stats.weekly_histogram,
        daily: stats.daily.clone(),
        projects,
    }
}

impl Sanitize for AgentStats {
    type Output = SanitizedAgentStats;

    fn sanitize(&self) -> SanitizedAgentStats {
        sanitize_stats(self, &mut ProjectAnonymizer::default())
    }
}

impl Sanitize for CombinedStats {
    type Output = SanitizedExport;

    fn sanitize(&self) -> SanitizedExport {
        let mut anonymizer = ProjectAnonymizer::default();
        // totals first so labels follow the combined ranking
        let totals = sanitize_stats(&self.totals, &mut anonymizer);
        let per_source: BTreeMap<_, _> = self
            .per_source
            .iter()
            .map(|(source, stats)| (*source, sanitize_stats(stats, &mut anonymizer)))
            .collect();

        SanitizedExport {
            generated_at: self.window.until,
            since: self.window.since,
            days_covered: self.days_covered,
            totals,
            per_source,
            active_sources: self.active_sources.clone(),
            favorite_model: favorite_model(&published_models(&self.totals.token_totals))
                .map(|m| m.as_str().to_string()),
            peak_hour: self.peak_hour,
        }
    }
}

impl Sanitize for SanitizedAgentStats {
    type Output = SanitizedAgentStats;

    fn sanitize(&self) -> SanitizedAgentStats {
        self.clone()
    }
}

impl Sanitize for SanitizedExport {
    type Output = SanitizedExport;

    fn sanitize(&self) -> SanitizedExport {
        self.clone()
    }
}
