//! End-to-end integration tests for vibeclock
//!
//! These tests run the real readers against fixture directories and carry
//! the result through filtering, aggregation, sanitization and PII
//! validation.

mod common;

use common::{AgentHome, jan};
use vibeclock::{
    aggregation::Aggregator,
    collector::{collect_sources, readers_from_config},
    filters::SessionFilter,
    publish::gist_payload,
};
use vibeclock_core::aggregation_types::AggregationWindow;
use vibeclock_core::timezone::TimezoneConfig;
use vibeclock_core::types::{ModelName, Source};
use vibeclock_sanitizer::{PiiGuard, Sanitize};

fn window() -> AggregationWindow {
    AggregationWindow::new(jan(1, 0), jan(31, 0))
}

fn guard() -> PiiGuard {
    PiiGuard::new(Some("mallory".to_string()), Some("/home/mallory".to_string()))
}

async fn three_source_home() -> AgentHome {
    let home = AgentHome::new();
    home.write_claude_session("project-alpha", "c1", jan(2, 10), 5, 100, 50)
        .await;
    home.write_claude_session("project-alpha", "c2", jan(3, 14), 3, 40, 20)
        .await;
    home.write_codex_session("x1", "/home/mallory/work/beta", jan(4, 9), 300, 30)
        .await;
    home.write_opencode_session("ses_o1", "/home/mallory/work/gamma", jan(5, 22), 70, 7)
        .await;
    home
}

#[tokio::test]
async fn test_three_sources_through_the_whole_pipeline() {
    let home = three_source_home().await;
    let readers = readers_from_config(&home.config());
    let (sessions, reports) = collect_sources(&readers, window().since, false).await;

    assert!(reports.values().all(|r| r.is_clean()));
    assert_eq!(sessions[&Source::ClaudeCode].len(), 2);
    assert_eq!(sessions[&Source::Codex].len(), 1);
    assert_eq!(sessions[&Source::OpenCode].len(), 1);

    let stats = Aggregator::new(TimezoneConfig::utc()).aggregate(&sessions, &window());
    stats.check_invariants().unwrap();
    assert_eq!(stats.totals.total_sessions, 4);
    assert_eq!(
        stats.active_sources,
        vec![Source::ClaudeCode, Source::Codex, Source::OpenCode]
    );
    // codex: 300 + 30 beats claude-3-opus: 140 + 70
    assert_eq!(stats.favorite_model, Some(ModelName::new("gpt-5-codex")));
    assert_eq!(stats.per_source[&Source::ClaudeCode].total_messages, 8);
    assert_eq!(stats.per_source[&Source::Codex].total_messages, 2);

    let export = stats.sanitize();
    let verified = guard().validate(&export).unwrap();
    let json = verified.to_json_pretty().unwrap();
    for raw in ["project-alpha", "/home/mallory", "mallory", "beta", "gamma"] {
        assert!(!json.contains(raw), "export leaked {raw}");
    }
    assert!(json.contains("Project A"));
    assert!(json.contains("Project C"));

    let payload = gist_payload(&verified).unwrap();
    assert!(payload["files"]["vibe-clock-data.json"]["content"].is_string());
}

#[tokio::test]
async fn test_truncated_file_is_skipped_without_error() {
    let home = AgentHome::new();
    for i in 0..10 {
        home.write_claude_session("project-beta", &format!("s{i}"), jan(2, i), 2, 10, 1)
            .await;
    }
    let broken = home
        .write_claude_session("project-beta", "s-broken", jan(3, 1), 2, 10, 1)
        .await;
    let content = std::fs::read_to_string(&broken).unwrap();
    std::fs::write(&broken, &content[..content.len() - 20]).unwrap();

    let readers = readers_from_config(&home.config());
    let (sessions, reports) = collect_sources(&readers, window().since, false).await;

    assert_eq!(sessions[&Source::ClaudeCode].len(), 10);
    let report = &reports[&Source::ClaudeCode];
    assert_eq!(report.files_scanned, 11);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, broken);
}

#[tokio::test]
async fn test_privacy_filter_removes_sessions_before_aggregation() {
    let home = three_source_home().await;
    let mut config = home.config();
    config.privacy.exclude_projects = vec!["*gamma".to_string()];

    let readers = readers_from_config(&config);
    let (sessions, _) = collect_sources(&readers, window().since, false).await;
    let filter = SessionFilter::from_config(&config.privacy, TimezoneConfig::utc()).unwrap();
    let stats = Aggregator::new(TimezoneConfig::utc()).aggregate(&filter.apply(&sessions), &window());

    assert_eq!(stats.totals.total_sessions, 3);
    assert_eq!(stats.per_source[&Source::OpenCode].total_sessions, 0);
    assert_eq!(stats.active_sources, vec![Source::ClaudeCode, Source::Codex]);
}

#[tokio::test]
async fn test_disabled_sources_are_not_read() {
    let home = three_source_home().await;
    let mut config = home.config();
    config.agents.enabled = vec!["codex".to_string()];

    let readers = readers_from_config(&config);
    let (sessions, reports) = collect_sources(&readers, window().since, false).await;
    assert_eq!(sessions.keys().copied().collect::<Vec<_>>(), vec![Source::Codex]);
    assert_eq!(reports.len(), 1);
}

#[tokio::test]
async fn test_sessions_before_since_are_counted_not_kept() {
    let home = three_source_home().await;
    let readers = readers_from_config(&home.config());
    let (sessions, reports) = collect_sources(&readers, jan(3, 0), false).await;

    assert_eq!(sessions[&Source::ClaudeCode].len(), 1);
    assert_eq!(reports[&Source::ClaudeCode].sessions_outside_window, 1);
}

#[tokio::test]
async fn test_missing_roots_give_well_formed_empty_stats() {
    let home = AgentHome::new();
    let readers = readers_from_config(&home.config());
    let (sessions, _) = collect_sources(&readers, window().since, false).await;

    let stats = Aggregator::new(TimezoneConfig::utc()).aggregate(&sessions, &window());
    assert_eq!(stats.totals.total_sessions, 0);
    assert!(stats.active_sources.is_empty());
    assert_eq!(stats.favorite_model, None);
    assert_eq!(stats.peak_hour, 0);
    guard().validate(&stats.sanitize()).unwrap();
}
