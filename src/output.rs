//! Output formatting module for vibeclock
//!
//! This module renders aggregated stats for the terminal:
//! - Table format for human-readable terminal output
//! - JSON format for scripting and local export
//!
//! Local rendering works on [`CombinedStats`] and may show raw project
//! labels. The dry-run preview renders a [`SanitizedExport`] instead, so it
//! shows exactly what a push would send.

use colored::*;
use prettytable::{Cell, Row, Table, format, row};
use serde_json::json;
use vibeclock_core::aggregation_types::{AgentStats, CombinedStats};
use vibeclock_core::timezone::TimezoneConfig;
use vibeclock_sanitizer::{PiiViolations, SanitizedExport};

use crate::collector::ReportsBySource;

/// Number of projects listed in the summary table
const TOP_PROJECTS: usize = 10;
/// Number of trailing days listed in the dry-run preview
const PREVIEW_DAYS: usize = 7;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format the combined stats of one run
    fn format_summary(&self, stats: &CombinedStats, tz: &TimezoneConfig) -> String;

    /// Format the per-source collection reports
    fn format_report(&self, reports: &ReportsBySource) -> String;
}

/// Format a count with K/M/B suffixes
///
/// # Examples
/// ```
/// use vibeclock::output::format_number;
///
/// assert_eq!(format_number(999), "999");
/// assert_eq!(format_number(1_000), "1K");
/// assert_eq!(format_number(1_500_000), "1.5M");
/// ```
pub fn format_number(n: u64) -> String {
    let (value, suffix) = if n >= 1_000_000_000 {
        (n as f64 / 1_000_000_000.0, "B")
    } else if n >= 1_000_000 {
        (n as f64 / 1_000_000.0, "M")
    } else if n >= 1_000 {
        (n as f64 / 1_000.0, "K")
    } else {
        return n.to_string();
    };

    let formatted = format!("{value:.1}");
    let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{trimmed}{suffix}")
}

/// Format a duration in seconds as hours or minutes
pub fn format_duration(secs: u64) -> String {
    if secs >= 3600 {
        format!("{:.1} hrs", secs as f64 / 3600.0)
    } else {
        format!("{} min", secs / 60)
    }
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    fn overview_table(stats: &CombinedStats, tz: &TimezoneConfig) -> Table {
        let totals = &stats.totals;
        let active = if stats.active_sources.is_empty() {
            "-".to_string()
        } else {
            stats
                .active_sources
                .iter()
                .map(|s| s.display_name())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Metric", b -> "Value"]);
        table.add_row(row!["Total Time", r -> format_duration(totals.total_duration_secs)]);
        table.add_row(row!["Sessions", r -> totals.total_sessions]);
        table.add_row(row!["Messages", r -> format_number(totals.total_messages)]);
        table.add_row(row!["Tokens", r -> format_number(totals.total_tokens().total())]);
        table.add_row(row![
            "Favorite Model",
            r -> stats.favorite_model.as_ref().map_or("-", |m| m.as_str())
        ]);
        table.add_row(row![
            "Peak Hour",
            r -> format!("{}:00 {}", stats.peak_hour, tz.display_name())
        ]);
        table.add_row(row!["Active Agents", r -> active]);
        table.add_row(row![
            "Longest Session",
            r -> format_duration(totals.longest_session_secs)
        ]);
        table
    }

    fn source_table(stats: &CombinedStats) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![
            b -> "Agent",
            b -> "Sessions",
            b -> "Messages",
            b -> "Time",
            b -> "Input",
            b -> "Output",
            b -> "Cache Read",
            b -> "Cache Write"
        ]);

        for (source, agent) in &stats.per_source {
            table.add_row(Self::source_row(source.display_name(), agent));
        }
        table.add_row(Row::new(vec![Cell::new(""); 8]));
        table.add_row(Self::totals_row(&stats.totals));
        table
    }

    fn totals_row(totals: &AgentStats) -> Row {
        let tokens = totals.total_tokens();
        row![
            b -> "TOTAL",
            b -> totals.total_sessions,
            b -> format_number(totals.total_messages),
            b -> format_duration(totals.total_duration_secs),
            b -> format_number(tokens.input_tokens),
            b -> format_number(tokens.output_tokens),
            b -> format_number(tokens.cache_read_tokens),
            b -> format_number(tokens.cache_write_tokens)
        ]
    }

    fn source_row(name: &str, agent: &AgentStats) -> Row {
        let tokens = agent.total_tokens();
        row![
            name,
            r -> agent.total_sessions,
            r -> format_number(agent.total_messages),
            r -> format_duration(agent.total_duration_secs),
            r -> format_number(tokens.input_tokens),
            r -> format_number(tokens.output_tokens),
            r -> format_number(tokens.cache_read_tokens),
            r -> format_number(tokens.cache_write_tokens)
        ]
    }

    fn model_table(stats: &CombinedStats) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Model", b -> "Input", b -> "Output", b -> "Total"]);
        for (model, tokens) in &stats.totals.token_totals {
            table.add_row(row![
                model.as_str(),
                r -> format_number(tokens.input_tokens),
                r -> format_number(tokens.output_tokens),
                r -> format_number(tokens.total())
            ]);
        }
        table
    }

    fn project_table(stats: &CombinedStats) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row![b -> "Project", b -> "Sessions"]);
        for project in stats.totals.top_projects().iter().take(TOP_PROJECTS) {
            table.add_row(row![project.label, r -> project.sessions]);
        }
        table
    }

    fn weekly_line(stats: &CombinedStats) -> String {
        WEEKDAYS
            .iter()
            .zip(stats.totals.weekly_histogram)
            .map(|(day, count)| format!("{day} {count}"))
            .collect::<Vec<_>>()
            .join("  ")
    }
}

impl OutputFormatter for TableFormatter {
    fn format_summary(&self, stats: &CombinedStats, tz: &TimezoneConfig) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{}\n",
            format!("Vibe Clock - Last {} Days", stats.days_covered).bold()
        ));

        if stats.totals.total_sessions == 0 {
            output.push_str(&format!(
                "{}\n",
                "No agent sessions found in this window.".yellow()
            ));
            return output;
        }

        output.push_str(&Self::overview_table(stats, tz).to_string());
        output.push('\n');
        output.push_str(&Self::source_table(stats).to_string());

        if !stats.totals.token_totals.is_empty() {
            output.push_str(&format!("\n{}\n", "Models".bold()));
            output.push_str(&Self::model_table(stats).to_string());
        }
        if !stats.totals.project_sessions.is_empty() {
            output.push_str(&format!("\n{}\n", "Projects".bold()));
            output.push_str(&Self::project_table(stats).to_string());
        }

        output.push_str(&format!("\n{} {}\n", "Weekdays:".bold(), Self::weekly_line(stats)));
        output
    }

    fn format_report(&self, reports: &ReportsBySource) -> String {
        let mut output = String::new();
        for (source, report) in reports {
            let mut line = format!(
                "  {}: {} file(s) scanned",
                source.display_name(),
                report.files_scanned
            );
            if report.duplicate_sessions > 0 {
                line.push_str(&format!(", {} duplicate(s)", report.duplicate_sessions));
            }
            if report.sessions_outside_window > 0 {
                line.push_str(&format!(
                    ", {} outside window",
                    report.sessions_outside_window
                ));
            }
            output.push_str(&format!("{}\n", line.dimmed()));

            for skipped in &report.skipped {
                output.push_str(&format!(
                    "    {} {}: {}\n",
                    "skipped".yellow(),
                    skipped.path.display(),
                    skipped.reason
                ));
            }
            for warning in &report.warnings {
                output.push_str(&format!("    {} {}\n", "warning".yellow(), warning));
            }
        }
        output
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_summary(&self, stats: &CombinedStats, _tz: &TimezoneConfig) -> String {
        serde_json::to_string_pretty(stats)
            .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
    }

    fn format_report(&self, reports: &ReportsBySource) -> String {
        let output = json!({
            "reports": reports.iter().map(|(source, report)| json!({
                "source": source,
                "files_scanned": report.files_scanned,
                "skipped": report.skipped.iter().map(|s| json!({
                    "path": s.path.display().to_string(),
                    "reason": s.reason,
                })).collect::<Vec<_>>(),
                "duplicate_sessions": report.duplicate_sessions,
                "sessions_outside_window": report.sessions_outside_window,
                "warnings": report.warnings,
            })).collect::<Vec<_>>()
        });
        output.to_string()
    }
}

/// Get the formatter matching the `--json` flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}

/// Human-readable preview of what a push would send
pub fn format_preview(export: &SanitizedExport) -> String {
    let totals = &export.totals;
    let active: Vec<_> = export.active_sources.iter().map(|s| s.as_str()).collect();

    let mut lines = vec![
        "=== Dry Run: Data to be pushed ===".to_string(),
        String::new(),
        format!("Generated at: {}", export.generated_at.to_rfc3339()),
        format!("Days covered: {}", export.days_covered),
        format!("Total sessions: {}", totals.total_sessions),
        format!("Total messages: {}", totals.total_messages),
        format!("Total time: {}", format_duration(totals.total_duration_secs)),
        format!("Total tokens: {}", format_number(totals.total_tokens().total())),
        format!("Active agents: {}", active.join(", ")),
        format!(
            "Favorite model: {}",
            export.favorite_model.as_deref().unwrap_or("-")
        ),
        format!("Peak hour: {}:00", export.peak_hour),
        format!(
            "Longest session: {}",
            format_duration(totals.longest_session_secs)
        ),
        String::new(),
        "--- Daily Activity ---".to_string(),
    ];

    let skip = totals.daily.len().saturating_sub(PREVIEW_DAYS);
    for day in &totals.daily[skip..] {
        lines.push(format!(
            "  {}: {} sessions, {} msgs, {}",
            day.date,
            day.sessions,
            day.messages,
            format_duration(day.duration_secs)
        ));
    }
    if skip > 0 {
        lines.push(format!("  ... and {skip} earlier days"));
    }

    lines.push(String::new());
    lines.push("--- Models ---".to_string());
    for (model, tokens) in &totals.token_totals {
        lines.push(format!("  {}: {} tokens", model, format_number(tokens.total())));
    }

    lines.push(String::new());
    lines.push("--- Projects (anonymized) ---".to_string());
    for project in &totals.projects {
        lines.push(format!("  {}: {} sessions", project.label, project.sessions));
    }

    lines.push(String::new());
    lines.push("=== No file paths, project names, or PII above ===".to_string());
    lines.join("\n")
}

/// Describe PII findings without echoing the offending values
pub fn format_pii_findings(violations: &PiiViolations) -> String {
    let mut output = format!("{}\n", violations.to_string().red().bold());
    for finding in &violations.findings {
        output.push_str(&format!("  - {} at {}\n", finding.kind, finding.location));
    }
    output.push_str("Nothing was sent. Adjust [privacy] exclusions and try again.\n");
    output
}
