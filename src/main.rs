//! vibeclock - Summarize and publish AI coding agent usage from local logs

use chrono::Utc;
use clap::Parser;
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibeclock::{
    aggregation::Aggregator,
    cli::{Cli, Command, ExportArgs, PushArgs},
    collector::{ReportsBySource, collect_sources, readers_from_config},
    config::Config,
    filters::SessionFilter,
    output::{format_pii_findings, format_preview, get_formatter},
    publish::{GistPublisher, Publisher},
};
use vibeclock_core::aggregation_types::{AggregationWindow, CombinedStats};
use vibeclock_core::error::{Result, VibeclockError};
use vibeclock_core::timezone::TimezoneConfig;
use vibeclock_sanitizer::{Sanitize, VerifiedExport, validate_no_pii};

/// Collect, filter and aggregate every enabled source
async fn gather_stats(
    cli: &Cli,
    config: &Config,
    tz_config: TimezoneConfig,
) -> Result<(CombinedStats, ReportsBySource)> {
    let days = cli.days(config);
    let window = AggregationWindow::trailing_days(Utc::now(), days)?;
    info!("Aggregating the last {} day(s)", days);

    let readers = readers_from_config(config);
    let show_progress = !cli.json && is_terminal::is_terminal(std::io::stderr());
    let (sessions, reports) = collect_sources(&readers, window.since, show_progress).await;

    let filter = SessionFilter::from_config(&config.privacy, tz_config.clone())?;
    let sessions = if filter.is_empty() {
        sessions
    } else {
        filter.apply(&sessions)
    };

    let stats = Aggregator::new(tz_config).aggregate(&sessions, &window);
    debug!("Aggregated {} session(s)", stats.totals.total_sessions);
    Ok((stats, reports))
}

/// Sanitize and verify; findings are printed, never the payload
fn verify_export(stats: &CombinedStats) -> Result<VerifiedExport> {
    validate_no_pii(&stats.sanitize()).map_err(|violations| {
        eprint!("{}", format_pii_findings(&violations));
        VibeclockError::from(violations)
    })
}

async fn run_export(stats: &CombinedStats, args: &ExportArgs) -> Result<()> {
    let content = if args.sanitized {
        verify_export(stats)?.to_json_pretty()?
    } else {
        serde_json::to_string_pretty(stats)?
    };
    tokio::fs::write(&args.output, content).await?;
    println!("Exported to {}", args.output.display());
    Ok(())
}

async fn run_push(
    stats: &CombinedStats,
    config: &Config,
    config_path: &Path,
    args: &PushArgs,
) -> Result<()> {
    let verified = verify_export(stats)?;

    if args.dry_run {
        println!("{}", format_preview(verified.as_export()));
        return Ok(());
    }

    let token = config
        .github
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            VibeclockError::Config(
                "no GitHub token configured; set github.token or GITHUB_TOKEN".to_string(),
            )
        })?;

    let publisher = GistPublisher::new(token, config.github.gist_id.clone());
    let receipt = publisher.publish(&verified).await?;
    if receipt.created {
        println!("Created gist: {}", receipt.gist_id);
        // the gist exists already, so a failed save must not fail the push
        if let Err(e) = Config::save_gist_id(config_path, &receipt.gist_id) {
            warn!("Could not save gist id to {}: {}", config_path.display(), e);
            println!(
                "Set github.gist_id = \"{}\" in the config to update it next time",
                receipt.gist_id
            );
        }
    } else {
        println!("Updated gist: {}", receipt.gist_id);
    }
    if let Some(url) = receipt.html_url {
        println!("{url}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Quiet by default; --verbose or RUST_LOG opens it up
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vibeclock=info"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = Config::load(Some(&config_path))?;
    let tz_config = TimezoneConfig::from_cli(cli.timezone.as_deref(), cli.utc)?;
    info!("Using timezone: {}", tz_config.display_name());

    let (stats, reports) = gather_stats(&cli, &config, tz_config.clone()).await?;
    let formatter = get_formatter(cli.json);

    match &cli.command {
        None | Some(Command::Summary) => {
            if !cli.json {
                eprint!("{}", formatter.format_report(&reports));
            }
            println!("{}", formatter.format_summary(&stats, &tz_config));
        }
        Some(Command::Export(args)) => run_export(&stats, args).await?,
        Some(Command::Push(args)) => run_push(&stats, &config, &config_path, args).await?,
    }

    Ok(())
}
