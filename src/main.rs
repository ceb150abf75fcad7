// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! strava-komoot-sync command-line entry point.

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use strava_komoot_sync::{
    cli::{Cli, Command, ConfigAction, DownloadArgs, LedgerArgs, ListTarget, SyncArgs},
    config::Config,
    db::{JsonFileStore, Ledger},
    models::{ActivityFilter, SyncStatus},
    services::{
        ActivitySource, ExportStrategy, KomootClient, RunStatus, SportMapper, StravaClient,
        SyncOrchestrator,
    },
    time_utils::format_utc_rfc3339,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Run failed");
            eprintln!("Error: {e:#}");
            std::process::exit(RunStatus::Failure.exit_code());
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Sync(args) => sync(&cli.config, args).await,
        Command::Download(args) => download(&cli.config, args).await,
        Command::List { target } => list(&cli.config, target).await,
        Command::Ledger(args) => show_ledger(&cli.config, args),
        Command::Config {
            action: ConfigAction::Init { force },
        } => {
            Config::write_example(&cli.config, force)?;
            println!("Wrote example configuration to {}", cli.config.display());
            Ok(0)
        }
    }
}

async fn sync(config_path: &Path, args: SyncArgs) -> anyhow::Result<i32> {
    let config = Config::load(config_path)?;
    config.validate_strava()?;
    config.validate_komoot()?;
    let options = args.to_options().map_err(anyhow::Error::msg)?;

    let strava = StravaClient::new(&config.strava, config.sync.max_retries)?;
    strava.authenticate().await?;
    let komoot = KomootClient::login(&config.komoot, config.sync.max_retries).await?;

    let ledger_path = args.ledger.unwrap_or_else(|| config.sync.ledger_path.clone());
    let mut ledger = Ledger::load(JsonFileStore::new(&ledger_path));
    tracing::info!(
        path = %ledger_path.display(),
        records = ledger.len(),
        "Ledger loaded"
    );

    let mapper = SportMapper::with_entries(&config.sync.sport_mapping);
    let orchestrator = SyncOrchestrator::new(&strava, &komoot, mapper);
    let summary = orchestrator.run(&mut ledger, &options).await?;

    if summary.dry_run {
        println!("Dry run: {} activities would be synced", summary.would_sync.len());
        for id in &summary.would_sync {
            println!("  {id}");
        }
        for id in &summary.unavailable {
            println!("  {id} (could not fetch)");
        }
    } else {
        println!(
            "Attempted {}, succeeded {}, failed {}, skipped {}",
            summary.attempted, summary.succeeded, summary.failed, summary.skipped
        );
        for failure in &summary.failures {
            println!(
                "  {} [{}] {}: {}",
                failure.activity_id,
                failure.stage,
                failure.activity_name.as_deref().unwrap_or(""),
                failure.error
            );
        }
    }

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    Ok(summary.status().exit_code())
}

/// Entry in `activities_summary.json` written by `download`.
#[derive(Debug, Serialize)]
struct DownloadEntry {
    id: u64,
    name: String,
    activity_type: String,
    start_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn download(config_path: &Path, args: DownloadArgs) -> anyhow::Result<i32> {
    let config = Config::load(config_path)?;
    config.validate_strava()?;
    let (after, before) = args.range.bounds().map_err(anyhow::Error::msg)?;

    let strava = StravaClient::new(&config.strava, config.sync.max_retries)?;
    strava.authenticate().await?;

    let filter = ActivityFilter {
        after,
        before,
        activity_types: strava_komoot_sync::cli::type_set(&args.types),
    };
    let activities = strava.list_activities(&filter).await?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let strategy = ExportStrategy::new(&strava);
    let mut entries = Vec::with_capacity(activities.len());
    let mut exported = 0usize;

    for activity in &activities {
        let mut entry = DownloadEntry {
            id: activity.id,
            name: activity.name.clone(),
            activity_type: activity.activity_type.clone(),
            start_date: format_utc_rfc3339(activity.start_date),
            file: None,
            error: None,
        };

        match strategy.export(activity).await {
            Ok(track) => {
                let file_name = format!(
                    "{}_{}_{}.gpx",
                    activity.start_date.format("%Y-%m-%d"),
                    activity.activity_type,
                    activity.id
                );
                let path = args.output.join(file_name);
                std::fs::write(&path, track.to_gpx())
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(activity_id = activity.id, path = %path.display(), "Exported");
                entry.file = Some(path);
                exported += 1;
            }
            Err(e) if e.is_run_fatal() => return Err(e.into()),
            Err(e) => {
                tracing::error!(
                    activity_id = activity.id,
                    kind = e.kind(),
                    error = %e,
                    "Export failed"
                );
                entry.error = Some(e.to_string());
            }
        }
        entries.push(entry);
    }

    let summary_path = args.output.join("activities_summary.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&entries)?)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;

    let failed = entries.len() - exported;
    println!(
        "Exported {exported} of {} activities to {}",
        entries.len(),
        args.output.display()
    );

    let status = if failed == 0 {
        RunStatus::Success
    } else if exported > 0 {
        RunStatus::PartialSuccess
    } else {
        RunStatus::Failure
    };
    Ok(status.exit_code())
}

async fn list(config_path: &Path, target: ListTarget) -> anyhow::Result<i32> {
    let config = Config::load(config_path)?;

    match target {
        ListTarget::Strava { range } => {
            config.validate_strava()?;
            let (after, before) = range.bounds().map_err(anyhow::Error::msg)?;
            let strava = StravaClient::new(&config.strava, config.sync.max_retries)?;
            strava.authenticate().await?;

            let filter = ActivityFilter {
                after,
                before,
                activity_types: None,
            };
            let activities = strava.list_activities(&filter).await?;

            println!("{:>12}  {:<10}  {:<18}  {:>9}  NAME", "ID", "DATE", "TYPE", "KM");
            for a in &activities {
                println!(
                    "{:>12}  {:<10}  {:<18}  {:>9.1}  {}",
                    a.id,
                    a.start_date.format("%Y-%m-%d"),
                    a.activity_type,
                    a.distance_meters / 1000.0,
                    a.name
                );
            }
            println!("{} activities", activities.len());
        }
        ListTarget::Komoot => {
            config.validate_komoot()?;
            let komoot = KomootClient::login(&config.komoot, config.sync.max_retries).await?;
            let tours = komoot.list_tours().await?;

            if let Some(name) = komoot.display_name() {
                println!("Recorded tours of {name}");
            }
            println!("{:>12}  {:<10}  {:<18}  {:>9}  NAME", "ID", "DATE", "SPORT", "KM");
            for t in &tours {
                let date = t.date.as_deref().map(|d| d.get(..10).unwrap_or(d)).unwrap_or("");
                println!(
                    "{:>12}  {:<10}  {:<18}  {:>9.1}  {}",
                    t.id_string(),
                    date,
                    t.sport,
                    t.distance.unwrap_or(0.0) / 1000.0,
                    t.name
                );
            }
            println!("{} tours", tours.len());
        }
    }
    Ok(0)
}

fn show_ledger(config_path: &Path, args: LedgerArgs) -> anyhow::Result<i32> {
    let config = Config::load(config_path)?;
    let path = args.ledger.unwrap_or_else(|| config.sync.ledger_path.clone());
    let ledger = Ledger::load(JsonFileStore::new(&path));

    let records: Vec<_> = ledger
        .records()
        .filter(|r| !args.failed_only || r.status == SyncStatus::Failed)
        .collect();

    println!(
        "{:>12}  {:<9}  {:>12}  {:<16}  {:<20}  NAME",
        "ACTIVITY", "STATUS", "TOUR", "SPORT", "SYNCED"
    );
    for r in &records {
        let status = match r.status {
            SyncStatus::Succeeded => "succeeded",
            SyncStatus::Failed => "failed",
        };
        println!(
            "{:>12}  {:<9}  {:>12}  {:<16}  {:<20}  {}",
            r.source_activity_id,
            status,
            r.destination_tour_id.as_deref().unwrap_or("-"),
            r.sport_type_used.as_deref().unwrap_or("-"),
            format_utc_rfc3339(r.synced_at),
            r.activity_name.as_deref().unwrap_or("")
        );
        if let Some(error) = &r.error {
            println!("{:>12}  {error}", "");
        }
    }
    println!("{} of {} records ({})", records.len(), ledger.len(), path.display());
    Ok(0)
}

/// Human-readable logs on stderr, or JSON lines with `--log-json`.
fn init_logging(verbose: u8, json: bool) {
    let default_directives = match verbose {
        0 => "strava_komoot_sync=info,warn",
        _ => "strava_komoot_sync=debug,info",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let human_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(human_layer)
        .init();
}
