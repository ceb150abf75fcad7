// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Command-line interface.
//!
//! All user input is validated here; the sync core receives a finished
//! [`SyncOptions`].

use crate::services::sport::{is_known_sport, KNOWN_SPORTS};
use crate::services::sync::SyncOptions;
use crate::time_utils::{end_of_day_exclusive, parse_date, start_of_day};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "strava-komoot-sync")]
#[command(version)]
#[command(about = "Sync Strava activities to Komoot", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// More logging (-v for debug)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload Strava activities to Komoot
    Sync(SyncArgs),

    /// Export Strava activities as GPX files
    Download(DownloadArgs),

    /// List activities or tours
    List {
        #[command(subcommand)]
        target: ListTarget,
    },

    /// Show the sync ledger
    Ledger(LedgerArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Inclusive date range in UTC days.
#[derive(Debug, Clone, Default, Args)]
pub struct DateRange {
    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub after: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub before: Option<NaiveDate>,
}

impl DateRange {
    /// `[after 00:00, day after before 00:00)` as instants.
    pub fn bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), String> {
        if let (Some(after), Some(before)) = (self.after, self.before) {
            if after > before {
                return Err(format!("--after ({after}) is later than --before ({before})"));
            }
        }
        Ok((
            self.after.map(start_of_day),
            self.before.map(end_of_day_exclusive),
        ))
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub range: DateRange,

    /// Sync only these activity IDs (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub activity_ids: Vec<u64>,

    /// Never sync these activity IDs (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude_ids: Vec<u64>,

    /// Only these Strava activity types, e.g. Ride,Run
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,

    /// Komoot sport to use for every activity
    #[arg(long, value_parser = parse_sport)]
    pub sport: Option<String>,

    /// Ledger file (overrides sync.ledger_path)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Show what would be synced without uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

impl SyncArgs {
    pub fn to_options(&self) -> Result<SyncOptions, String> {
        let (after, before) = self.range.bounds()?;
        Ok(SyncOptions {
            after,
            before,
            activity_types: type_set(&self.types),
            activity_ids: self.activity_ids.clone(),
            exclude_ids: self.exclude_ids.iter().copied().collect(),
            sport_override: self.sport.clone(),
            dry_run: self.dry_run,
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub range: DateRange,

    /// Only these Strava activity types, e.g. Ride,Run
    #[arg(long, value_delimiter = ',')]
    pub types: Vec<String>,

    /// Directory for GPX files
    #[arg(long, short, default_value = "gpx_exports")]
    pub output: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum ListTarget {
    /// Strava activities
    Strava {
        #[command(flatten)]
        range: DateRange,
    },
    /// Recorded Komoot tours
    Komoot,
}

#[derive(Debug, Clone, Args)]
pub struct LedgerArgs {
    /// Only show failed activities
    #[arg(long)]
    pub failed_only: bool,

    /// Ledger file (overrides sync.ledger_path)
    #[arg(long)]
    pub ledger: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Write an example config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Empty list means "all types".
pub fn type_set(types: &[String]) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = types
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    (!set.is_empty()).then_some(set)
}

fn parse_sport(raw: &str) -> Result<String, String> {
    let sport = raw.trim();
    if is_known_sport(sport) {
        Ok(sport.to_string())
    } else {
        Err(format!(
            "unknown Komoot sport '{sport}'. Known sports: {}",
            KNOWN_SPORTS.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("strava-komoot-sync").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_sync_args_to_options() {
        let cli = parse(&[
            "sync",
            "--after",
            "2024-05-01",
            "--before",
            "2024-05-31",
            "--types",
            "Ride,Run",
            "--exclude-ids",
            "7,8",
            "--sport",
            "mtb",
            "--dry-run",
        ]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync command");
        };
        let options = args.to_options().unwrap();

        assert_eq!(
            options.after,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            options.before,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
        let types = options.activity_types.unwrap();
        assert!(types.contains("Ride") && types.contains("Run"));
        assert_eq!(options.exclude_ids.len(), 2);
        assert_eq!(options.sport_override.as_deref(), Some("mtb"));
        assert!(options.dry_run);
    }

    #[test]
    fn test_activity_ids_list() {
        let cli = parse(&["sync", "--activity-ids", "1,22,333"]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync command");
        };
        assert_eq!(args.activity_ids, vec![1, 22, 333]);
        assert!(args.to_options().unwrap().activity_types.is_none());
    }

    #[test]
    fn test_unknown_sport_rejected() {
        let result = Cli::try_parse_from(["strava-komoot-sync", "sync", "--sport", "swimming"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_date_rejected() {
        let result = Cli::try_parse_from(["strava-komoot-sync", "sync", "--after", "01/05/2024"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let range = DateRange {
            after: Some(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()),
            before: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        };
        assert!(range.bounds().is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = parse(&["-vv", "--log-json", "ledger", "--failed-only"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_json);
        assert!(matches!(
            cli.command,
            Command::Ledger(LedgerArgs {
                failed_only: true,
                ..
            })
        ));
    }
}
