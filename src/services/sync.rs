// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestrator.
//!
//! Activities are processed one at a time. Each one moves through
//! `Pending -> Exporting -> Mapping -> Uploading` and ends `Succeeded` or
//! `Failed`; the outcome is committed to the ledger before the next activity
//! starts. A per-activity failure never stops the batch. Run-fatal errors
//! (auth, ledger persistence) abort the run without recording the activity
//! in flight.

use crate::db::{Ledger, LedgerStore};
use crate::error::{Result, SyncError};
use crate::models::{Activity, ActivityFilter, SyncOutcome, SyncRecord};
use crate::services::export::ExportStrategy;
use crate::services::komoot::{TourDestination, TourMetadata};
use crate::services::sport::SportMapper;
use crate::services::strava::ActivitySource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Validated options for one sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    /// Strava type allow-list (all types when `None`)
    pub activity_types: Option<BTreeSet<String>>,
    /// Sync exactly these activities; date and type filters are ignored
    pub activity_ids: Vec<u64>,
    pub exclude_ids: BTreeSet<u64>,
    /// Komoot sport used for every activity, already validated
    pub sport_override: Option<String>,
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn filter(&self) -> ActivityFilter {
        ActivityFilter {
            after: self.after,
            before: self.before,
            activity_types: self.activity_types.clone(),
        }
    }
}

/// Per-activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Pending,
    Exporting,
    Mapping,
    Uploading,
    Succeeded,
    Failed,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Pending => "pending",
            SyncStage::Exporting => "exporting",
            SyncStage::Mapping => "mapping",
            SyncStage::Uploading => "uploading",
            SyncStage::Succeeded => "succeeded",
            SyncStage::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed activity in a run.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityFailure {
    pub activity_id: u64,
    pub activity_name: Option<String>,
    /// Stage the activity was in when it failed
    pub stage: SyncStage,
    pub kind: String,
    pub error: String,
    /// A later run may succeed without changes
    pub retryable: bool,
}

impl ActivityFailure {
    fn new(
        activity_id: u64,
        activity_name: Option<String>,
        stage: SyncStage,
        error: &SyncError,
    ) -> Self {
        Self {
            activity_id,
            activity_name,
            stage,
            kind: error.kind().to_string(),
            error: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSuccess,
    Failure,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::PartialSuccess => 2,
            RunStatus::Failure => 1,
        }
    }
}

/// Counters and failures of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Already synced or excluded
    pub skipped: usize,
    pub dry_run: bool,
    /// Activities a dry run would have synced
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub would_sync: Vec<u64>,
    /// Explicit IDs a dry run could not fetch
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<u64>,
    pub failures: Vec<ActivityFailure>,
}

impl RunSummary {
    /// Success when nothing failed, partial success when something
    /// succeeded, failure otherwise.
    pub fn status(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else if self.succeeded > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Failure
        }
    }
}

/// Failure of a single activity, tagged with where it happened.
struct StageError {
    stage: SyncStage,
    sport: Option<String>,
    error: SyncError,
}

impl StageError {
    fn at(stage: SyncStage, sport: Option<String>) -> impl FnOnce(SyncError) -> Self {
        move |error| Self {
            stage,
            sport,
            error,
        }
    }
}

/// Drives activities from Strava to Komoot.
pub struct SyncOrchestrator<'a, S: ?Sized, D: ?Sized> {
    source: &'a S,
    destination: &'a D,
    mapper: SportMapper,
}

impl<'a, S, D> SyncOrchestrator<'a, S, D>
where
    S: ActivitySource + ?Sized,
    D: TourDestination + ?Sized,
{
    pub fn new(source: &'a S, destination: &'a D, mapper: SportMapper) -> Self {
        Self {
            source,
            destination,
            mapper,
        }
    }

    /// Run one sync batch against `ledger`.
    pub async fn run<L: LedgerStore>(
        &self,
        ledger: &mut Ledger<L>,
        options: &SyncOptions,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            dry_run: options.dry_run,
            ..Default::default()
        };

        let activities = self.candidates(options, &mut summary).await?;
        tracing::info!(
            candidates = activities.len(),
            dry_run = options.dry_run,
            "Starting sync"
        );

        for activity in &activities {
            let activity_id = activity.id;
            tracing::debug!(activity_id, stage = %SyncStage::Pending, "Considering activity");

            if options.exclude_ids.contains(&activity_id) {
                tracing::debug!(activity_id, "Excluded");
                summary.skipped += 1;
                continue;
            }
            if !ledger.should_sync(activity_id) {
                tracing::debug!(activity_id, "Already synced");
                summary.skipped += 1;
                continue;
            }
            if options.dry_run {
                tracing::info!(
                    activity_id,
                    name = %activity.name,
                    activity_type = %activity.activity_type,
                    "Would sync"
                );
                summary.would_sync.push(activity_id);
                continue;
            }

            summary.attempted += 1;
            let outcome = match self.sync_activity(activity, options).await {
                Ok((tour_id, sport)) => {
                    tracing::info!(
                        activity_id,
                        tour_id = %tour_id,
                        sport = %sport,
                        stage = %SyncStage::Succeeded,
                        "Activity synced"
                    );
                    summary.succeeded += 1;
                    SyncOutcome::Succeeded { tour_id, sport }
                }
                Err(failure) if failure.error.is_run_fatal() => {
                    tracing::error!(
                        activity_id,
                        stage = %failure.stage,
                        error = %failure.error,
                        "Aborting run"
                    );
                    return Err(failure.error);
                }
                Err(failure) => {
                    tracing::error!(
                        activity_id,
                        stage = %SyncStage::Failed,
                        failed_at = %failure.stage,
                        kind = failure.error.kind(),
                        retryable = failure.error.is_retryable(),
                        error = %failure.error,
                        "Activity failed"
                    );
                    summary.failed += 1;
                    summary.failures.push(ActivityFailure::new(
                        activity_id,
                        Some(activity.name.clone()),
                        failure.stage,
                        &failure.error,
                    ));
                    SyncOutcome::Failed {
                        sport: failure.sport,
                        error: failure.error.to_string(),
                    }
                }
            };

            let record =
                SyncRecord::from_outcome(activity_id, outcome, Utc::now()).with_activity(activity);
            ledger.upsert(record)?;
        }

        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Sync finished"
        );
        Ok(summary)
    }

    /// Activities to consider. Explicit IDs are fetched one by one, except
    /// excluded ones which are skipped unfetched. A fetch failure counts as a
    /// failed activity, or in a dry run is only reported.
    async fn candidates(
        &self,
        options: &SyncOptions,
        summary: &mut RunSummary,
    ) -> Result<Vec<Activity>> {
        if options.activity_ids.is_empty() {
            return self.source.list_activities(&options.filter()).await;
        }

        let mut activities = Vec::with_capacity(options.activity_ids.len());
        for &activity_id in &options.activity_ids {
            if options.exclude_ids.contains(&activity_id) {
                tracing::debug!(activity_id, "Excluded");
                summary.skipped += 1;
                continue;
            }
            match self.source.get_activity(activity_id).await {
                Ok(activity) => activities.push(activity),
                Err(e) if e.is_run_fatal() => return Err(e),
                Err(e) if options.dry_run => {
                    tracing::warn!(activity_id, error = %e, "Could not fetch activity");
                    summary.unavailable.push(activity_id);
                }
                Err(e) => {
                    tracing::error!(activity_id, error = %e, "Could not fetch activity");
                    summary.attempted += 1;
                    summary.failed += 1;
                    summary.failures.push(ActivityFailure::new(
                        activity_id,
                        None,
                        SyncStage::Pending,
                        &e,
                    ));
                }
            }
        }
        Ok(activities)
    }

    async fn sync_activity(
        &self,
        activity: &Activity,
        options: &SyncOptions,
    ) -> std::result::Result<(String, String), StageError> {
        let activity_id = activity.id;

        tracing::debug!(activity_id, stage = %SyncStage::Exporting, "Exporting track");
        let exported = ExportStrategy::new(self.source)
            .export(activity)
            .await
            .map_err(StageError::at(SyncStage::Exporting, None))?;

        tracing::debug!(activity_id, stage = %SyncStage::Mapping, "Mapping sport");
        let sport = self
            .mapper
            .map(&activity.activity_type, options.sport_override.as_deref())
            .map_err(StageError::at(SyncStage::Mapping, None))?;

        tracing::debug!(
            activity_id,
            stage = %SyncStage::Uploading,
            sport = %sport,
            points = exported.track.len(),
            origin = ?exported.origin,
            "Uploading tour"
        );
        let metadata = TourMetadata::for_activity(activity);
        let tour_id = self
            .destination
            .upload_tour(&exported.to_gpx(), &sport, &metadata)
            .await
            .map_err(StageError::at(SyncStage::Uploading, Some(sport.clone())))?;

        Ok((tour_id, sport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.status(), RunStatus::Success);

        summary.failed = 1;
        assert_eq!(summary.status(), RunStatus::Failure);
        assert_eq!(summary.status().exit_code(), 1);

        summary.succeeded = 2;
        assert_eq!(summary.status(), RunStatus::PartialSuccess);
        assert_eq!(summary.status().exit_code(), 2);
    }

    #[test]
    fn test_summary_serialization() {
        let summary = RunSummary {
            attempted: 1,
            failed: 1,
            failures: vec![ActivityFailure::new(
                3,
                Some("Indoor".to_string()),
                SyncStage::Exporting,
                &SyncError::NoGeodataAvailable { activity_id: 3 },
            )],
            ..Default::default()
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failures"][0]["stage"], "exporting");
        assert_eq!(json["failures"][0]["kind"], "no_geodata");
        assert_eq!(json["failures"][0]["retryable"], false);
        assert!(json.get("would_sync").is_none());
        assert!(json.get("unavailable").is_none());
    }

    #[test]
    fn test_transient_failure_is_retryable() {
        let failure = ActivityFailure::new(
            5,
            None,
            SyncStage::Uploading,
            &SyncError::Transient("Komoot returned HTTP 503".to_string()),
        );
        assert!(failure.retryable);
        assert_eq!(failure.kind, "transient");
    }

    #[test]
    fn test_options_filter() {
        let options = SyncOptions {
            activity_types: Some(["Ride".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let filter = options.filter();
        assert!(filter.activity_types.unwrap().contains("Ride"));
        assert!(filter.after.is_none());
    }
}
