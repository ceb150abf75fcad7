// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-activity sync state stored in the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Activity;

/// Latest sync status of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Succeeded,
    Failed,
}

/// Ledger record for one Strava activity (latest attempt only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Strava activity ID
    pub source_activity_id: u64,
    /// Komoot tour ID; `None` when the attempt failed
    pub destination_tour_id: Option<String>,
    /// When the attempt finished
    pub synced_at: DateTime<Utc>,
    pub status: SyncStatus,
    /// Komoot sport tag the tour was (or would have been) uploaded with
    pub sport_type_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_name: Option<String>,
    /// Strava type tag at the time of the attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a single sync attempt, as handed to the ledger.
///
/// A success always carries a tour ID, so a `Succeeded` record can never
/// lack one.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Succeeded {
        tour_id: String,
        sport: String,
    },
    Failed {
        sport: Option<String>,
        error: String,
    },
}

impl SyncRecord {
    /// Build the record for `outcome` of activity `activity_id`.
    pub fn from_outcome(activity_id: u64, outcome: SyncOutcome, synced_at: DateTime<Utc>) -> Self {
        let (destination_tour_id, status, sport_type_used, error) = match outcome {
            SyncOutcome::Succeeded { tour_id, sport } => {
                (Some(tour_id), SyncStatus::Succeeded, Some(sport), None)
            }
            SyncOutcome::Failed { sport, error } => (None, SyncStatus::Failed, sport, Some(error)),
        };

        Self {
            source_activity_id: activity_id,
            destination_tour_id,
            synced_at,
            status,
            sport_type_used,
            activity_name: None,
            source_type: None,
            error,
        }
    }

    /// Attach descriptive fields from the Strava activity.
    pub fn with_activity(mut self, activity: &Activity) -> Self {
        self.activity_name = Some(activity.name.clone());
        self.source_type = Some(activity.activity_type.clone());
        self
    }

    /// A succeeded record must name its tour.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            SyncStatus::Succeeded => self.destination_tour_id.is_some(),
            SyncStatus::Failed => true,
        }
    }
}
