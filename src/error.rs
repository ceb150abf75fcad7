// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error taxonomy for the sync pipeline.
//!
//! Errors fall into three groups that drive how the orchestrator reacts:
//! - transient (retried by the HTTP layer, recorded as failed once exhausted)
//! - permanent per-activity (recorded as failed, batch continues)
//! - run-fatal (auth, ledger persistence, configuration; the run stops)

use crate::config::ConfigError;

/// Errors produced while syncing activities.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Timeouts, 5xx responses and rate-limit signals that survived retries.
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Expired or rejected credentials. Every later call would fail too.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Neither the direct export nor the streams contain any GPS points.
    #[error("No geodata available for activity {activity_id}")]
    NoGeodataAvailable { activity_id: u64 },

    /// The Source activity type has no Destination sport mapping.
    #[error("Unmapped sport type '{0}' (add it to sync.sport_mapping or pass --sport)")]
    UnmappedSportType(String),

    /// The Destination rejected the upload.
    #[error("Upload rejected: {0}")]
    Upload(String),

    /// Track data is present but unusable (e.g. missing time series).
    #[error("Malformed track: {0}")]
    MalformedTrack(String),

    /// Permanent Source-side failure (activity missing, bad payload).
    #[error("Strava API error: {0}")]
    Source(String),

    /// The ledger could not be persisted.
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether a later attempt may succeed without any change on our side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }

    /// Whether the error must stop the whole run instead of a single activity.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Auth(_) | SyncError::Ledger(_) | SyncError::Config(_)
        )
    }

    /// Short machine-readable label used in logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Transient(_) => "transient",
            SyncError::Auth(_) => "auth",
            SyncError::NoGeodataAvailable { .. } => "no_geodata",
            SyncError::UnmappedSportType(_) => "unmapped_sport",
            SyncError::Upload(_) => "upload",
            SyncError::MalformedTrack(_) => "malformed_track",
            SyncError::Source(_) => "source",
            SyncError::Ledger(_) => "ledger",
            SyncError::Config(_) => "config",
            SyncError::Internal(_) => "internal",
        }
    }
}

/// Result type alias for the sync pipeline.
pub type Result<T> = std::result::Result<T, SyncError>;
