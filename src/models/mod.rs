// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod sync_record;
pub mod track;

pub use activity::{Activity, ActivityBounds, ActivityFilter, ActivityStreams};
pub use sync_record::{SyncOutcome, SyncRecord, SyncStatus};
pub use track::{Track, TrackError, TrackPoint};
