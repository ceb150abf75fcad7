// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - Strava and Komoot clients and the sync pipeline.

pub mod export;
pub mod http;
pub mod komoot;
pub mod sport;
pub mod strava;
pub mod sync;

pub use export::{ExportStrategy, ExportedTrack, TrackOrigin};
pub use komoot::{KomootClient, TourDestination, TourMetadata};
pub use sport::SportMapper;
pub use strava::{ActivitySource, StravaClient};
pub use sync::{RunStatus, RunSummary, SyncOptions, SyncOrchestrator, SyncStage};
