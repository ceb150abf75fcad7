// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory fakes of the Strava and Komoot ports.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use strava_komoot_sync::error::{Result, SyncError};
use strava_komoot_sync::gpx;
use strava_komoot_sync::models::{Activity, ActivityFilter, ActivityStreams, Track, TrackPoint};
use strava_komoot_sync::services::{ActivitySource, TourDestination, TourMetadata};

/// What the fake returns for a native export request.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum ExportResponse {
    Gpx(Vec<u8>),
    NotAvailable,
    Transient,
    Auth,
}

/// Fake Strava account.
#[derive(Default)]
pub struct FakeSource {
    pub activities: Vec<Activity>,
    pub exports: HashMap<u64, ExportResponse>,
    pub streams: HashMap<u64, ActivityStreams>,
    pub export_calls: Mutex<Vec<u64>>,
    pub stream_calls: Mutex<Vec<u64>>,
}

#[allow(dead_code)]
impl FakeSource {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            ..Default::default()
        }
    }

    pub fn with_export(mut self, activity_id: u64, response: ExportResponse) -> Self {
        self.exports.insert(activity_id, response);
        self
    }

    pub fn with_streams(mut self, activity_id: u64, streams: ActivityStreams) -> Self {
        self.streams.insert(activity_id, streams);
        self
    }

    pub fn export_calls(&self) -> Vec<u64> {
        self.export_calls.lock().unwrap().clone()
    }

    pub fn stream_calls(&self) -> Vec<u64> {
        self.stream_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivitySource for FakeSource {
    async fn list_activities(&self, filter: &ActivityFilter) -> Result<Vec<Activity>> {
        Ok(self
            .activities
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    async fn get_activity(&self, activity_id: u64) -> Result<Activity> {
        self.activities
            .iter()
            .find(|a| a.id == activity_id)
            .cloned()
            .ok_or_else(|| SyncError::Source(format!("HTTP 404 Not Found: activity {activity_id}")))
    }

    async fn fetch_track_export(&self, activity_id: u64) -> Result<Option<Vec<u8>>> {
        self.export_calls.lock().unwrap().push(activity_id);
        match self.exports.get(&activity_id) {
            Some(ExportResponse::Gpx(bytes)) => Ok(Some(bytes.clone())),
            Some(ExportResponse::NotAvailable) | None => Ok(None),
            Some(ExportResponse::Transient) => {
                Err(SyncError::Transient("Strava returned HTTP 503".to_string()))
            }
            Some(ExportResponse::Auth) => {
                Err(SyncError::Auth("Strava returned HTTP 401".to_string()))
            }
        }
    }

    async fn fetch_streams(&self, activity_id: u64) -> Result<ActivityStreams> {
        self.stream_calls.lock().unwrap().push(activity_id);
        Ok(self.streams.get(&activity_id).cloned().unwrap_or_default())
    }
}

/// A recorded upload.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Upload {
    pub tour_id: String,
    pub gpx: Vec<u8>,
    pub sport: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
}

/// Fake Komoot account.
pub struct FakeDestination {
    next_id: AtomicU64,
    pub uploads: Mutex<Vec<Upload>>,
    /// Activity names whose upload is rejected
    pub reject_names: Vec<String>,
    /// Activity names whose upload fails with an auth error
    pub auth_fail_names: Vec<String>,
}

impl Default for FakeDestination {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            uploads: Mutex::new(Vec::new()),
            reject_names: Vec::new(),
            auth_fail_names: Vec::new(),
        }
    }
}

#[allow(dead_code)]
impl FakeDestination {
    /// Rejects uploads of the named activities.
    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            reject_names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Fails uploads of the named activities with an auth error.
    pub fn auth_failing(names: &[&str]) -> Self {
        Self {
            auth_fail_names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl TourDestination for FakeDestination {
    async fn upload_tour(
        &self,
        gpx: &[u8],
        sport: &str,
        metadata: &TourMetadata,
    ) -> Result<String> {
        if self.auth_fail_names.contains(&metadata.name) {
            return Err(SyncError::Auth("Komoot returned HTTP 401".to_string()));
        }
        if self.reject_names.contains(&metadata.name) {
            return Err(SyncError::Upload("HTTP 400 Bad Request: invalid gpx".to_string()));
        }

        let tour_id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.uploads.lock().unwrap().push(Upload {
            tour_id: tour_id.clone(),
            gpx: gpx.to_vec(),
            sport: sport.to_string(),
            name: metadata.name.clone(),
            started_at: metadata.started_at,
        });
        Ok(tour_id)
    }
}

/// Start time of activity `id`: one hour apart from 2024-05-01 08:00 UTC.
#[allow(dead_code)]
pub fn start_of(id: u64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::hours(id as i64)
}

#[allow(dead_code)]
pub fn activity(id: u64, activity_type: &str) -> Activity {
    Activity {
        id,
        name: format!("Activity {id}"),
        activity_type: activity_type.to_string(),
        start_date: start_of(id),
        elapsed_time_secs: 1800,
        distance_meters: 5000.0,
        bounds: None,
    }
}

/// `n` samples one second apart heading north-east.
#[allow(dead_code)]
pub fn streams(n: usize) -> ActivityStreams {
    ActivityStreams {
        time: (0..n as u32).collect(),
        latlng: (0..n)
            .map(|i| [37.40 + i as f64 * 0.0001, -122.10 + i as f64 * 0.0001])
            .collect(),
        altitude: Some((0..n).map(|i| 100.0 + i as f64).collect()),
        heartrate: Some((0..n).map(|i| 120 + i as u16).collect()),
        cadence: None,
        watts: None,
    }
}

/// A valid GPX document as Strava would export it.
#[allow(dead_code)]
pub fn export_gpx(id: u64, points: usize) -> Vec<u8> {
    let start = start_of(id);
    let points = (0..points)
        .map(|i| {
            TrackPoint::new(
                start + Duration::seconds(i as i64 * 5),
                37.30 + i as f64 * 0.001,
                -122.20,
            )
        })
        .collect();
    let track = Track::new(Some(format!("Activity {id}")), Some("Ride".to_string()), points)
        .unwrap();
    gpx::encode(&track)
}
