// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Track acquisition for an activity.
//!
//! 1. Ask Strava for its native GPX export and use it if it parses to a
//!    non-empty track.
//! 2. Otherwise rebuild the track from raw streams, zipping the series by
//!    index and anchoring time offsets at the activity start.
//! 3. No GPS points either way -> `NoGeodataAvailable`.

use crate::error::{Result, SyncError};
use crate::gpx;
use crate::models::{Activity, ActivityStreams, Track, TrackError, TrackPoint};
use crate::services::strava::ActivitySource;
use chrono::Duration;

/// Which path produced a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    DirectExport,
    Streams,
}

/// A track ready for upload.
#[derive(Debug, Clone)]
pub struct ExportedTrack {
    pub track: Track,
    pub origin: TrackOrigin,
    /// The original document for direct exports
    original: Option<Vec<u8>>,
}

impl ExportedTrack {
    /// GPX bytes to upload. Direct exports are passed through unchanged.
    pub fn to_gpx(&self) -> Vec<u8> {
        match &self.original {
            Some(bytes) => bytes.clone(),
            None => gpx::encode(&self.track),
        }
    }
}

/// Produces tracks from an activity source.
pub struct ExportStrategy<'a, S: ActivitySource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ActivitySource + ?Sized> ExportStrategy<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Export the track of `activity`, falling back to stream reconstruction.
    pub async fn export(&self, activity: &Activity) -> Result<ExportedTrack> {
        if let Some(exported) = self.try_direct(activity).await? {
            return Ok(exported);
        }

        tracing::info!(activity_id = activity.id, "Using activity streams to generate GPX");
        let streams = self.source.fetch_streams(activity.id).await?;
        let track = reconstruct(activity, &streams)?;

        Ok(ExportedTrack {
            track,
            origin: TrackOrigin::Streams,
            original: None,
        })
    }

    /// `Ok(None)` means "fall back"; only run-fatal errors are returned.
    async fn try_direct(&self, activity: &Activity) -> Result<Option<ExportedTrack>> {
        let activity_id = activity.id;

        let bytes = match self.source.fetch_track_export(activity_id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(activity_id, "No native export available");
                return Ok(None);
            }
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(activity_id, error = %e, "Native export failed, falling back");
                return Ok(None);
            }
        };

        match gpx::decode(&bytes) {
            Ok(track) => {
                tracing::debug!(activity_id, points = track.len(), "Using native GPX export");
                Ok(Some(ExportedTrack {
                    track,
                    origin: TrackOrigin::DirectExport,
                    original: Some(bytes),
                }))
            }
            Err(e) => {
                tracing::warn!(activity_id, error = %e, "Native export unusable, falling back");
                Ok(None)
            }
        }
    }
}

/// Rebuild a track from index-aligned streams.
///
/// Mismatched series are truncated to the shortest one. Optional series that
/// are absent or empty do not limit the length.
pub fn reconstruct(activity: &Activity, streams: &ActivityStreams) -> Result<Track> {
    let activity_id = activity.id;

    if streams.latlng.is_empty() {
        return Err(SyncError::NoGeodataAvailable { activity_id });
    }
    if streams.time.is_empty() {
        return Err(SyncError::MalformedTrack(format!(
            "activity {activity_id} has positions but no time stream"
        )));
    }

    let mut lengths = vec![("time", streams.time.len()), ("latlng", streams.latlng.len())];
    if let Some(s) = streams.altitude.as_ref().filter(|s| !s.is_empty()) {
        lengths.push(("altitude", s.len()));
    }
    if let Some(s) = streams.heartrate.as_ref().filter(|s| !s.is_empty()) {
        lengths.push(("heartrate", s.len()));
    }
    if let Some(s) = streams.cadence.as_ref().filter(|s| !s.is_empty()) {
        lengths.push(("cadence", s.len()));
    }
    if let Some(s) = streams.watts.as_ref().filter(|s| !s.is_empty()) {
        lengths.push(("watts", s.len()));
    }

    let shortest = lengths.iter().map(|(_, len)| *len).min().unwrap_or(0);
    let longest = lengths.iter().map(|(_, len)| *len).max().unwrap_or(0);
    if shortest != longest {
        tracing::warn!(
            activity_id,
            lengths = ?lengths,
            kept = shortest,
            dropped = longest - shortest,
            "Stream lengths differ, truncating to shortest"
        );
    }

    let points: Vec<TrackPoint> = (0..shortest)
        .map(|i| {
            let [lat, lon] = streams.latlng[i];
            let time = activity.start_date + Duration::seconds(i64::from(streams.time[i]));
            TrackPoint {
                elevation: sample(&streams.altitude, i),
                heart_rate: sample(&streams.heartrate, i),
                cadence: sample(&streams.cadence, i),
                power: streams
                    .watts
                    .as_ref()
                    .and_then(|w| w.get(i).copied().flatten()),
                ..TrackPoint::new(time, lat, lon)
            }
        })
        .collect();

    Track::new(
        Some(activity.name.clone()),
        Some(activity.activity_type.clone()),
        points,
    )
    .map_err(|e| match e {
        TrackError::Empty => SyncError::NoGeodataAvailable { activity_id },
        other => SyncError::MalformedTrack(format!("activity {activity_id}: {other}")),
    })
}

fn sample<T: Copy>(series: &Option<Vec<T>>, index: usize) -> Option<T> {
    series.as_ref().and_then(|s| s.get(index).copied())
}
