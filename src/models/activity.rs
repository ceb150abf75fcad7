// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity model as consumed by the sync pipeline.

use chrono::{DateTime, Duration, Utc};
use geo::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A Strava activity. Read-only input to the sync pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Strava activity ID
    pub id: u64,
    /// Activity name/title
    pub name: String,
    /// Strava sport type tag (Ride, Run, MountainBikeRide, ...)
    pub activity_type: String,
    /// Start date/time
    pub start_date: DateTime<Utc>,
    /// Elapsed time in seconds
    pub elapsed_time_secs: u64,
    /// Distance in meters
    pub distance_meters: f64,
    /// Rough extent of the activity, if Strava has a summary polyline
    pub bounds: Option<ActivityBounds>,
}

impl Activity {
    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::try_from(self.elapsed_time_secs).unwrap_or(i64::MAX))
    }
}

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl From<Rect<f64>> for ActivityBounds {
    /// `Rect` uses x = longitude, y = latitude.
    fn from(rect: Rect<f64>) -> Self {
        Self {
            min_lat: rect.min().y,
            min_lon: rect.min().x,
            max_lat: rect.max().y,
            max_lon: rect.max().x,
        }
    }
}

/// Raw telemetry streams for one activity.
///
/// Series are expected to be index-aligned. Optional series are `None` when
/// the activity did not record them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityStreams {
    /// Seconds since activity start
    pub time: Vec<u32>,
    /// `[lat, lng]` pairs
    pub latlng: Vec<[f64; 2]>,
    /// Meters
    pub altitude: Option<Vec<f64>>,
    /// Beats per minute
    pub heartrate: Option<Vec<u16>>,
    /// RPM
    pub cadence: Option<Vec<u16>>,
    /// Watts; individual samples may be missing
    pub watts: Option<Vec<Option<u16>>>,
}

impl ActivityStreams {
    pub fn is_empty(&self) -> bool {
        self.latlng.is_empty()
    }
}

/// Criteria for enumerating activities on Strava.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Only activities starting at or after this instant
    pub after: Option<DateTime<Utc>>,
    /// Only activities starting strictly before this instant
    pub before: Option<DateTime<Utc>>,
    /// Only these Strava type tags (all types when `None`)
    pub activity_types: Option<BTreeSet<String>>,
}

impl ActivityFilter {
    /// Whether `activity` satisfies the date range and type allow-list.
    pub fn matches(&self, activity: &Activity) -> bool {
        if self.after.is_some_and(|after| activity.start_date < after) {
            return false;
        }
        if self.before.is_some_and(|before| activity.start_date >= before) {
            return false;
        }
        match &self.activity_types {
            Some(types) => types.contains(&activity.activity_type),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn activity(activity_type: &str, day: u32) -> Activity {
        Activity {
            id: 1,
            name: "Morning".to_string(),
            activity_type: activity_type.to_string(),
            start_date: Utc.with_ymd_and_hms(2024, 5, day, 8, 0, 0).unwrap(),
            elapsed_time_secs: 3600,
            distance_meters: 20_000.0,
            bounds: None,
        }
    }

    #[test]
    fn test_filter_date_range() {
        let filter = ActivityFilter {
            after: Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()),
            before: Some(Utc.with_ymd_and_hms(2024, 5, 4, 0, 0, 0).unwrap()),
            activity_types: None,
        };
        assert!(!filter.matches(&activity("Ride", 1)));
        assert!(filter.matches(&activity("Ride", 2)));
        assert!(filter.matches(&activity("Ride", 3)));
        assert!(!filter.matches(&activity("Ride", 4)));
    }

    #[test]
    fn test_filter_type_allow_list() {
        let filter = ActivityFilter {
            activity_types: Some(["Ride".to_string(), "Run".to_string()].into()),
            ..Default::default()
        };
        assert!(filter.matches(&activity("Ride", 1)));
        assert!(!filter.matches(&activity("Swim", 1)));
    }

    #[test]
    fn test_bounds_from_rect() {
        let rect = Rect::new((-122.2, 37.3), (-122.0, 37.5));
        let bounds = ActivityBounds::from(rect);
        assert_eq!(bounds.min_lat, 37.3);
        assert_eq!(bounds.max_lon, -122.0);
    }

    #[test]
    fn test_duration() {
        assert_eq!(activity("Ride", 1).duration(), Duration::hours(1));
    }
}
