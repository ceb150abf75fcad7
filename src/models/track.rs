// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! GPS track model: an ordered, non-empty sequence of timed points.

use chrono::{DateTime, Utc};
use geo::{BoundingRect, LineString, Rect};

/// One recorded position.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Meters above sea level
    pub elevation: Option<f64>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    pub power: Option<u16>,
}

impl TrackPoint {
    /// A bare position with no optional channels.
    pub fn new(time: DateTime<Utc>, lat: f64, lon: f64) -> Self {
        Self {
            time,
            lat,
            lon,
            elevation: None,
            heart_rate: None,
            cadence: None,
            power: None,
        }
    }
}

/// An exportable track.
///
/// Invariants: at least one point, timestamps non-decreasing, coordinates
/// inside WGS84 ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    name: Option<String>,
    activity_type: Option<String>,
    points: Vec<TrackPoint>,
}

impl Track {
    pub fn new(
        name: Option<String>,
        activity_type: Option<String>,
        points: Vec<TrackPoint>,
    ) -> Result<Self, TrackError> {
        if points.is_empty() {
            return Err(TrackError::Empty);
        }

        for (index, point) in points.iter().enumerate() {
            if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
                return Err(TrackError::InvalidCoordinate {
                    index,
                    lat: point.lat,
                    lon: point.lon,
                });
            }
        }

        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].time < pair[0].time)
        {
            return Err(TrackError::NonMonotonic { index: index + 1 });
        }

        Ok(Self {
            name,
            activity_type,
            points,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn activity_type(&self) -> Option<&str> {
        self.activity_type.as_deref()
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.points[0].time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.points[self.points.len() - 1].time
    }

    /// The path as a geo line string (x = lon, y = lat).
    pub fn line_string(&self) -> LineString<f64> {
        self.points.iter().map(|p| (p.lon, p.lat)).collect()
    }

    /// Bounding rectangle of all points.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.line_string().bounding_rect()
    }
}

/// Reasons a point sequence cannot form a track.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    #[error("track has no points")]
    Empty,

    #[error("timestamp goes backwards at point {index}")]
    NonMonotonic { index: usize },

    #[error("coordinate out of range at point {index}: ({lat}, {lon})")]
    InvalidCoordinate { index: usize, lat: f64, lon: f64 },
}
