// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GPX 1.1 codec for tracks.
//!
//! Decoding goes through the `gpx` crate. Encoding is done here because the
//! crate's writer has no support for per-point extensions, and Komoot reads
//! heart rate and cadence from the Garmin TrackPointExtension schema.

use crate::models::{Track, TrackError, TrackPoint};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::io::BufReader;

const CREATOR: &str = "strava-komoot-sync";
const GPX_NS: &str = "http://www.topografix.com/GPX/1/1";
const TPX_NS: &str = "http://www.garmin.com/xmlschemas/TrackPointExtension/v1";

/// Serialize a track as a GPX 1.1 document.
pub fn encode(track: &Track) -> Vec<u8> {
    let mut out = String::with_capacity(256 + track.len() * 160);

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(&format!(
        "<gpx version=\"1.1\" creator=\"{CREATOR}\" xmlns=\"{GPX_NS}\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xmlns:gpxtpx=\"{TPX_NS}\" \
         xsi:schemaLocation=\"{GPX_NS} http://www.topografix.com/GPX/1/1/gpx.xsd\">\n"
    ));

    out.push_str(" <metadata>\n");
    if let Some(name) = track.name() {
        out.push_str(&format!("  <name>{}</name>\n", escape(name)));
    }
    out.push_str(&format!(
        "  <time>{}</time>\n",
        format_utc_rfc3339(track.start_time())
    ));
    if let Some(bounds) = track.bounds() {
        out.push_str(&format!(
            "  <bounds minlat=\"{:.7}\" minlon=\"{:.7}\" maxlat=\"{:.7}\" maxlon=\"{:.7}\"/>\n",
            bounds.min().y,
            bounds.min().x,
            bounds.max().y,
            bounds.max().x
        ));
    }
    out.push_str(" </metadata>\n");

    out.push_str(" <trk>\n");
    if let Some(name) = track.name() {
        out.push_str(&format!("  <name>{}</name>\n", escape(name)));
    }
    if let Some(activity_type) = track.activity_type() {
        out.push_str(&format!("  <type>{}</type>\n", escape(activity_type)));
    }
    out.push_str("  <trkseg>\n");
    for point in track.points() {
        write_point(&mut out, point);
    }
    out.push_str("  </trkseg>\n");
    out.push_str(" </trk>\n");
    out.push_str("</gpx>\n");

    out.into_bytes()
}

fn write_point(out: &mut String, point: &TrackPoint) {
    out.push_str(&format!(
        "   <trkpt lat=\"{:.7}\" lon=\"{:.7}\">\n",
        point.lat, point.lon
    ));
    if let Some(ele) = point.elevation {
        out.push_str(&format!("    <ele>{ele:.1}</ele>\n"));
    }
    out.push_str(&format!(
        "    <time>{}</time>\n",
        format_utc_rfc3339(point.time)
    ));

    let has_tpx = point.heart_rate.is_some() || point.cadence.is_some();
    if has_tpx || point.power.is_some() {
        out.push_str("    <extensions>\n");
        if let Some(power) = point.power {
            out.push_str(&format!("     <power>{power}</power>\n"));
        }
        if has_tpx {
            out.push_str("     <gpxtpx:TrackPointExtension>\n");
            if let Some(hr) = point.heart_rate {
                out.push_str(&format!("      <gpxtpx:hr>{hr}</gpxtpx:hr>\n"));
            }
            if let Some(cad) = point.cadence {
                out.push_str(&format!("      <gpxtpx:cad>{cad}</gpxtpx:cad>\n"));
            }
            out.push_str("     </gpxtpx:TrackPointExtension>\n");
        }
        out.push_str("    </extensions>\n");
    }
    out.push_str("   </trkpt>\n");
}

/// Escape text for use in XML content and attribute values.
fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Parse a GPX document into a track.
///
/// All segments of all tracks are concatenated in document order. Every point
/// must carry a timestamp.
pub fn decode(bytes: &[u8]) -> Result<Track, GpxError> {
    let document =
        gpx::read(BufReader::new(bytes)).map_err(|e| GpxError::Parse(e.to_string()))?;

    let mut points = Vec::new();
    for trk in &document.tracks {
        for segment in &trk.segments {
            for waypoint in &segment.points {
                let time = waypoint
                    .time
                    .and_then(to_chrono)
                    .ok_or(GpxError::MissingTime {
                        index: points.len(),
                    })?;
                let position = waypoint.point();
                points.push(TrackPoint {
                    elevation: waypoint.elevation,
                    ..TrackPoint::new(time, position.y(), position.x())
                });
            }
        }
    }

    let first = document.tracks.first();
    let name = first.and_then(|t| t.name.clone());
    let activity_type = first.and_then(|t| t.type_.clone());

    Ok(Track::new(name, activity_type, points)?)
}

fn to_chrono(stamp: gpx::Time) -> Option<DateTime<Utc>> {
    let odt: time::OffsetDateTime = stamp.into();
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

/// GPX decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum GpxError {
    #[error("invalid GPX: {0}")]
    Parse(String),

    #[error("track point {index} has no timestamp")]
    MissingTime { index: usize },

    #[error(transparent)]
    Track(#[from] TrackError),
}
