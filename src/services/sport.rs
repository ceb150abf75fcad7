// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava activity type -> Komoot sport mapping.
//!
//! An unknown Strava type is an error. There is no fallback sport.

use crate::error::{Result, SyncError};
use std::collections::BTreeMap;

/// Built-in mapping table.
pub const SPORT_TABLE: &[(&str, &str)] = &[
    ("Ride", "touringbicycle"),
    ("VirtualRide", "touringbicycle"),
    ("EBikeRide", "e_touringbicycle"),
    ("MountainBikeRide", "mtb"),
    ("GravelRide", "mtb"),
    ("RoadBike", "racebike"),
    ("Run", "jogging"),
    ("TrailRun", "jogging"),
    ("Walk", "hiking"),
    ("Hike", "hiking"),
];

/// Komoot sport tags accepted for overrides and configured mappings.
pub const KNOWN_SPORTS: &[&str] = &[
    "hike",
    "hiking",
    "jogging",
    "touringbicycle",
    "e_touringbicycle",
    "citybike",
    "mtb",
    "e_mtb",
    "mtb_easy",
    "e_mtb_easy",
    "mtb_advanced",
    "e_mtb_advanced",
    "downhillbike",
    "racebike",
    "e_racebike",
    "mountaineering",
    "climbing",
    "nordic",
    "nordicwalking",
    "skitour",
    "skialpin",
    "skaling",
    "snowshoe",
    "sled",
    "unicycle",
    "other",
];

/// Whether `sport` is a Komoot sport tag.
pub fn is_known_sport(sport: &str) -> bool {
    KNOWN_SPORTS.contains(&sport)
}

/// Maps Strava type tags to Komoot sport tags.
#[derive(Debug, Clone)]
pub struct SportMapper {
    table: BTreeMap<String, String>,
}

impl Default for SportMapper {
    fn default() -> Self {
        Self {
            table: SPORT_TABLE
                .iter()
                .map(|(source, dest)| (source.to_string(), dest.to_string()))
                .collect(),
        }
    }
}

impl SportMapper {
    /// Built-in table extended (or partly replaced) by user entries.
    /// Entries are expected to be validated already.
    pub fn with_entries(entries: &BTreeMap<String, String>) -> Self {
        let mut mapper = Self::default();
        for (source, dest) in entries {
            mapper.table.insert(source.clone(), dest.clone());
        }
        mapper
    }

    /// Resolve the Komoot sport for `source_type`.
    ///
    /// An override wins unconditionally and is returned verbatim.
    pub fn map(&self, source_type: &str, override_sport: Option<&str>) -> Result<String> {
        if let Some(sport) = override_sport {
            return Ok(sport.to_string());
        }

        self.table
            .get(source_type)
            .cloned()
            .ok_or_else(|| SyncError::UnmappedSportType(source_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entries() {
        let mapper = SportMapper::default();
        for (source, dest) in SPORT_TABLE {
            assert_eq!(mapper.map(source, None).unwrap(), *dest);
        }
        assert_eq!(mapper.map("Ride", None).unwrap(), "touringbicycle");
        assert_eq!(mapper.map("Run", None).unwrap(), "jogging");
    }

    #[test]
    fn test_table_targets_are_known_sports() {
        for (_, dest) in SPORT_TABLE {
            assert!(is_known_sport(dest), "{dest} is not a Komoot sport");
        }
    }

    #[test]
    fn test_override_wins() {
        let mapper = SportMapper::default();
        for tag in ["Ride", "Run", "Swim", "UnknownFutureType", ""] {
            assert_eq!(mapper.map(tag, Some("mtb")).unwrap(), "mtb");
        }
    }

    #[test]
    fn test_unknown_type_is_error() {
        let mapper = SportMapper::default();
        match mapper.map("UnknownFutureType", None) {
            Err(SyncError::UnmappedSportType(tag)) => assert_eq!(tag, "UnknownFutureType"),
            other => panic!("expected UnmappedSportType, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mapper = SportMapper::default();
        assert!(mapper.map("ride", None).is_err());
    }

    #[test]
    fn test_user_entries_extend_and_replace() {
        let mut entries = BTreeMap::new();
        entries.insert("Ride".to_string(), "racebike".to_string());
        entries.insert("Snowshoe".to_string(), "snowshoe".to_string());

        let mapper = SportMapper::with_entries(&entries);
        assert_eq!(mapper.map("Ride", None).unwrap(), "racebike");
        assert_eq!(mapper.map("Snowshoe", None).unwrap(), "snowshoe");
        assert_eq!(mapper.map("Run", None).unwrap(), "jogging");
    }
}
