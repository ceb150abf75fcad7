// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ledger persistence: file round trips, compatibility and recovery.

use chrono::{Duration, TimeZone, Utc};
use strava_komoot_sync::db::{JsonFileStore, Ledger, MemoryStore};
use strava_komoot_sync::models::{SyncOutcome, SyncRecord, SyncStatus};
use tempfile::TempDir;

fn sample_records(n: u64) -> Vec<SyncRecord> {
    let base = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap();
    (1..=n)
        .map(|id| {
            let outcome = if id % 3 == 0 {
                SyncOutcome::Failed {
                    sport: Some("hiking".to_string()),
                    error: format!("Upload rejected: activity {id}"),
                }
            } else {
                SyncOutcome::Succeeded {
                    tour_id: (9000 + id).to_string(),
                    sport: "touringbicycle".to_string(),
                }
            };
            let mut record =
                SyncRecord::from_outcome(id, outcome, base + Duration::minutes(id as i64));
            if id % 2 == 0 {
                record.activity_name = Some(format!("Ride \"{id}\" & more"));
                record.source_type = Some("Ride".to_string());
            }
            record
        })
        .collect()
}

#[test]
fn test_file_round_trip_preserves_all_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sync_ledger.json");

    let records = sample_records(12);
    let mut ledger = Ledger::load(JsonFileStore::new(&path));
    for record in &records {
        ledger.upsert(record.clone()).unwrap();
    }

    let reloaded = Ledger::load(JsonFileStore::new(&path));
    assert_eq!(reloaded.len(), records.len());
    for record in &records {
        assert_eq!(reloaded.get(record.source_activity_id), Some(record));
    }
}

#[test]
fn test_every_outcome_is_flushed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    let mut ledger = Ledger::load(JsonFileStore::new(&path));

    for id in 1..=3u64 {
        ledger
            .record_outcome(
                id,
                SyncOutcome::Succeeded {
                    tour_id: format!("t{id}"),
                    sport: "jogging".to_string(),
                },
            )
            .unwrap();

        let on_disk = Ledger::load(JsonFileStore::new(&path));
        assert_eq!(on_disk.len() as u64, id);
        assert!(!on_disk.should_sync(id));
    }
}

#[test]
fn test_corrupt_file_loads_as_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, "{\"version\": 1, \"records\": {\"1\": tru").unwrap();

    let mut ledger = Ledger::load(JsonFileStore::new(&path));
    assert!(ledger.is_empty());
    assert!(ledger.should_sync(1));

    // The next flush replaces the corrupt file
    ledger
        .record_outcome(
            1,
            SyncOutcome::Failed {
                sport: None,
                error: "boom".to_string(),
            },
        )
        .unwrap();
    assert_eq!(Ledger::load(JsonFileStore::new(&path)).len(), 1);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let json = r#"{
        "version": 1,
        "generated_by": "some future release",
        "records": {
            "42": {
                "source_activity_id": 42,
                "destination_tour_id": "777",
                "synced_at": "2024-05-01T10:00:00Z",
                "status": "succeeded",
                "sport_type_used": "jogging",
                "upload_duration_ms": 1234,
                "labels": ["a", "b"]
            }
        }
    }"#;

    let ledger = Ledger::load(MemoryStore::with_contents(json));
    let record = ledger.get(42).unwrap();
    assert_eq!(record.status, SyncStatus::Succeeded);
    assert_eq!(record.destination_tour_id.as_deref(), Some("777"));
    assert!(!ledger.should_sync(42));
}

#[test]
fn test_legacy_sync_log_latest_entry_wins() {
    let json = r#"[
        {"strava_activity_id": 100, "activity_name": "Commute", "komoot_tour_id": null,
         "komoot_sport": "touringbicycle", "status": "failed", "error": "timeout",
         "timestamp": "2024-04-01T08:00:00.000000"},
        {"strava_activity_id": 100, "activity_name": "Commute", "komoot_tour_id": 5551,
         "komoot_sport": "touringbicycle", "status": "success",
         "timestamp": "2024-04-02T08:00:00.000000"},
        {"strava_activity_id": "200", "komoot_tour_id": "6661", "komoot_sport": "hiking",
         "status": "success", "timestamp": "2024-04-03T08:00:00+00:00"},
        {"strava_activity_id": 300, "komoot_sport": "jogging", "status": "success",
         "timestamp": "2024-04-04T08:00:00"},
        {"komoot_tour_id": 1}
    ]"#;

    let ledger = Ledger::load(MemoryStore::with_contents(json));
    assert_eq!(ledger.len(), 3);

    let commute = ledger.get(100).unwrap();
    assert_eq!(commute.status, SyncStatus::Succeeded);
    assert_eq!(commute.destination_tour_id.as_deref(), Some("5551"));
    assert_eq!(commute.activity_name.as_deref(), Some("Commute"));
    assert_eq!(
        commute.synced_at,
        Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap()
    );

    assert_eq!(ledger.get(200).unwrap().destination_tour_id.as_deref(), Some("6661"));

    // "success" without a tour id cannot be trusted
    let no_tour = ledger.get(300).unwrap();
    assert_eq!(no_tour.status, SyncStatus::Failed);
    assert!(ledger.should_sync(300));
    assert!(!ledger.should_sync(100));
}

#[test]
fn test_legacy_log_is_rewritten_in_current_format() {
    let json = r#"[{"strava_activity_id": 1, "komoot_tour_id": 2, "komoot_sport": "mtb",
                    "status": "success", "timestamp": "2024-04-02T08:00:00"}]"#;
    let ledger = Ledger::load(MemoryStore::with_contents(json));
    ledger.flush().unwrap();

    let saved: serde_json::Value =
        serde_json::from_slice(&ledger.store().contents().unwrap()).unwrap();
    assert_eq!(saved["version"], 1);
    assert_eq!(saved["records"]["1"]["status"], "succeeded");
    assert_eq!(saved["records"]["1"]["destination_tour_id"], "2");
}
