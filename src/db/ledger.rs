// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync ledger: the latest sync outcome per Strava activity.
//!
//! The ledger is loaded once per run and written back through its
//! [`LedgerStore`] after every recorded outcome, so a crash loses at most the
//! activity in flight.

use crate::error::{Result, SyncError};
use crate::models::{SyncOutcome, SyncRecord, SyncStatus};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LEDGER_VERSION: u32 = 1;

/// Byte-level persistence for the ledger document.
pub trait LedgerStore: Send + Sync {
    /// Read the stored document; `Ok(None)` if nothing was stored yet.
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored document.
    fn store(&self, bytes: &[u8]) -> Result<()>;

    /// Human-readable location for log messages.
    fn describe(&self) -> String;
}

/// Ledger stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Ledger(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn store(&self, bytes: &[u8]) -> Result<()> {
        let io_err = |path: &Path, e: std::io::Error| {
            SyncError::Ledger(format!("Failed to write {}: {e}", path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        // Temp file in the same directory so the rename stays on one filesystem
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = std::fs::File::create(&temp_path).map_err(|e| io_err(&temp_path, e))?;
        file.write_all(bytes).map_err(|e| io_err(&temp_path, e))?;
        file.sync_all().map_err(|e| io_err(&temp_path, e))?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| io_err(&self.path, e))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(bytes.into())),
        }
    }

    /// Current stored document.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().ok().and_then(|d| d.clone())
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents())
    }

    fn store(&self, bytes: &[u8]) -> Result<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| SyncError::Ledger("memory store lock poisoned".to_string()))?;
        *data = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// On-disk document.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    records: BTreeMap<u64, SyncRecord>,
}

fn default_version() -> u32 {
    LEDGER_VERSION
}

/// Entry of the older append-only sync log (a JSON array).
#[derive(Debug, Deserialize)]
struct LegacyEntry {
    strava_activity_id: serde_json::Value,
    #[serde(default)]
    komoot_tour_id: Option<serde_json::Value>,
    #[serde(default)]
    komoot_sport: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    activity_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl LegacyEntry {
    fn into_record(self) -> Option<SyncRecord> {
        let source_activity_id = value_as_u64(&self.strava_activity_id)?;
        let tour_id = self.komoot_tour_id.as_ref().and_then(value_as_string);
        let synced_at = self
            .timestamp
            .as_deref()
            .and_then(parse_legacy_timestamp)
            .unwrap_or(DateTime::UNIX_EPOCH);

        let succeeded = self.status.as_deref() == Some("success") && tour_id.is_some();

        Some(SyncRecord {
            source_activity_id,
            destination_tour_id: if succeeded { tour_id } else { None },
            synced_at,
            status: if succeeded {
                SyncStatus::Succeeded
            } else {
                SyncStatus::Failed
            },
            sport_type_used: self.komoot_sport,
            activity_name: self.activity_name,
            source_type: None,
            error: if succeeded { None } else { self.error },
        })
    }
}

fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Legacy timestamps are RFC 3339 or naive ISO 8601 (taken as UTC).
fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse a stored document, accepting both the current and the legacy format.
fn parse_document(bytes: &[u8]) -> std::result::Result<BTreeMap<u64, SyncRecord>, String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

    match value {
        serde_json::Value::Object(_) => {
            let doc: LedgerDocument = serde_json::from_value(value).map_err(|e| e.to_string())?;
            if doc.version > LEDGER_VERSION {
                tracing::warn!(version = doc.version, "Ledger written by a newer version");
            }
            Ok(doc
                .records
                .into_values()
                .map(|mut record| {
                    if !record.is_consistent() {
                        record.status = SyncStatus::Failed;
                    }
                    (record.source_activity_id, record)
                })
                .collect())
        }
        serde_json::Value::Array(entries) => {
            let mut records = BTreeMap::new();
            let mut skipped = 0usize;
            for entry in entries {
                match serde_json::from_value::<LegacyEntry>(entry)
                    .ok()
                    .and_then(LegacyEntry::into_record)
                {
                    Some(record) => {
                        records.insert(record.source_activity_id, record);
                    }
                    None => skipped += 1,
                }
            }
            tracing::info!(
                records = records.len(),
                skipped,
                "Imported legacy sync log"
            );
            Ok(records)
        }
        _ => Err("expected a JSON object or array".to_string()),
    }
}

/// In-memory ledger backed by a [`LedgerStore`].
pub struct Ledger<S: LedgerStore> {
    store: S,
    records: BTreeMap<u64, SyncRecord>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Load the ledger. Unreadable or corrupt contents yield an empty ledger.
    pub fn load(store: S) -> Self {
        let records = match store.load() {
            Ok(Some(bytes)) => match parse_document(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(
                        location = %store.describe(),
                        error = %e,
                        "Ledger is corrupt, starting with an empty ledger"
                    );
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(
                    location = %store.describe(),
                    error = %e,
                    "Ledger is unreadable, starting with an empty ledger"
                );
                BTreeMap::new()
            }
        };

        tracing::debug!(records = records.len(), location = %store.describe(), "Ledger loaded");
        Self { store, records }
    }

    /// Whether `activity_id` still needs uploading.
    pub fn should_sync(&self, activity_id: u64) -> bool {
        match self.records.get(&activity_id) {
            Some(record) => record.status == SyncStatus::Failed,
            None => true,
        }
    }

    /// Record `outcome` for `activity_id`, replacing any previous record.
    pub fn record_outcome(&mut self, activity_id: u64, outcome: SyncOutcome) -> Result<()> {
        self.upsert(SyncRecord::from_outcome(activity_id, outcome, Utc::now()))
    }

    /// Insert or replace a record and flush.
    pub fn upsert(&mut self, mut record: SyncRecord) -> Result<()> {
        if !record.is_consistent() {
            record.status = SyncStatus::Failed;
        }
        self.records.insert(record.source_activity_id, record);
        self.flush()
    }

    /// Write all records to the store.
    pub fn flush(&self) -> Result<()> {
        let doc = LedgerDocumentRef {
            version: LEDGER_VERSION,
            records: &self.records,
        };
        let bytes = serde_json::to_vec_pretty(&doc)
            .map_err(|e| SyncError::Ledger(format!("Failed to serialize ledger: {e}")))?;
        self.store.store(&bytes)
    }

    pub fn get(&self, activity_id: u64) -> Option<&SyncRecord> {
        self.records.get(&activity_id)
    }

    /// Records ordered by activity ID.
    pub fn records(&self) -> impl Iterator<Item = &SyncRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
    version: u32,
    records: &'a BTreeMap<u64, SyncRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn succeeded(tour: &str) -> SyncOutcome {
        SyncOutcome::Succeeded {
            tour_id: tour.to_string(),
            sport: "jogging".to_string(),
        }
    }

    fn failed() -> SyncOutcome {
        SyncOutcome::Failed {
            sport: None,
            error: "no geodata".to_string(),
        }
    }

    #[test]
    fn test_should_sync() {
        let mut ledger = Ledger::load(MemoryStore::new());
        assert!(ledger.should_sync(1));

        ledger.record_outcome(1, failed()).unwrap();
        assert!(ledger.should_sync(1));

        ledger.record_outcome(1, succeeded("100")).unwrap();
        assert!(!ledger.should_sync(1));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ledger.json");

        let mut ledger = Ledger::load(JsonFileStore::new(&path));
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let record = SyncRecord::from_outcome(5, succeeded("55"), at);
        ledger.upsert(record.clone()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = Ledger::load(JsonFileStore::new(&path));
        assert_eq!(reloaded.get(5), Some(&record));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::load(JsonFileStore::new(dir.path().join("none.json")));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_corrupt_document_is_empty() {
        let ledger = Ledger::load(MemoryStore::with_contents("{not json"));
        assert!(ledger.is_empty());

        let ledger = Ledger::load(MemoryStore::with_contents("42"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_inconsistent_success_downgraded() {
        let json = r#"{"version": 1, "records": {"9": {
            "source_activity_id": 9, "destination_tour_id": null,
            "synced_at": "2024-01-01T00:00:00Z", "status": "succeeded",
            "sport_type_used": "hiking"}}}"#;
        let ledger = Ledger::load(MemoryStore::with_contents(json));
        assert_eq!(ledger.get(9).unwrap().status, SyncStatus::Failed);
        assert!(ledger.should_sync(9));
    }

    #[test]
    fn test_legacy_timestamp_formats() {
        assert_eq!(
            parse_legacy_timestamp("2024-03-02T10:11:12.123456"),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 10, 11, 12).unwrap()
                + chrono::Duration::microseconds(123456))
        );
        assert_eq!(
            parse_legacy_timestamp("2024-03-02T10:11:12+01:00"),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 9, 11, 12).unwrap())
        );
        assert_eq!(parse_legacy_timestamp("yesterday"), None);
    }
}
