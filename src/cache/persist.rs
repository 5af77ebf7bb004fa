//! Versioned on-disk cache snapshot.
//!
//! `shutdown()` writes the live (non-expired) contents of both caches to
//! a single JSON file; the next startup readmits whatever is still within
//! its TTL. The schema is explicit and versioned so a format change
//! across releases produces a clean empty start instead of a corrupt
//! load, and each record is decoded independently so one unreadable
//! record costs that record, not the whole file.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

use super::response::CachedPayload;

/// Bumped whenever a record shape changes. Snapshots from another
/// version are discarded wholesale.
const SNAPSHOT_VERSION: u32 = 1;

/// In-memory form of a snapshot, exchanged with the two caches.
pub(crate) struct Snapshot {
    pub entries: Vec<(String, CachedPayload, SystemTime)>,
    pub formats: Vec<(String, BTreeSet<String>, SystemTime)>,
    pub locations: Vec<(String, Vec<String>, SystemTime)>,
}

#[derive(Serialize, Deserialize)]
struct ValueRecord {
    key: String,
    stored_at: u64,
    payload: CachedPayload,
}

#[derive(Serialize, Deserialize)]
struct FormatRecord {
    generation: String,
    stored_at: u64,
    formats: BTreeSet<String>,
}

#[derive(Serialize, Deserialize)]
struct LocationRecord {
    key: String,
    stored_at: u64,
    tiers: Vec<String>,
}

#[derive(Serialize)]
struct FileSnapshot {
    version: u32,
    entries: Vec<ValueRecord>,
    formats: Vec<FormatRecord>,
    locations: Vec<LocationRecord>,
}

/// Records are held as raw JSON here so each one can be decoded on its
/// own; a malformed record is skipped rather than failing the load.
#[derive(Deserialize)]
struct RawFileSnapshot {
    version: u32,
    #[serde(default)]
    entries: Vec<serde_json::Value>,
    #[serde(default)]
    formats: Vec<serde_json::Value>,
    #[serde(default)]
    locations: Vec<serde_json::Value>,
}

/// Default snapshot location: `<platform cache dir>/rotom/cache.json`.
pub(crate) fn default_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rotom")
        .join("cache.json")
}

/// Write a snapshot, creating parent directories as needed.
pub(crate) fn save(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let file = FileSnapshot {
        version: SNAPSHOT_VERSION,
        entries: snapshot
            .entries
            .iter()
            .map(|(key, payload, stored_at)| ValueRecord {
                key: key.clone(),
                stored_at: to_unix(*stored_at),
                payload: payload.clone(),
            })
            .collect(),
        formats: snapshot
            .formats
            .iter()
            .map(|(generation, formats, stored_at)| FormatRecord {
                generation: generation.clone(),
                stored_at: to_unix(*stored_at),
                formats: formats.clone(),
            })
            .collect(),
        locations: snapshot
            .locations
            .iter()
            .map(|(key, tiers, stored_at)| LocationRecord {
                key: key.clone(),
                stored_at: to_unix(*stored_at),
                tiers: tiers.clone(),
            })
            .collect(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec(&file)?)?;
    Ok(())
}

/// Read a snapshot back. Returns `Ok(None)` when there is no file or the
/// version doesn't match; malformed records inside a readable file are
/// skipped with a warning. TTL filtering happens in the caches' `absorb`.
pub(crate) fn load(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw: RawFileSnapshot = serde_json::from_slice(&fs::read(path)?)?;
    if raw.version != SNAPSHOT_VERSION {
        warn!(
            found = raw.version,
            expected = SNAPSHOT_VERSION,
            "cache snapshot version mismatch, starting empty"
        );
        return Ok(None);
    }

    let mut skipped = 0usize;
    let entries = decode_records::<ValueRecord>(raw.entries, &mut skipped)
        .into_iter()
        .map(|r| (r.key, r.payload, from_unix(r.stored_at)))
        .collect();
    let formats = decode_records::<FormatRecord>(raw.formats, &mut skipped)
        .into_iter()
        .map(|r| (r.generation, r.formats, from_unix(r.stored_at)))
        .collect();
    let locations = decode_records::<LocationRecord>(raw.locations, &mut skipped)
        .into_iter()
        .map(|r| (r.key, r.tiers, from_unix(r.stored_at)))
        .collect();
    if skipped > 0 {
        warn!(skipped, "skipped unreadable cache snapshot records");
    }

    Ok(Some(Snapshot {
        entries,
        formats,
        locations,
    }))
}

fn decode_records<T: serde::de::DeserializeOwned>(
    raw: Vec<serde_json::Value>,
    skipped: &mut usize,
) -> Vec<T> {
    let mut out = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value(value) {
            Ok(record) => out.push(record),
            Err(_) => *skipped += 1,
        }
    }
    out
}

fn to_unix(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn from_unix(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample_snapshot() -> Snapshot {
        let now = SystemTime::now();
        Snapshot {
            entries: vec![(
                "gen9ou:garchomp".into(),
                CachedPayload::Sets(Arc::new(serde_json::json!({"moves": ["earthquake"]}))),
                now,
            )],
            formats: vec![(
                "gen9".into(),
                ["ou".to_string(), "ubers".to_string()].into_iter().collect(),
                now,
            )],
            locations: vec![("gen9:garchomp".into(), vec!["ubers".into()], now)],
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.json");

        save(&path, &sample_snapshot()).expect("save");
        let loaded = load(&path).expect("load").expect("snapshot present");

        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].0, "gen9ou:garchomp");
        assert_eq!(loaded.formats.len(), 1);
        assert_eq!(loaded.locations.len(), 1);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load(&dir.path().join("absent.json")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn version_mismatch_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, br#"{"version": 99, "entries": []}"#).expect("write");

        assert!(load(&path).expect("load").is_none());
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        let body = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "entries": [
                {
                    "key": "gen9ou:garchomp",
                    "stored_at": 1_700_000_000u64,
                    "payload": {"kind": "sets", "data": {"moves": ["earthquake"]}},
                },
                {"key": "broken"},
                "not even an object",
            ],
        });
        fs::write(&path, serde_json::to_vec(&body).expect("encode")).expect("write");

        let loaded = load(&path).expect("load").expect("snapshot present");
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].0, "gen9ou:garchomp");
    }

    #[test]
    fn corrupt_file_surfaces_as_json_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{{{{").expect("write");

        assert!(load(&path).is_err());
    }
}
