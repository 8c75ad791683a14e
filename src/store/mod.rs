//! On-disk canonical record store with upsert-merge semantics.
//!
//! One JSON file holds every canonical record, keyed in memory by `id`.
//! Producers feed partial records through [`upsert_merge`]; a corrupt or
//! missing store file is treated as "nothing learned yet" and re-derived
//! from upstream producers on the next run. Only a failed save is fatal,
//! because it leaves persisted state behind the in-memory state.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{CanonicalRecord, PartialRecord};

/// In-memory shape of the store. BTreeMap keeps id order stable so a
/// saved store diffs cleanly between runs.
pub type RecordMap = BTreeMap<String, CanonicalRecord>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle to one canonical store file. Explicit, not global: every stage
/// and every test points at its own path.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full id → record mapping. A store that does not exist or
    /// cannot be parsed yields an empty mapping; upstream producers
    /// re-derive lost state on the next run.
    pub fn load(&self) -> RecordMap {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return RecordMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Store unreadable, starting empty");
                return RecordMap::new();
            }
        };

        match serde_json::from_str::<Vec<CanonicalRecord>>(&raw) {
            Ok(records) => records_to_map(records),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Store not parseable, starting empty");
                RecordMap::new()
            }
        }
    }

    /// Load like [`load`](Self::load) but propagate every failure,
    /// including a missing file. The reconciler uses this: pruning a
    /// directory against a store that failed to read would delete every
    /// artifact.
    pub fn load_strict(&self) -> Result<RecordMap, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        let records: Vec<CanonicalRecord> = serde_json::from_str(&raw)?;
        Ok(records_to_map(records))
    }

    /// Persist the mapping as a JSON array in id order. Write failure is
    /// fatal for the current run.
    pub fn save(&self, records: &RecordMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let list: Vec<&CanonicalRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// One checkpointed load-merge-save cycle. Producers call this once
    /// per unit of work so an interruption loses at most one unit.
    pub fn merge_and_save(&self, partials: &[PartialRecord]) -> Result<RecordMap, StoreError> {
        let mut records = self.load();
        upsert_merge(&mut records, partials);
        self.save(&records)?;
        Ok(records)
    }
}

/// Merge partial records into the mapping, creating fully-seeded empty
/// records on first sight of an id. Per field, last writer wins; a partial
/// without a resolvable id is skipped with a warning, never fatal.
pub fn upsert_merge(records: &mut RecordMap, partials: &[PartialRecord]) {
    for partial in partials {
        let Some(id) = partial.id.as_deref().filter(|id| !id.is_empty()) else {
            tracing::warn!("Partial record without an id, skipping");
            continue;
        };
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| CanonicalRecord::empty(id));
        partial.apply_to(record);
    }
}

/// Load a producer batch file: a JSON array of objects, each carrying the
/// canonical `id` key or a producer-specific alias renamed via
/// `source_key`. A missing or corrupt batch yields an empty vec; an
/// element that is not an object is dropped with a warning.
pub fn load_batch(path: &Path, source_key: Option<&str>) -> Vec<PartialRecord> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Batch unreadable, treating as empty");
            return Vec::new();
        }
    };

    let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Batch not parseable, treating as empty");
            return Vec::new();
        }
    };

    values
        .into_iter()
        .filter_map(|value| match PartialRecord::from_value(value, source_key) {
            Ok(partial) => Some(partial),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Malformed batch element, dropping");
                None
            }
        })
        .collect()
}

fn records_to_map(records: Vec<CanonicalRecord>) -> RecordMap {
    let mut map = RecordMap::new();
    for record in records {
        if record.id.is_empty() {
            tracing::debug!("Stored record without an id, dropping");
            continue;
        }
        map.insert(record.id.clone(), record);
    }
    map
}
