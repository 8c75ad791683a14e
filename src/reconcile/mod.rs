//! Filtered-set reconciler.
//!
//! Brings a side directory of certificate PDFs and a JSON export into
//! exact agreement with the predicate-passing subset of the canonical
//! store. The directory ends up holding precisely the artifacts for ids
//! that pass the predicate: stale artifacts are pruned, missing ones are
//! copied in from the source directory, existing ones are never
//! overwritten. Per-artifact failures are reported and skipped; only a
//! store that cannot be read at all aborts the operation.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::models::{CanonicalRecord, Classification};
use crate::store::{RecordStore, StoreError};

/// Companion artifacts are `<id>.pdf`.
const ARTIFACT_EXT: &str = "pdf";

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Cannot read canonical store: {0}")]
    StoreUnreadable(#[source] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome counts for one reconciliation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Records passing the predicate.
    pub kept: usize,
    /// Artifacts copied into the destination.
    pub copied: usize,
    /// Stale artifacts removed from the destination.
    pub removed: usize,
    /// Artifacts skipped on per-file errors or missing sources.
    pub skipped: usize,
}

/// The standard predicate: classification is positive.
pub fn is_positive(record: &CanonicalRecord) -> bool {
    Classification::from_str(&record.classification) == Some(Classification::Positive)
}

/// Reconcile `dest_dir` and `export_path` against the subset of the
/// canonical store passing `predicate`.
///
/// The export is a complete, deterministic recomputation from the store,
/// never an incremental patch.
pub fn reconcile<P>(
    store: &RecordStore,
    predicate: P,
    source_dir: &Path,
    dest_dir: &Path,
    export_path: &Path,
) -> Result<ReconcileSummary, ReconcileError>
where
    P: Fn(&CanonicalRecord) -> bool,
{
    // Reconciling against a store we failed to read would prune every
    // artifact, so this load is strict.
    let records = store.load_strict().map_err(ReconcileError::StoreUnreadable)?;
    fs::create_dir_all(dest_dir)?;

    let kept: Vec<&CanonicalRecord> = records.values().filter(|r| predicate(r)).collect();
    let keep_ids: BTreeSet<&str> = kept.iter().map(|r| r.id.as_str()).collect();

    let mut summary = ReconcileSummary {
        kept: kept.len(),
        ..ReconcileSummary::default()
    };

    prune_stale(dest_dir, &keep_ids, &mut summary)?;
    copy_missing(source_dir, dest_dir, &keep_ids, &mut summary);

    if let Some(parent) = export_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(export_path, serde_json::to_string_pretty(&kept)?)?;

    tracing::info!(
        kept = summary.kept,
        copied = summary.copied,
        removed = summary.removed,
        skipped = summary.skipped,
        export = %export_path.display(),
        "Reconciliation complete"
    );
    Ok(summary)
}

/// Remove every artifact in `dest_dir` whose derived id is not kept.
fn prune_stale(
    dest_dir: &Path,
    keep_ids: &BTreeSet<&str>,
    summary: &mut ReconcileSummary,
) -> Result<(), ReconcileError> {
    for entry in fs::read_dir(dest_dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!(dir = %dest_dir.display(), error = %e, "Unreadable directory entry, skipping");
                summary.skipped += 1;
                continue;
            }
        };

        let is_artifact = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXT));
        if !is_artifact {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        if !keep_ids.contains(id) {
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "Removed outdated artifact");
                    summary.removed += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to remove artifact");
                    summary.skipped += 1;
                }
            }
        }
    }
    Ok(())
}

/// Copy each kept artifact absent from `dest_dir`. Copy is never an
/// overwrite, and a missing source does not abort the batch.
fn copy_missing(
    source_dir: &Path,
    dest_dir: &Path,
    keep_ids: &BTreeSet<&str>,
    summary: &mut ReconcileSummary,
) {
    for id in keep_ids {
        let file_name = format!("{id}.{ARTIFACT_EXT}");
        let src = source_dir.join(&file_name);
        let dst = dest_dir.join(&file_name);

        if dst.exists() {
            continue;
        }
        if !src.exists() {
            tracing::warn!(file = %src.display(), "Source artifact not found, skipping");
            summary.skipped += 1;
            continue;
        }
        match fs::copy(&src, &dst) {
            Ok(_) => {
                tracing::info!(from = %src.display(), to = %dst.display(), "Copied artifact");
                summary.copied += 1;
            }
            Err(e) => {
                tracing::warn!(file = %src.display(), error = %e, "Failed to copy artifact");
                summary.skipped += 1;
            }
        }
    }
}
