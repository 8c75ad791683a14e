//! Producer contract: how each pipeline stage feeds the canonical store.
//!
//! A producer never writes the store itself. It names the units the store
//! does not yet reflect, then turns one unit at a time into a partial
//! record; the runner wraps every unit in a full load-merge-save cycle so
//! an interruption loses at most that unit.

use std::path::PathBuf;

use super::error::StageError;
use crate::models::PartialRecord;
use crate::store::RecordMap;

/// One pending unit of work for a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUnit {
    pub id: String,
    /// Set by file-driven stages (OCR) that read the document itself.
    pub source_path: Option<PathBuf>,
}

impl StageUnit {
    pub fn for_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            source_path: None,
        }
    }
}

/// A pipeline stage that produces partial records for the canonical store.
pub trait DocumentProducer {
    fn name(&self) -> &'static str;

    /// Units this stage still has to process given the current canonical
    /// state. Resumability lives here: a unit whose output fields are
    /// already present in the store is not pending.
    fn pending(&self, records: &RecordMap) -> Result<Vec<StageUnit>, StageError>;

    /// Process one unit into a partial record tagged with its document id.
    fn produce(&self, unit: &StageUnit, records: &RecordMap) -> Result<PartialRecord, StageError>;
}
