//! Stage runner and full-pipeline orchestration.
//!
//! Stages run strictly in sequence, single-threaded; there is exactly
//! one writer of the store by construction. Every unit of work gets its
//! own load-merge-save cycle, so the store is a checkpoint log of
//! itself: killing the process after N units and restarting resumes at
//! unit N+1 because the first N ids already carry their output fields.

use thiserror::Error;

use super::error::StageError;
use super::ocr::{DocumentAiClient, OcrStage};
use super::ollama::OllamaClient;
use super::producers::{ClassifyStage, FieldsStage, ManifestStage, NameStage};
use super::traits::DocumentProducer;
use crate::config::PipelineConfig;
use crate::reconcile::{is_positive, reconcile, ReconcileError};
use crate::scrape::{ScrapeError, ScraperVariant};
use crate::store::{upsert_merge, RecordStore};

/// Ollama calls get a long leash; big models on CPU are slow.
const LLM_TIMEOUT_SECS: u64 = 300;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage failed: {0}")]
    Stage(#[from] StageError),

    #[error("Scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Outcome counts for one stage run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub processed: usize,
    pub failed: usize,
}

/// Run one producer to completion against the store.
///
/// A failed unit is logged and skipped; the rest of the batch continues.
/// A failed save aborts the stage, because from that point persisted
/// state would trail what was computed in memory.
pub fn run_stage(store: &RecordStore, producer: &dyn DocumentProducer) -> Result<StageReport, StageError> {
    let snapshot = store.load();
    let units = producer.pending(&snapshot)?;

    if units.is_empty() {
        tracing::debug!(stage = producer.name(), "Nothing pending");
        return Ok(StageReport::default());
    }
    tracing::info!(stage = producer.name(), pending = units.len(), "Running stage");

    let mut report = StageReport::default();
    for unit in &units {
        // Reload so produce sees everything merged so far, then
        // checkpoint this one unit before moving to the next.
        let records = store.load();
        match producer.produce(unit, &records) {
            Ok(partial) => {
                let mut records = records;
                upsert_merge(&mut records, std::slice::from_ref(&partial));
                store.save(&records)?;
                report.processed += 1;
            }
            Err(e) => {
                tracing::warn!(
                    stage = producer.name(),
                    id = %unit.id,
                    error = %e,
                    "Unit failed, continuing with the rest of the batch"
                );
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        stage = producer.name(),
        processed = report.processed,
        failed = report.failed,
        "Stage complete"
    );
    Ok(report)
}

/// Run the whole pipeline: ingest → OCR → names → fields → classify,
/// then reconcile the positive subset.
pub fn run_pipeline(config: &PipelineConfig) -> Result<(), PipelineError> {
    let store = RecordStore::new(&config.store_path);

    // Downloaded-document ingest. The scraper variant is selected
    // explicitly here; browser automation itself runs outside this
    // process and reports through the manifest.
    let mut scraper = ScraperVariant::NycDeathCertificates.build(config);
    scraper.setup()?;
    let collected = scraper.collect()?;
    scraper.teardown();
    run_stage(&store, &ManifestStage::new(collected))?;

    let ocr = DocumentAiClient::new(&config.ocr_endpoint, &config.ocr_access_token);
    run_stage(&store, &OcrStage::new(&config.certificates_dir, &ocr))?;

    let llm = OllamaClient::new(&config.ollama_url, LLM_TIMEOUT_SECS);
    run_stage(&store, &NameStage::new(&llm, &config.model_name))?;
    run_stage(
        &store,
        &FieldsStage::new(&llm, &config.model_name, config.start_year, config.end_year),
    )?;
    run_stage(&store, &ClassifyStage)?;

    reconcile(
        &store,
        is_positive,
        &config.certificates_dir,
        &config.filtered_dir,
        &config.export_path,
    )?;
    Ok(())
}
