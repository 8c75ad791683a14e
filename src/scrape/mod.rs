//! Scraper capability interface.
//!
//! Document discovery and download run in an external browser-automation
//! process; what this crate owns is the contract for getting the results
//! back. Variants form a closed enumeration selected explicitly by the
//! orchestrator — no name-keyed registry.

use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::models::PartialRecord;
use crate::store::load_batch;

/// The identifying key the downloader writes into its manifest instead
/// of `id`; renamed during batch load.
pub const MANIFEST_SOURCE_KEY: &str = "output filename";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What every scraper variant must provide.
pub trait Scraper {
    /// Prepare whatever the variant needs before collection.
    fn setup(&mut self) -> Result<(), ScrapeError>;

    /// Report the documents collected so far as partial records, each
    /// carrying at least an id and its certificate URL.
    fn collect(&mut self) -> Result<Vec<PartialRecord>, ScrapeError>;

    /// Release any resources held since `setup`.
    fn teardown(&mut self);
}

/// Closed set of scraper variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperVariant {
    /// NYC historical vital records, death certificates 1865–1867.
    NycDeathCertificates,
}

impl ScraperVariant {
    pub fn build(self, config: &PipelineConfig) -> Box<dyn Scraper> {
        match self {
            Self::NycDeathCertificates => {
                Box::new(ManifestScraper::new(config.manifest_path.clone()))
            }
        }
    }
}

/// Reads the manifest the external downloader maintains. A missing
/// manifest just means nothing has been downloaded yet.
pub struct ManifestScraper {
    manifest_path: PathBuf,
}

impl ManifestScraper {
    pub fn new(manifest_path: PathBuf) -> Self {
        Self { manifest_path }
    }
}

impl Scraper for ManifestScraper {
    fn setup(&mut self) -> Result<(), ScrapeError> {
        if let Some(parent) = self.manifest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn collect(&mut self) -> Result<Vec<PartialRecord>, ScrapeError> {
        let partials = load_batch(&self.manifest_path, Some(MANIFEST_SOURCE_KEY));
        tracing::info!(
            manifest = %self.manifest_path.display(),
            records = partials.len(),
            "Collected downloader manifest"
        );
        Ok(partials)
    }

    fn teardown(&mut self) {}
}
