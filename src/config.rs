use std::path::{Path, PathBuf};

/// Application-level constants
pub const APP_NAME: &str = "Vitalis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default data directory: ~/Vitalis (user-visible on all platforms).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Vitalis")
}

/// Everything a pipeline run needs, passed explicitly into each stage so
/// tests can point at isolated temporary stores and directories.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canonical record store file.
    pub store_path: PathBuf,
    /// Downloader manifest written by the external browser automation.
    pub manifest_path: PathBuf,
    /// Directory of downloaded certificate PDFs.
    pub certificates_dir: PathBuf,
    /// Side directory kept in sync with the positive subset.
    pub filtered_dir: PathBuf,
    /// JSON export of the positive subset.
    pub export_path: PathBuf,
    /// Document AI `process` endpoint.
    pub ocr_endpoint: String,
    /// Bearer token for the OCR endpoint.
    pub ocr_access_token: String,
    /// Ollama base URL.
    pub ollama_url: String,
    /// Model used for name and field extraction.
    pub model_name: String,
    /// Year range of the record set, anchors the extraction prompt.
    pub start_year: i32,
    pub end_year: i32,
}

impl PipelineConfig {
    /// Defaults rooted under `root`, mirroring the layout the pipeline
    /// has always used.
    pub fn with_data_dir(root: &Path) -> Self {
        Self {
            store_path: root.join("data/complete_data.json"),
            manifest_path: root.join("records/saved_files.json"),
            certificates_dir: root.join("death_certificates"),
            filtered_dir: root.join("positive"),
            export_path: root.join("data/positive_records.json"),
            ocr_endpoint: String::new(),
            ocr_access_token: String::new(),
            ollama_url: "http://127.0.0.1:11434".to_string(),
            model_name: "deepseek-r1:32b".to_string(),
            start_year: 1865,
            end_year: 1867,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_data_dir(&app_data_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Vitalis"));
    }

    #[test]
    fn config_paths_rooted_under_data_dir() {
        let root = PathBuf::from("/tmp/vitalis-test");
        let config = PipelineConfig::with_data_dir(&root);
        assert!(config.store_path.starts_with(&root));
        assert!(config.certificates_dir.starts_with(&root));
        assert!(config.filtered_dir.starts_with(&root));
        assert!(config.export_path.starts_with(&root));
        assert!(config.manifest_path.starts_with(&root));
    }

    #[test]
    fn default_year_range_covers_the_record_set() {
        let config = PipelineConfig::with_data_dir(Path::new("/tmp/x"));
        assert_eq!((config.start_year, config.end_year), (1865, 1867));
    }
}
