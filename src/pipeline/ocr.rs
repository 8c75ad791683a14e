//! OCR stage: transcribe certificate PDFs via a Document-AI-style service.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::error::StageError;
use super::traits::{DocumentProducer, StageUnit};
use crate::models::PartialRecord;
use crate::store::RecordMap;

/// Blocking client abstraction over the OCR service.
pub trait OcrClient {
    /// Transcribe one PDF into raw text.
    fn transcribe_pdf(&self, path: &Path) -> Result<String, StageError>;
}

/// Client for a Google Document AI `process` endpoint.
pub struct DocumentAiClient {
    endpoint_url: String,
    access_token: String,
    client: reqwest::blocking::Client,
}

impl DocumentAiClient {
    pub fn new(endpoint_url: &str, access_token: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint_url: endpoint_url.to_string(),
            access_token: access_token.to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    raw_document: RawDocument,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    content: String,
    mime_type: &'static str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: DocumentBody,
}

#[derive(Deserialize, Default)]
struct DocumentBody {
    #[serde(default)]
    text: String,
}

impl OcrClient for DocumentAiClient {
    fn transcribe_pdf(&self, path: &Path) -> Result<String, StageError> {
        let content = fs::read(path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);

        let body = ProcessRequest {
            raw_document: RawDocument {
                content: encoded,
                mime_type: "application/pdf",
            },
        };

        let response = self
            .client
            .post(&self.endpoint_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .map_err(|e| StageError::HttpClient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StageError::ServiceStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ProcessResponse = response
            .json()
            .map_err(|e| StageError::ResponseParsing(e.to_string()))?;

        Ok(parsed.document.text)
    }
}

/// Walks the certificates directory and transcribes every PDF whose
/// record has no `raw_text` yet.
pub struct OcrStage<'a> {
    certificates_dir: PathBuf,
    client: &'a dyn OcrClient,
}

impl<'a> OcrStage<'a> {
    pub fn new(certificates_dir: impl Into<PathBuf>, client: &'a dyn OcrClient) -> Self {
        Self {
            certificates_dir: certificates_dir.into(),
            client,
        }
    }
}

impl DocumentProducer for OcrStage<'_> {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn pending(&self, records: &RecordMap) -> Result<Vec<StageUnit>, StageError> {
        let entries = match fs::read_dir(&self.certificates_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    dir = %self.certificates_dir.display(),
                    "Certificates directory missing, nothing to transcribe"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut units = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
            if !is_pdf {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let done = records.get(id).is_some_and(|r| !r.raw_text.is_empty());
            if !done {
                units.push(StageUnit {
                    id: id.to_string(),
                    source_path: Some(path),
                });
            }
        }
        // read_dir order is platform-dependent
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(units)
    }

    fn produce(&self, unit: &StageUnit, _records: &RecordMap) -> Result<PartialRecord, StageError> {
        let path = unit
            .source_path
            .clone()
            .unwrap_or_else(|| self.certificates_dir.join(format!("{}.pdf", unit.id)));

        let text = self.client.transcribe_pdf(&path)?;
        tracing::debug!(id = %unit.id, chars = text.len(), "Transcribed certificate");

        Ok(PartialRecord {
            raw_text: Some(text),
            ..PartialRecord::with_id(&unit.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalRecord;

    struct FixedOcr(&'static str);

    impl OcrClient for FixedOcr {
        fn transcribe_pdf(&self, _path: &Path) -> Result<String, StageError> {
            Ok(self.0.to_string())
        }
    }

    fn dir_with_pdfs(ids: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for id in ids {
            fs::write(dir.path().join(format!("{id}.pdf")), b"%PDF-1.4 stub").unwrap();
        }
        dir
    }

    #[test]
    fn pending_skips_already_transcribed() {
        let dir = dir_with_pdfs(&["cert-001", "cert-002"]);
        let client = FixedOcr("text");
        let stage = OcrStage::new(dir.path(), &client);

        let mut records = RecordMap::new();
        let mut done = CanonicalRecord::empty("cert-001");
        done.raw_text = "already transcribed".to_string();
        records.insert(done.id.clone(), done);

        let units = stage.pending(&records).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "cert-002");
    }

    #[test]
    fn pending_ignores_non_pdf_files() {
        let dir = dir_with_pdfs(&["cert-001"]);
        fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();
        let client = FixedOcr("text");
        let stage = OcrStage::new(dir.path(), &client);

        let units = stage.pending(&RecordMap::new()).unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn missing_directory_yields_no_units() {
        let dir = tempfile::tempdir().unwrap();
        let client = FixedOcr("text");
        let stage = OcrStage::new(dir.path().join("absent"), &client);
        assert!(stage.pending(&RecordMap::new()).unwrap().is_empty());
    }

    #[test]
    fn produce_yields_raw_text_partial() {
        let dir = dir_with_pdfs(&["cert-001"]);
        let client = FixedOcr("Name of the deceased (in full): Mary Smith");
        let stage = OcrStage::new(dir.path(), &client);

        let units = stage.pending(&RecordMap::new()).unwrap();
        let partial = stage.produce(&units[0], &RecordMap::new()).unwrap();

        assert_eq!(partial.id.as_deref(), Some("cert-001"));
        assert_eq!(
            partial.raw_text.as_deref(),
            Some("Name of the deceased (in full): Mary Smith")
        );
        assert!(partial.person_name.is_none());
    }
}
