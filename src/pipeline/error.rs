//! Error types for pipeline stages and their external service clients.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Service returned error (status {status}): {body}")]
    ServiceStatus { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Record {0} is not in the store")]
    MissingRecord(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
