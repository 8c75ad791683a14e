//! Document processing pipeline.
//!
//! Five producers connected by one contract:
//!
//! ```text
//! manifest → ocr → names → fields → classify
//! ```
//!
//! Every producer implements [`DocumentProducer`] and feeds partial
//! records into the canonical store through the runner, one checkpointed
//! unit at a time. External services (Document AI, Ollama) sit behind
//! the [`OcrClient`] and [`LlmClient`] traits so stages are testable
//! with doubles.

pub mod error;
pub mod ocr;
pub mod ollama;
pub mod producers;
pub mod prompts;
pub mod runner;
pub mod traits;

pub use error::StageError;
pub use ocr::{DocumentAiClient, OcrClient, OcrStage};
pub use ollama::{LlmClient, OllamaClient};
pub use producers::{ClassifyStage, FieldsStage, ManifestStage, NameStage};
pub use runner::{run_pipeline, run_stage, PipelineError, StageReport};
pub use traits::{DocumentProducer, StageUnit};
