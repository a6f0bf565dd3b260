//! Pipeline error taxonomy.
//!
//! Every per-file failure mode maps to one of these variants. Embedding
//! service outages are deliberately absent: they are recovered inside the
//! embedding layer via the deterministic fallback and never surface as a
//! pipeline error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// File extension outside the supported set. Fatal for the file, not retried.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Extractor failed or produced whitespace-only text. Original cause kept.
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    /// Vector store write error, e.g. a missing collection. No partial writes remain.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Bad input before extraction: missing file, oversize file, bad collection name.
    #[error("validation failure: {0}")]
    Validation(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
