//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing / serialization errors.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A stored index line could not be decoded.
    #[error("corrupt index entry at line {line}: {reason}")]
    CorruptEntry { line: usize, reason: String },

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Upload extension outside pdf/doc/docx, as `.ext`. Empty when the
    /// name has no extension.
    #[error("unsupported format: '{0}'")]
    UnsupportedFormat(String),

    /// The document could not be parsed or holds no text.
    #[error("read error: {0}")]
    Read(String),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Embedding service call failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] ai_llm_service::AiLlmError),

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),
}

impl RagError {
    /// True when the failure came from an external service (embedding or Qdrant).
    pub fn is_external(&self) -> bool {
        matches!(self, RagError::Embedding(_) | RagError::Qdrant(_))
    }
}
