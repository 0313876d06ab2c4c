//! Core data models used by the library.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata keys set by the loader and splitter.
pub mod meta {
    pub const SOURCE: &str = "source";
    pub const KIND: &str = "kind";
    pub const PAGE: &str = "page";
    pub const WINDOW: &str = "window";
    pub const START_CHAR: &str = "start_char";
    pub const SHA256: &str = "sha256";
}

/// A bounded span of document text; the unit of indexing and retrieval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style metadata insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Originating file name, if recorded.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(meta::SOURCE).and_then(Value::as_str)
    }

    /// 1-based page number for PDF chunks.
    pub fn page(&self) -> Option<u64> {
        self.metadata.get(meta::PAGE).and_then(Value::as_u64)
    }
}

/// A chunk with its embedding, as persisted by an [`crate::IndexStore`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A single retrieval hit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RagHit {
    pub score: f32,
    pub chunk: Chunk,
}

/// Result of [`crate::RagStore::ingest_upload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The document was parsed, embedded and written.
    Indexed { source: String, chunks: usize },
    /// A document with this name is already in the index; nothing was written.
    AlreadyIndexed { source: String },
}
