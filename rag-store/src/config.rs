//! Runtime and storage configuration.

use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::RagError;

/// Where index entries live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// JSONL + manifest in `persist_dir`.
    Local,
    /// Remote Qdrant collection.
    Qdrant,
}

impl FromStr for Backend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "qdrant" => Ok(Backend::Qdrant),
            other => Err(RagError::Config(format!("unknown RAG_BACKEND: {other}"))),
        }
    }
}

/// Window parameters for [`crate::chunking::split`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Re-split loaded segments before embedding.
    pub enabled: bool,
    /// Maximum window length in characters.
    pub max_size: usize,
    /// Characters shared by consecutive windows; must be `< max_size`.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 500,
            overlap: 100,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), RagError> {
        if self.max_size == 0 {
            return Err(RagError::Config("chunk max size must be > 0".into()));
        }
        if self.overlap >= self.max_size {
            return Err(RagError::Config(format!(
                "chunk overlap ({}) must be smaller than max size ({})",
                self.overlap, self.max_size
            )));
        }
        Ok(())
    }
}

/// Configuration for ingestion and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    pub backend: Backend,
    /// Local store directory (`entries.jsonl`, `manifest.json`).
    pub persist_dir: PathBuf,
    /// Upload vault directory.
    pub upload_dir: PathBuf,
    /// Qdrant gRPC endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Upsert batch size for Qdrant.
    pub upsert_batch: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    pub chunking: ChunkingConfig,
    /// Expected embedding dimension; `None` adopts the first accepted vector.
    pub embedding_dim: Option<usize>,
    /// Parallel embedding calls during ingestion.
    pub embed_concurrency: usize,
}

impl RagConfig {
    /// Local-backend defaults rooted at the given directories.
    pub fn new_default(persist_dir: impl Into<PathBuf>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Local,
            persist_dir: persist_dir.into(),
            upload_dir: upload_dir.into(),
            qdrant_url: "http://127.0.0.1:6334".into(),
            qdrant_api_key: None,
            collection: "recipes".into(),
            upsert_batch: 256,
            exact_search: false,
            chunking: ChunkingConfig::default(),
            embedding_dim: None,
            embed_concurrency: 4,
        }
    }

    /// Reads `RAG_BACKEND`, `RAG_PERSIST_DIR`, `UPLOAD_DIR`, `QDRANT_*`, `CHUNK_*`, `EMBEDDING_DIM`
    /// and `EMBEDDING_CONCURRENCY`.
    pub fn from_env() -> Result<Self, RagError> {
        let mut cfg = Self::new_default(
            opt_env("RAG_PERSIST_DIR").unwrap_or_else(|| "./index_db".into()),
            opt_env("UPLOAD_DIR").unwrap_or_else(|| "./uploaded_docs".into()),
        );
        if let Some(b) = opt_env("RAG_BACKEND") {
            cfg.backend = b.parse()?;
        }
        if let Some(url) = opt_env("QDRANT_URL") {
            cfg.qdrant_url = url;
        }
        cfg.qdrant_api_key = opt_env("QDRANT_API_KEY");
        if let Some(c) = opt_env("QDRANT_COLLECTION") {
            cfg.collection = c;
        }
        cfg.chunking = ChunkingConfig {
            enabled: parse_env("CHUNK_SPLIT", cfg.chunking.enabled)?,
            max_size: parse_env("CHUNK_MAX_SIZE", cfg.chunking.max_size)?,
            overlap: parse_env("CHUNK_OVERLAP", cfg.chunking.overlap)?,
        };
        cfg.embedding_dim = match opt_env("EMBEDDING_DIM") {
            Some(_) => Some(parse_env("EMBEDDING_DIM", 0usize)?),
            None => None,
        };
        cfg.embed_concurrency = parse_env("EMBEDDING_CONCURRENCY", cfg.embed_concurrency)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding_dim == Some(0) {
            return Err(RagError::Config("EMBEDDING_DIM must be > 0".into()));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::Config("EMBEDDING_CONCURRENCY must be > 0".into()));
        }
        self.chunking.validate()?;
        if self.backend == Backend::Qdrant {
            if self.qdrant_url.trim().is_empty() {
                return Err(RagError::Config("qdrant_url is empty".into()));
            }
            if self.collection.trim().is_empty() {
                return Err(RagError::Config("collection is empty".into()));
            }
            if self.upsert_batch == 0 {
                return Err(RagError::Config("upsert_batch must be > 0".into()));
            }
        }
        Ok(())
    }
}

fn opt_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, RagError> {
    match opt_env(name) {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| RagError::Config(format!("invalid value in {name}: {v}"))),
        None => Ok(default),
    }
}
