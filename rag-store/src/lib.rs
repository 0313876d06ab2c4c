//! Document ingestion and vector retrieval for the recipe bot.
//!
//! This crate provides:
//! - Loading of PDF / DOC / DOCX uploads into text chunks, and window splitting
//! - A durable [`IndexStore`] (local JSONL directory or Qdrant)
//! - The [`RagStore`] facade tying vault, loader, embedder and index together

mod chunking;
mod config;
mod embed;
mod embed_pool;
mod errors;
mod index;
mod ingest;
mod loader;
mod local_store;
mod normalize;
mod qdrant_store;
mod record;
mod vault;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use chunking::split;
pub use config::{Backend, ChunkingConfig, RagConfig};
pub use embed::{EmbedFuture, EmbeddingsProvider, llm::LlmEmbedder};
pub use errors::RagError;
pub use index::{IndexStore, StoreFuture, cosine};
pub use loader::{DocumentKind, load_document};
pub use local_store::LocalIndexStore;
pub use normalize::clean_text;
pub use qdrant_store::QdrantIndexStore;
pub use record::{Chunk, IndexEntry, IngestOutcome, RagHit, meta};
pub use vault::UploadVault;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace};

/// High-level facade over the configured backend and upload vault.
///
/// This is the single entry point recommended for application code.
pub struct RagStore {
    cfg: RagConfig,
    index: Arc<dyn IndexStore>,
    vault: UploadVault,
    ingest_lock: Mutex<()>,
}

impl RagStore {
    /// Opens the backend selected by `cfg.backend`.
    ///
    /// # Errors
    /// Invalid configuration, an unreadable local index, or Qdrant client setup.
    pub fn open(cfg: RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;
        let index: Arc<dyn IndexStore> = match cfg.backend {
            Backend::Local => Arc::new(LocalIndexStore::open(&cfg.persist_dir, cfg.embedding_dim)?),
            Backend::Qdrant => Arc::new(QdrantIndexStore::new(&cfg)?),
        };
        Self::with_index(cfg, index)
    }

    /// Uses an already constructed index.
    pub fn with_index(cfg: RagConfig, index: Arc<dyn IndexStore>) -> Result<Self, RagError> {
        trace!(backend = ?cfg.backend, upload_dir = %cfg.upload_dir.display(), "RagStore::with_index");
        let vault = UploadVault::new(&cfg.upload_dir)?;
        Ok(Self {
            cfg,
            index,
            vault,
            ingest_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.cfg
    }

    pub fn index(&self) -> &Arc<dyn IndexStore> {
        &self.index
    }

    /// Ingests an uploaded document. Calls are serialized.
    ///
    /// # Errors
    /// [`RagError::UnsupportedFormat`], [`RagError::Read`], or an external
    /// failure from the embedder or backend.
    pub async fn ingest_upload(
        &self,
        file_name: &str,
        bytes: &[u8],
        provider: &dyn EmbeddingsProvider,
    ) -> Result<IngestOutcome, RagError> {
        let _guard = self.ingest_lock.lock().await;
        ingest::ingest_upload(
            &self.cfg,
            &self.vault,
            self.index.as_ref(),
            provider,
            file_name,
            bytes,
        )
        .await
    }

    /// Top-`k` hits for an already embedded query.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RagHit>, RagError> {
        self.index.search(query, k).await
    }

    /// Embeds `text` with the query profile and searches.
    ///
    /// # Errors
    /// Returns embedding errors or backend failures.
    pub async fn rag_context(
        &self,
        text: &str,
        k: usize,
        provider: &dyn EmbeddingsProvider,
    ) -> Result<Vec<RagHit>, RagError> {
        let vector = provider.embed_query(text).await?;
        let hits = self.search(&vector, k).await?;
        debug!(k, hits = hits.len(), "rag context");
        Ok(hits)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> Result<usize, RagError> {
        self.index.len().await
    }
}
