//! Upload ingestion: vault reservation → load → split → embed → index.
//!
//! All-or-nothing: once the vault slot is reserved, any failure drops it (the
//! file is removed) and nothing reaches the index. Callers serialize calls;
//! see [`crate::RagStore::ingest_upload`].

use tracing::{info, instrument, warn};

use crate::chunking::split;
use crate::config::RagConfig;
use crate::embed::EmbeddingsProvider;
use crate::embed_pool::embed_chunks;
use crate::errors::RagError;
use crate::index::IndexStore;
use crate::loader::{DocumentKind, load_document};
use crate::record::IngestOutcome;
use crate::vault::{Reservation, UploadVault};

/// Ingests one uploaded document.
///
/// # Errors
/// - [`RagError::UnsupportedFormat`] before anything touches disk
/// - [`RagError::Read`] for unreadable or empty documents
/// - [`RagError::Embedding`] / [`RagError::Qdrant`] for external failures
#[instrument(skip_all, fields(file_name = %file_name, bytes = bytes.len()))]
pub async fn ingest_upload(
    cfg: &RagConfig,
    vault: &UploadVault,
    index: &dyn IndexStore,
    provider: &dyn EmbeddingsProvider,
    file_name: &str,
    bytes: &[u8],
) -> Result<IngestOutcome, RagError> {
    DocumentKind::from_file_name(file_name)?;
    let source = UploadVault::sanitize(file_name)?;

    let mut slot = match vault.reserve(&source)? {
        Reservation::New(slot) => slot,
        Reservation::Existing(path) => {
            if index.contains_source(&source).await? {
                info!(source = %source, "document already indexed");
                return Ok(IngestOutcome::AlreadyIndexed { source });
            }
            warn!(source = %source, "stale upload without index entries; re-ingesting");
            vault.reclaim(path)?
        }
    };
    slot.write_all(bytes)?;

    let mut chunks = load_document(&source, bytes)?;
    if cfg.chunking.enabled {
        chunks = split(&chunks, cfg.chunking.max_size, cfg.chunking.overlap)?;
    }
    if chunks.is_empty() {
        return Err(RagError::Read("document contains no extractable text".into()));
    }

    let entries = embed_chunks(chunks, provider, cfg.embedding_dim, cfg.embed_concurrency).await?;
    let written = index.add(entries).await?;
    slot.commit();

    info!(source = %source, chunks = written, "document indexed");
    Ok(IngestOutcome::Indexed {
        source,
        chunks: written,
    })
}
