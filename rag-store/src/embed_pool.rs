//! Embedding executor with concurrency and dimension checks.

use crate::{
    embed::EmbeddingsProvider,
    errors::RagError,
    record::{Chunk, IndexEntry},
};
use futures::stream::{self, StreamExt};
use tracing::{debug, info};

/// Embeds every chunk and returns index entries in input order.
///
/// # Arguments
/// - `chunks`: chunks of one source, in reading order (the ordinal feeds the id).
/// - `provider`: embedding backend.
/// - `expected_dim`: if `Some`, enforces this vector size; otherwise all
///   vectors must agree with the first one.
/// - `concurrency`: maximum number of in-flight embedding calls.
///
/// # Errors
/// The first provider failure, or [`RagError::VectorSizeMismatch`].
pub async fn embed_chunks(
    chunks: Vec<Chunk>,
    provider: &dyn EmbeddingsProvider,
    expected_dim: Option<usize>,
    concurrency: usize,
) -> Result<Vec<IndexEntry>, RagError> {
    info!(total = chunks.len(), concurrency, "embedding chunks");

    let texts: Vec<(usize, String)> = chunks.iter().map(|c| c.text.clone()).enumerate().collect();
    let mut results: Vec<(usize, Vec<f32>)> = stream::iter(texts)
        .map(|(i, text): (usize, String)| async move {
            let v = provider.embed(&text).await?;
            Ok::<(usize, Vec<f32>), RagError>((i, v))
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<Vec<_>, RagError>>()?;
    results.sort_by_key(|(i, _)| *i);

    let want = expected_dim.or_else(|| results.first().map(|(_, v)| v.len()));
    let mut out = Vec::with_capacity(chunks.len());
    for ((i, embedding), chunk) in results.into_iter().zip(chunks) {
        if let Some(want) = want {
            if embedding.len() != want {
                return Err(RagError::VectorSizeMismatch {
                    got: embedding.len(),
                    want,
                });
            }
        }
        let id = services::hash::chunk_id(chunk.source().unwrap_or_default(), i as u64, &chunk.text);
        out.push(IndexEntry {
            id,
            chunk,
            embedding,
        });
    }

    debug!(entries = out.len(), "embeddings filled");
    Ok(out)
}
