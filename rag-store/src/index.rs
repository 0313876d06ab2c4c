//! Index store abstraction shared by the local and Qdrant backends.
//!
//! Similarity metric: cosine. Results are ordered by non-increasing score;
//! the local backend keeps insertion order among equal scores.

use std::cmp::Ordering;
use std::{future::Future, pin::Pin};

use crate::errors::RagError;
use crate::record::{IndexEntry, RagHit};

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RagError>> + Send + 'a>>;

/// Durable collection of [`IndexEntry`] values searchable by vector.
pub trait IndexStore: Send + Sync {
    /// Appends entries, all or nothing. Returns how many were written.
    ///
    /// Every embedding must match the store dimension
    /// ([`RagError::VectorSizeMismatch`] otherwise, with nothing written).
    fn add<'a>(&'a self, entries: Vec<IndexEntry>) -> StoreFuture<'a, usize>;

    /// Top-`k` entries most similar to `query`. Empty store gives `Ok(vec![])`.
    fn search<'a>(&'a self, query: &'a [f32], k: usize) -> StoreFuture<'a, Vec<RagHit>>;

    /// Whether any entry originates from `source`.
    fn contains_source<'a>(&'a self, source: &'a str) -> StoreFuture<'a, bool>;

    /// Number of stored entries.
    fn len<'a>(&'a self) -> StoreFuture<'a, usize>;
}

/// Cosine similarity; `0.0` when either vector has zero length.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Checks that all entries share one dimension, equal to `want` when known.
/// Returns that dimension (`None` for an empty batch of a dimensionless store).
pub fn check_dims(entries: &[IndexEntry], want: Option<usize>) -> Result<Option<usize>, RagError> {
    let dim = want.or_else(|| entries.first().map(|e| e.embedding.len()));
    if let Some(want) = dim {
        if want == 0 {
            return Err(RagError::VectorSizeMismatch { got: 0, want: 1 });
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != want) {
            return Err(RagError::VectorSizeMismatch {
                got: bad.embedding.len(),
                want,
            });
        }
    }
    Ok(dim)
}

/// Scores every entry and keeps the best `k`. The sort is stable, so equal
/// scores stay in insertion order.
pub(crate) fn rank<'e>(
    entries: impl Iterator<Item = &'e IndexEntry>,
    query: &[f32],
    k: usize,
) -> Vec<RagHit> {
    let mut scored: Vec<(f32, &IndexEntry)> =
        entries.map(|e| (cosine(query, &e.embedding), e)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(k)
        .map(|(score, e)| RagHit {
            score,
            chunk: e.chunk.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Chunk;

    fn entry(text: &str, v: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: text.into(),
            chunk: Chunk::new(text),
            embedding: v,
        }
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn rank_is_descending_with_stable_ties() {
        let es = vec![
            entry("a", vec![0.0, 1.0]),
            entry("b", vec![1.0, 0.0]),
            entry("c", vec![1.0, 0.0]),
            entry("d", vec![1.0, 1.0]),
        ];
        let hits = rank(es.iter(), &[1.0, 0.0], 3);
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(rank(es.iter(), &[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn dims_must_agree() {
        let es = vec![entry("a", vec![1.0, 0.0]), entry("b", vec![1.0])];
        assert!(matches!(
            check_dims(&es, None),
            Err(RagError::VectorSizeMismatch { got: 1, want: 2 })
        ));
        assert_eq!(check_dims(&es[..1], None).unwrap(), Some(2));
        assert!(check_dims(&es[..1], Some(3)).is_err());
    }
}
