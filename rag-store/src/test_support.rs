//! Deterministic embedding and index fakes.
//!
//! Compiled for unit tests and behind the `test-utils` feature.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use ai_llm_service::AiLlmError;

use crate::RagStore;
use crate::embed::{EmbedFuture, EmbeddingsProvider};
use crate::errors::RagError;
use crate::index::{IndexStore, StoreFuture};
use crate::record::{Chunk, IndexEntry, RagHit, meta};

pub const DIM: usize = 64;

fn unavailable() -> RagError {
    RagError::Qdrant("unavailable".into())
}

fn timeout() -> RagError {
    RagError::Embedding(AiLlmError::Timeout(Duration::from_secs(1)))
}

/// Bag-of-words vector: each lowercase word bumps one hashed bucket.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut h = DefaultHasher::new();
        word.to_lowercase().hash(&mut h);
        v[(h.finish() % DIM as u64) as usize] += 1.0;
    }
    v
}

/// Writes one entry per text straight into the index, embedded with [`bag_of_words`].
pub async fn seed(store: &RagStore, texts: &[&str]) -> Result<usize, RagError> {
    let entries = texts
        .iter()
        .enumerate()
        .map(|(i, t)| IndexEntry {
            id: format!("seed-{i}"),
            chunk: Chunk::new(*t).with(meta::SOURCE, format!("seed{i}.docx")),
            embedding: bag_of_words(t),
        })
        .collect();
    store.index().add(entries).await
}

pub struct HashEmbedder;

impl EmbeddingsProvider for HashEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async move { Ok(bag_of_words(text)) })
    }
}

pub struct FailingEmbedder;

impl EmbeddingsProvider for FailingEmbedder {
    fn embed<'a>(&'a self, _text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async { Err(timeout()) })
    }
}

/// Embeds passages normally; every query embedding fails.
pub struct QueryFailingEmbedder;

impl EmbeddingsProvider for QueryFailingEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async move { Ok(bag_of_words(text)) })
    }

    fn embed_query<'a>(&'a self, _text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async { Err(timeout()) })
    }
}

/// Index whose writes always fail and which holds nothing.
pub struct WriteFailingIndex;

impl IndexStore for WriteFailingIndex {
    fn add<'a>(&'a self, _entries: Vec<IndexEntry>) -> StoreFuture<'a, usize> {
        Box::pin(async { Err(unavailable()) })
    }

    fn search<'a>(&'a self, _query: &'a [f32], _k: usize) -> StoreFuture<'a, Vec<RagHit>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn contains_source<'a>(&'a self, _source: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async { Ok(false) })
    }

    fn len<'a>(&'a self) -> StoreFuture<'a, usize> {
        Box::pin(async { Ok(0) })
    }
}

/// Index whose every operation fails.
pub struct FailingIndex;

impl IndexStore for FailingIndex {
    fn add<'a>(&'a self, _entries: Vec<IndexEntry>) -> StoreFuture<'a, usize> {
        Box::pin(async { Err(unavailable()) })
    }

    fn search<'a>(&'a self, _query: &'a [f32], _k: usize) -> StoreFuture<'a, Vec<RagHit>> {
        Box::pin(async { Err(unavailable()) })
    }

    fn contains_source<'a>(&'a self, _source: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async { Err(unavailable()) })
    }

    fn len<'a>(&'a self) -> StoreFuture<'a, usize> {
        Box::pin(async { Err(unavailable()) })
    }
}
