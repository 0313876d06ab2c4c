//! Embedding provider backed by the shared LLM profiles.

use std::sync::Arc;

use ai_llm_service::service_profiles::LlmServiceProfiles;
use tracing::warn;

use super::{EmbedFuture, EmbeddingsProvider};
use crate::errors::RagError;

/// Embeds passages with the `embedding` profile and queries with the
/// `query_embedding` profile.
#[derive(Clone, Debug)]
pub struct LlmEmbedder {
    svc: Arc<LlmServiceProfiles>,
    /// Expected embedding dimension, if known.
    dim: Option<usize>,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: Option<usize>) -> Self {
        Self { svc, dim }
    }

    fn check(&self, v: Vec<f32>) -> Result<Vec<f32>, RagError> {
        match self.dim {
            Some(want) if v.len() != want => {
                warn!(got = v.len(), want, "embedding dimension mismatch");
                Err(RagError::VectorSizeMismatch { got: v.len(), want })
            }
            _ => Ok(v),
        }
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async move { self.check(self.svc.embed(text).await?) })
    }

    fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(async move { self.check(self.svc.embed_query(text).await?) })
    }
}
