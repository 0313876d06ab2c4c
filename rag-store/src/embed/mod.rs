use crate::errors::RagError;
use std::{future::Future, pin::Pin};

pub mod llm;

/// Boxed future returned by provider methods.
pub type EmbedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>>;

/// Asynchronous embedding provider.
///
/// Async is required because real providers (Upstage, OpenAI, Ollama)
/// perform HTTP requests. Passages and queries may use different models, so
/// the query side has its own entry point; it defaults to [`Self::embed`].
pub trait EmbeddingsProvider: Send + Sync {
    /// Embeds a document passage.
    fn embed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a>;

    /// Embeds a search query.
    fn embed_query<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        self.embed(text)
    }
}
