//! Language-model boundary used by the rewriter and the answerer.

use std::{future::Future, pin::Pin};

use ai_llm_service::service_profiles::LlmServiceProfiles;
use ai_llm_service::{AiLlmError, ChatMessage, TextStream};

/// Boxed future returned by [`ChatModel`] methods.
pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AiLlmError>> + Send + 'a>>;

/// Chat completion backend.
pub trait ChatModel: Send + Sync {
    /// Full answer for `messages`.
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String>;

    /// Answer fragments in arrival order.
    fn complete_stream<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, TextStream>;

    /// Question rewriting; may use a cheaper model.
    fn rewrite<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        self.complete(messages)
    }
}

impl ChatModel for LlmServiceProfiles {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(self.chat(messages))
    }

    fn complete_stream<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, TextStream> {
        Box::pin(self.chat_stream(messages))
    }

    fn rewrite<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(LlmServiceProfiles::rewrite(self, messages))
    }
}
