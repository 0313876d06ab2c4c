//! Deterministic fakes for the chat boundary, plus the embedding and index
//! fakes of `rag-store`.
//!
//! Compiled for unit tests and behind the `test-utils` feature.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ai_llm_service::{AiLlmError, ChatMessage, ChatRole, TextStream};
use futures::StreamExt;
use futures::stream;

use crate::llm::{ChatFuture, ChatModel};

pub use rag_store::test_support::{FailingIndex, HashEmbedder, QueryFailingEmbedder, seed};

fn timeout() -> AiLlmError {
    AiLlmError::Timeout(Duration::from_secs(1))
}

/// Chat model replaying scripted replies.
///
/// Once the script is used up it answers with the context block of the
/// system prompt, or the last user message when there is none. Streams split
/// the reply into word fragments.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl ScriptedChat {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Number of model calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages of the most recent call.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn reply(&self, messages: &[ChatMessage]) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        if let Some(r) = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            return r;
        }
        let context = messages
            .iter()
            .find(|m| m.role == ChatRole::System)
            .and_then(|m| m.content.split_once("Context:\n"))
            .map(|(_, c)| c.trim().to_string());
        context.unwrap_or_else(|| {
            messages
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::User)
                .map(|m| m.content.clone())
                .unwrap_or_default()
        })
    }
}

pub fn fragments(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

impl ChatModel for ScriptedChat {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(async move { Ok(self.reply(messages)) })
    }

    fn complete_stream<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, TextStream> {
        Box::pin(async move {
            let parts = fragments(&self.reply(messages));
            Ok(stream::iter(parts.into_iter().map(Ok)).boxed())
        })
    }
}

/// Chat model whose every call fails.
pub struct FailingChat;

impl ChatModel for FailingChat {
    fn complete<'a>(&'a self, _messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(async { Err(timeout()) })
    }

    fn complete_stream<'a>(&'a self, _messages: &'a [ChatMessage]) -> ChatFuture<'a, TextStream> {
        Box::pin(async { Err(timeout()) })
    }
}

/// Rewrites by echoing the question but fails the answer call.
///
/// Streams open fine, yield `first` and then fail.
pub struct AnswerFailingChat {
    pub first: String,
}

impl ChatModel for AnswerFailingChat {
    fn complete<'a>(&'a self, _messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(async { Err(timeout()) })
    }

    fn complete_stream<'a>(&'a self, _messages: &'a [ChatMessage]) -> ChatFuture<'a, TextStream> {
        Box::pin(async move {
            let items = vec![Ok(self.first.clone()), Err(timeout())];
            Ok(stream::iter(items).boxed())
        })
    }

    fn rewrite<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(async move {
            Ok(messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default())
        })
    }
}
