//! Conversational RAG over the recipe index.
//!
//! Public API: [`Conversation`] drives a turn on a [`Session`]; it rewrites
//! the question with the history, retrieves top-K chunks from `rag-store`,
//! builds a persona prompt, calls the chat model, and returns the answer
//! with the chunks used (blocking or as a [`StreamedTurn`]).

mod answer;
mod cfg;
mod error;
mod llm;
mod prompt;
mod rewrite;
mod session;
mod turn;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use answer::{AnswerStream, QaAnswer, RagAnswerer, TokenStream, UsedChunk};
pub use cfg::ContextorConfig;
pub use error::{AnswerStage, ContextorError, ExternalServiceError};
pub use llm::{ChatFuture, ChatModel};
pub use prompt::{DEFAULT_PERSONA, HistoryBudget, NO_CONTEXT_REPLY, REWRITE_INSTRUCTION};
pub use rewrite::QueryRewriter;
pub use session::{Role, Session, SessionHandle, SessionRegistry, Turn};
pub use turn::{Conversation, StreamedTurn};
