use std::time::Duration;

use contextor::{QaAnswer, UsedChunk};
use serde::{Deserialize, Serialize};

/// Request payload for both ask routes.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Natural language question; follow-ups may rely on the session history.
    pub question: String,
}

/// Response payload for POST /sessions/{id}/ask.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    /// The question after history-aware rewriting; this is what was searched.
    pub standalone_question: String,
    /// Chunks given to the model, best first.
    pub context: Vec<UsedChunk>,
    /// Retrieval depth the turn ran with.
    pub top_k: usize,
    /// Wall time of the turn, rewrite through answer.
    pub elapsed_ms: u64,
}

impl AskResponse {
    pub fn new(qa: QaAnswer, top_k: usize, elapsed: Duration) -> Self {
        Self {
            answer: qa.answer,
            standalone_question: qa.standalone_question,
            context: qa.used_chunks,
            top_k,
            elapsed_ms: millis(elapsed),
        }
    }
}

pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Payload of the `context` SSE event, sent before the first token.
#[derive(Debug, Serialize)]
pub struct ContextEvent<'a> {
    pub standalone_question: &'a str,
    pub context: &'a [UsedChunk],
}

/// Payload of the `done` SSE event.
#[derive(Debug, Serialize)]
pub struct DoneEvent<'a> {
    pub answer: &'a str,
    pub top_k: usize,
    /// Wall time from the request to the last token.
    pub elapsed_ms: u64,
}
