//! Prompt builders: persona system message, numbered context block, bounded history.

use ai_llm_service::ChatMessage;
use rag_store::RagHit;

use crate::session::Turn;

/// Default chef persona.
pub const DEFAULT_PERSONA: &str = "You are a cooking expert in the style of Gordon Ramsay. \
Use the recipe excerpts provided as context to answer the question. \
Be sharp and direct but good-humoured, and keep the answer to at most three sentences. \
Feel free to mix in Ramsay's trademark expressions. \
If the context does not contain the answer, say honestly that you don't know.";

/// System instruction for turning a follow-up into a standalone query.
pub const REWRITE_INSTRUCTION: &str = "If the user's cooking question refers to the earlier \
conversation, rewrite it as a standalone question that can be understood without the \
conversation. Return only the question. Do not answer it.";

/// Fixed reply when retrieval finds nothing relevant. The model is not called.
pub const NO_CONTEXT_REPLY: &str = "I don't know. None of the uploaded recipes covers that, \
so give me a recipe document that does and ask me again.";

/// Limits on the conversation history sent with a prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryBudget {
    pub max_turns: usize,
    pub max_chars: usize,
}

impl Default for HistoryBudget {
    fn default() -> Self {
        Self {
            max_turns: 12,
            max_chars: 8000,
        }
    }
}

/// Most recent turns that fit the budget, in conversation order.
///
/// Oldest turns are dropped first; a turn that does not fit entirely is dropped.
pub fn bounded_history(turns: &[Turn], budget: HistoryBudget) -> Vec<ChatMessage> {
    let mut used = 0usize;
    let mut kept: Vec<&Turn> = Vec::new();
    for t in turns.iter().rev().take(budget.max_turns) {
        let len = t.text.chars().count();
        if used + len > budget.max_chars {
            break;
        }
        used += len;
        kept.push(t);
    }
    kept.into_iter().rev().map(ChatMessage::from).collect()
}

/// Persona followed by a `Context:` block of numbered chunk texts in rank order.
///
/// The block holds at most `max_chars` characters of chunk text; the chunk
/// crossing the limit is cut on a character boundary and later ones are skipped.
pub fn build_system_prompt(persona: &str, hits: &[RagHit], max_chars: usize) -> String {
    let mut out = String::with_capacity(persona.len() + max_chars.min(16 * 1024));
    out.push_str(persona.trim());
    out.push_str("\n\nContext:\n");

    let mut budget = max_chars;
    for (i, h) in hits.iter().enumerate() {
        if budget == 0 {
            break;
        }
        let text = h.chunk.text.trim();
        let len = text.chars().count();
        out.push_str(&format!("[{}] ", i + 1));
        if len > budget {
            out.extend(text.chars().take(budget));
            out.push_str("…\n");
            break;
        }
        out.push_str(text);
        out.push_str("\n\n");
        budget -= len;
    }
    out
}

/// `[system: instruction, ...history, user: question]`.
pub fn rewrite_messages(history: &[Turn], question: &str, budget: HistoryBudget) -> Vec<ChatMessage> {
    let mut msgs = vec![ChatMessage::system(REWRITE_INSTRUCTION)];
    msgs.extend(bounded_history(history, budget));
    msgs.push(ChatMessage::user(question.trim()));
    msgs
}

/// `[system: persona + context, ...history, user: question]`.
pub fn answer_messages(
    system: String,
    history: &[Turn],
    question: &str,
    budget: HistoryBudget,
) -> Vec<ChatMessage> {
    let mut msgs = vec![ChatMessage::system(system)];
    msgs.extend(bounded_history(history, budget));
    msgs.push(ChatMessage::user(question.trim()));
    msgs
}
