//! Conversational query rewriting.
//!
//! The rewritten text is only used as a retrieval query and as the question
//! put to the answer model; it is never shown to the user as an answer.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::ContextorError;
use crate::llm::ChatModel;
use crate::prompt::{HistoryBudget, rewrite_messages};
use crate::session::Turn;

pub struct QueryRewriter {
    model: Arc<dyn ChatModel>,
    budget: HistoryBudget,
}

impl QueryRewriter {
    pub fn new(model: Arc<dyn ChatModel>, budget: HistoryBudget) -> Self {
        Self { model, budget }
    }

    /// Standalone form of `question` given `history`.
    ///
    /// With no history the question is returned unchanged and the model is
    /// not called. An empty model output falls back to the question.
    ///
    /// # Errors
    /// [`ContextorError::Llm`] when the model call fails.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn rewrite(&self, history: &[Turn], question: &str) -> Result<String, ContextorError> {
        let question = question.trim();
        if history.is_empty() {
            return Ok(question.to_string());
        }
        let msgs = rewrite_messages(history, question, self.budget);
        let out = self.model.rewrite(&msgs).await?;
        let out = out.trim();
        if out.is_empty() {
            debug!("empty rewrite; using the original question");
            return Ok(question.to_string());
        }
        debug!(standalone = %out, "question rewritten");
        Ok(out.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use crate::test_utils::{FailingChat, ScriptedChat};

    fn history() -> Vec<Turn> {
        vec![
            Turn {
                role: Role::User,
                text: "How do I make kimchi fried rice?".into(),
            },
            Turn {
                role: Role::Assistant,
                text: "Fry kimchi, add rice.".into(),
            },
        ]
    }

    #[tokio::test]
    async fn first_turn_skips_the_model() {
        let chat = Arc::new(ScriptedChat::new(["should not be used"]));
        let rw = QueryRewriter::new(chat.clone(), HistoryBudget::default());
        assert_eq!(rw.rewrite(&[], " What is bulgogi? ").await.unwrap(), "What is bulgogi?");
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn follow_up_is_rewritten_by_the_model() {
        let chat = Arc::new(ScriptedChat::new(["How long does kimchi fried rice take? "]));
        let rw = QueryRewriter::new(chat.clone(), HistoryBudget::default());
        let out = rw.rewrite(&history(), "How long does it take?").await.unwrap();
        assert_eq!(out, "How long does kimchi fried rice take?");

        let sent = chat.last_messages();
        assert_eq!(sent.len(), 4);
        assert!(sent[0].content.contains("Do not answer"));
    }

    #[tokio::test]
    async fn blank_output_falls_back_to_question() {
        let chat = Arc::new(ScriptedChat::new(["   "]));
        let rw = QueryRewriter::new(chat, HistoryBudget::default());
        assert_eq!(rw.rewrite(&history(), "And eggs?").await.unwrap(), "And eggs?");
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let rw = QueryRewriter::new(Arc::new(FailingChat), HistoryBudget::default());
        let err = rw.rewrite(&history(), "And eggs?").await.unwrap_err();
        assert!(matches!(err, ContextorError::Llm(_)));
    }
}
