//! Typed error for the contextor crate.

use std::fmt;

use ai_llm_service::AiLlmError;
use rag_store::RagError;
use thiserror::Error;
use uuid::Uuid;

/// Pipeline step of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStage {
    Rewrite,
    Embed,
    Search,
    Complete,
}

impl fmt::Display for AnswerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnswerStage::Rewrite => "rewrite",
            AnswerStage::Embed => "embed",
            AnswerStage::Search => "search",
            AnswerStage::Complete => "complete",
        })
    }
}

/// Failure of an opaque collaborator (language model, embedder, index).
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error(transparent)]
    Llm(#[from] AiLlmError),

    #[error(transparent)]
    Rag(#[from] RagError),
}

#[derive(Debug, Error)]
pub enum ContextorError {
    /// Errors from the underlying rag-store crate.
    #[error("RAG error: {0}")]
    Rag(#[from] RagError),

    /// Language-model or configuration errors from ai-llm-service.
    #[error("LLM error: {0}")]
    Llm(#[from] AiLlmError),

    /// An external call failed while answering.
    #[error("answer generation failed at {stage}: {source}")]
    AnswerGeneration {
        stage: AnswerStage,
        #[source]
        source: ExternalServiceError,
    },

    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("question must not be empty")]
    EmptyQuestion,
}

impl ContextorError {
    /// Tags an external failure with the step it happened in; other variants pass through.
    pub fn at_stage(self, stage: AnswerStage) -> Self {
        match self {
            ContextorError::Llm(e) => ContextorError::AnswerGeneration {
                stage,
                source: e.into(),
            },
            ContextorError::Rag(e) => ContextorError::AnswerGeneration {
                stage,
                source: e.into(),
            },
            other => other,
        }
    }

    /// Text safe to show an end user. Never includes upstream detail.
    pub fn user_message(&self) -> String {
        match self {
            ContextorError::AnswerGeneration { stage, .. } => match stage {
                AnswerStage::Rewrite => {
                    "Sorry, I couldn't understand the question in the context of our conversation. Please try again."
                }
                AnswerStage::Embed | AnswerStage::Search => {
                    "Sorry, I couldn't look up the recipes right now. Please try again."
                }
                AnswerStage::Complete => {
                    "Sorry, the chef is unavailable right now and couldn't write an answer. Please try again."
                }
            }
            .to_string(),
            ContextorError::SessionNotFound(_) => "This conversation no longer exists.".into(),
            ContextorError::EmptyQuestion => "Please ask a question.".into(),
            ContextorError::Rag(_) | ContextorError::Llm(_) => {
                "Sorry, something went wrong while answering. Please try again.".into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stage_wraps_external_failures_only() {
        let e = ContextorError::from(AiLlmError::Timeout(Duration::from_secs(3)))
            .at_stage(AnswerStage::Complete);
        assert!(matches!(
            e,
            ContextorError::AnswerGeneration {
                stage: AnswerStage::Complete,
                source: ExternalServiceError::Llm(_)
            }
        ));
        assert!(matches!(
            ContextorError::EmptyQuestion.at_stage(AnswerStage::Embed),
            ContextorError::EmptyQuestion
        ));
    }

    #[test]
    fn user_message_hides_internals() {
        let e = ContextorError::from(RagError::Qdrant("grpc://10.0.0.3 refused".into()))
            .at_stage(AnswerStage::Search);
        let msg = e.user_message();
        assert!(!msg.contains("10.0.0.3"));
        assert!(msg.contains("look up"));
        assert!(e.to_string().contains("search"));
    }
}
