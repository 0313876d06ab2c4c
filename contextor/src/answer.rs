//! Retrieval-augmented answering.
//!
//! Per question: rewrite → embed (query profile) → search → prompt → complete.
//! Every external failure is tagged with its [`AnswerStage`]. When no hit
//! scores above the floor the fixed [`NO_CONTEXT_REPLY`] is returned and the
//! model is not called.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use rag_store::{EmbeddingsProvider, RagHit, RagStore};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cfg::ContextorConfig;
use crate::error::{AnswerStage, ContextorError, ExternalServiceError};
use crate::llm::ChatModel;
use crate::prompt::{NO_CONTEXT_REPLY, answer_messages, build_system_prompt};
use crate::rewrite::QueryRewriter;
use crate::session::Turn;

/// A context chunk that was fed to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UsedChunk {
    pub score: f32,
    pub source: Option<String>,
    pub page: Option<u64>,
    pub text: String,
}

impl From<&RagHit> for UsedChunk {
    fn from(h: &RagHit) -> Self {
        Self {
            score: h.score,
            source: h.chunk.source().map(str::to_string),
            page: h.chunk.page(),
            text: h.chunk.text.clone(),
        }
    }
}

/// Final answer together with the exact context passed to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub standalone_question: String,
    pub used_chunks: Vec<UsedChunk>,
}

/// Answer fragments in arrival order.
pub type TokenStream = BoxStream<'static, Result<String, ContextorError>>;

/// Streaming answer: provenance is known before the first fragment.
pub struct AnswerStream {
    pub standalone_question: String,
    pub used_chunks: Vec<UsedChunk>,
    pub tokens: TokenStream,
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("standalone_question", &self.standalone_question)
            .field("used_chunks", &self.used_chunks.len())
            .finish_non_exhaustive()
    }
}

/// Everything before the completion call.
struct Prepared {
    standalone: String,
    hits: Vec<RagHit>,
    messages: Vec<ai_llm_service::ChatMessage>,
}

pub struct RagAnswerer {
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingsProvider>,
    store: Arc<RagStore>,
    rewriter: QueryRewriter,
    cfg: ContextorConfig,
}

impl RagAnswerer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn EmbeddingsProvider>,
        store: Arc<RagStore>,
        cfg: ContextorConfig,
    ) -> Self {
        let rewriter = QueryRewriter::new(model.clone(), cfg.history);
        Self {
            model,
            embedder,
            store,
            rewriter,
            cfg,
        }
    }

    pub fn config(&self) -> &ContextorConfig {
        &self.cfg
    }

    /// Answers `question` given the prior `history`.
    ///
    /// # Errors
    /// [`ContextorError::EmptyQuestion`], or
    /// [`ContextorError::AnswerGeneration`] naming the failed stage.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn answer(&self, history: &[Turn], question: &str) -> Result<QaAnswer, ContextorError> {
        let p = self.prepare(history, question).await?;
        let used_chunks: Vec<UsedChunk> = p.hits.iter().map(UsedChunk::from).collect();

        let answer = if p.hits.is_empty() {
            info!("no relevant context; answering with the fixed reply");
            NO_CONTEXT_REPLY.to_string()
        } else {
            self.model
                .complete(&p.messages)
                .await
                .map_err(|e| stage_err(AnswerStage::Complete, e))?
        };

        info!(chunks = used_chunks.len(), answer_chars = answer.len(), "answer ready");
        Ok(QaAnswer {
            answer,
            standalone_question: p.standalone,
            used_chunks,
        })
    }

    /// Like [`Self::answer`] but returns the model output as a stream.
    ///
    /// Only opening the stream can fail with an error; a failure while
    /// fragments flow arrives as an `Err` item tagged
    /// [`AnswerStage::Complete`].
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn answer_stream(
        &self,
        history: &[Turn],
        question: &str,
    ) -> Result<AnswerStream, ContextorError> {
        let p = self.prepare(history, question).await?;
        let used_chunks: Vec<UsedChunk> = p.hits.iter().map(UsedChunk::from).collect();

        let tokens: TokenStream = if p.hits.is_empty() {
            info!("no relevant context; streaming the fixed reply");
            stream::once(async { Ok(NO_CONTEXT_REPLY.to_string()) }).boxed()
        } else {
            self.model
                .complete_stream(&p.messages)
                .await
                .map_err(|e| stage_err(AnswerStage::Complete, e))?
                .map(|r| r.map_err(|e| stage_err(AnswerStage::Complete, e)))
                .boxed()
        };

        Ok(AnswerStream {
            standalone_question: p.standalone,
            used_chunks,
            tokens,
        })
    }

    async fn prepare(&self, history: &[Turn], question: &str) -> Result<Prepared, ContextorError> {
        if question.trim().is_empty() {
            return Err(ContextorError::EmptyQuestion);
        }

        let standalone = self
            .rewriter
            .rewrite(history, question)
            .await
            .map_err(|e| e.at_stage(AnswerStage::Rewrite))?;

        let vector = self
            .embedder
            .embed_query(&standalone)
            .await
            .map_err(|e| stage_err(AnswerStage::Embed, e))?;

        let hits = self
            .store
            .search(&vector, self.cfg.top_k)
            .await
            .map_err(|e| stage_err(AnswerStage::Search, e))?;
        let found = hits.len();
        let hits: Vec<RagHit> = hits
            .into_iter()
            .filter(|h| h.score > self.cfg.score_floor)
            .collect();
        debug!(found, kept = hits.len(), floor = self.cfg.score_floor, "retrieved context");

        let system = build_system_prompt(&self.cfg.persona, &hits, self.cfg.max_ctx_chars);
        let messages = answer_messages(system, history, &standalone, self.cfg.history);
        Ok(Prepared {
            standalone,
            hits,
            messages,
        })
    }
}

fn stage_err(stage: AnswerStage, e: impl Into<ExternalServiceError>) -> ContextorError {
    ContextorError::AnswerGeneration {
        stage,
        source: e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingChat, HashEmbedder, ScriptedChat, seed};
    use futures::TryStreamExt;
    use rag_store::RagConfig;

    async fn store_with(dir: &std::path::Path, texts: &[&str]) -> Arc<RagStore> {
        let cfg = RagConfig::new_default(dir.join("db"), dir.join("up"));
        let store = RagStore::open(cfg).unwrap();
        seed(&store, texts).await.unwrap();
        Arc::new(store)
    }

    fn answerer(chat: Arc<dyn ChatModel>, store: Arc<RagStore>) -> RagAnswerer {
        RagAnswerer::new(chat, Arc::new(HashEmbedder), store, ContextorConfig::default())
    }

    #[tokio::test]
    async fn answer_uses_ranked_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            dir.path(),
            &[
                "Bulgogi: beef, soy sauce, pear, garlic.",
                "Kimchi fried rice: rice, kimchi, sesame oil, egg.",
                "Pancakes: flour, milk, eggs.",
            ],
        )
        .await;
        let chat = Arc::new(ScriptedChat::default());
        let qa = answerer(chat.clone(), store)
            .answer(&[], "kimchi fried rice")
            .await
            .unwrap();

        assert_eq!(qa.standalone_question, "kimchi fried rice");
        assert!(qa.used_chunks.len() <= 2);
        assert!(qa.used_chunks[0].text.contains("Kimchi fried rice"));
        assert!(qa.answer.contains("kimchi"));
        assert_eq!(chat.calls(), 1);
        let system = &chat.last_messages()[0].content;
        assert!(system.contains("[1] Kimchi fried rice"));
    }

    #[tokio::test]
    async fn empty_index_answers_dont_know_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &[]).await;
        let chat = Arc::new(ScriptedChat::default());
        let qa = answerer(chat.clone(), store).answer(&[], "tteokbokki?").await.unwrap();
        assert_eq!(qa.answer, NO_CONTEXT_REPLY);
        assert!(qa.used_chunks.is_empty());
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn completion_failure_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["Kimchi fried rice: rice, kimchi."]).await;
        let err = answerer(Arc::new(FailingChat), store)
            .answer(&[], "kimchi rice")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ContextorError::AnswerGeneration {
                stage: AnswerStage::Complete,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stream_yields_fragments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &["Kimchi fried rice: rice, kimchi."]).await;
        let chat = Arc::new(ScriptedChat::new(["Fry the kimchi first."]));
        let s = answerer(chat, store).answer_stream(&[], "kimchi rice").await.unwrap();
        assert_eq!(s.used_chunks.len(), 1);
        let parts: Vec<String> = s.tokens.try_collect().await.unwrap();
        assert_eq!(parts, vec!["Fry ", "the ", "kimchi ", "first."]);
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(dir.path(), &[]).await;
        let err = answerer(Arc::new(ScriptedChat::default()), store)
            .answer(&[], "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, ContextorError::EmptyQuestion));
    }
}
