//! Turn driver: records the conversation around [`RagAnswerer`] calls.
//!
//! - The user turn is appended before answering; prior turns are never touched.
//! - The assistant turn is appended only for a complete answer. A failed turn
//!   leaves just the user turn; the caller renders the error.
//! - A streamed turn holds the session lock until the stream ends or is
//!   dropped. Dropping it early (client went away) appends nothing.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use crate::answer::{QaAnswer, RagAnswerer, TokenStream, UsedChunk};
use crate::error::ContextorError;
use crate::session::{Role, Session, SessionHandle};

pub struct Conversation {
    answerer: Arc<RagAnswerer>,
}

impl Conversation {
    pub fn new(answerer: Arc<RagAnswerer>) -> Self {
        Self { answerer }
    }

    pub fn answerer(&self) -> &RagAnswerer {
        &self.answerer
    }

    /// Runs one blocking turn on `session`.
    #[instrument(skip_all, fields(session_id = %session.id()))]
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<QaAnswer, ContextorError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ContextorError::EmptyQuestion);
        }
        let prior = session.history().len();
        session.append_turn(Role::User, question);

        match self.answerer.answer(&session.history()[..prior], question).await {
            Ok(qa) => {
                session.append_turn(Role::Assistant, qa.answer.clone());
                info!(turns = session.history().len(), "turn completed");
                Ok(qa)
            }
            Err(e) => {
                warn!(error = %e, "turn failed");
                Err(e)
            }
        }
    }

    /// Starts a streamed turn; the session stays locked while it is alive.
    pub async fn ask_stream(
        &self,
        handle: SessionHandle,
        question: &str,
    ) -> Result<StreamedTurn, ContextorError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ContextorError::EmptyQuestion);
        }
        let mut session = handle.lock_owned().await;
        let session_id = session.id();
        let prior = session.history().len();
        session.append_turn(Role::User, question);

        let s = match self
            .answerer
            .answer_stream(&session.history()[..prior], question)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "streamed turn failed to start");
                return Err(e);
            }
        };
        debug!(session_id = %session_id, chunks = s.used_chunks.len(), "streamed turn started");

        Ok(StreamedTurn {
            standalone_question: s.standalone_question,
            used_chunks: s.used_chunks,
            tokens: s.tokens,
            session: Some(session),
            text: String::new(),
            finished: false,
        })
    }
}

/// Answer fragments of one turn. The full text becomes the assistant turn
/// when the underlying stream ends without error.
pub struct StreamedTurn {
    pub standalone_question: String,
    pub used_chunks: Vec<UsedChunk>,
    tokens: TokenStream,
    session: Option<OwnedMutexGuard<Session>>,
    text: String,
    finished: bool,
}

impl StreamedTurn {
    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn release(&mut self, commit: bool) {
        self.finished = true;
        if let Some(mut session) = self.session.take() {
            if commit {
                session.append_turn(Role::Assistant, self.text.clone());
                info!(session_id = %session.id(), turns = session.history().len(), "streamed turn completed");
            } else {
                warn!(session_id = %session.id(), "streamed turn failed; no assistant turn recorded");
            }
        }
    }
}

impl Stream for StreamedTurn {
    type Item = Result<String, ContextorError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.tokens.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                self.text.push_str(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.release(false);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.release(true);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for StreamedTurn {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            debug!(session_id = %session.id(), received = self.text.len(), "streamed turn cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ContextorConfig;
    use crate::session::SessionRegistry;
    use crate::test_utils::{AnswerFailingChat, HashEmbedder, ScriptedChat, seed};
    use futures::TryStreamExt;
    use rag_store::{RagConfig, RagStore};

    async fn conversation(dir: &std::path::Path, chat: Arc<dyn crate::ChatModel>) -> Conversation {
        let store = RagStore::open(RagConfig::new_default(dir.join("db"), dir.join("up"))).unwrap();
        seed(&store, &["Kimchi fried rice: rice, kimchi, sesame oil, egg."])
            .await
            .unwrap();
        let answerer = RagAnswerer::new(
            chat,
            Arc::new(HashEmbedder),
            Arc::new(store),
            ContextorConfig::default(),
        );
        Conversation::new(Arc::new(answerer))
    }

    #[tokio::test]
    async fn blocking_turn_records_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let conv = conversation(dir.path(), Arc::new(ScriptedChat::new(["Fry it, you donkey."]))).await;
        let mut s = Session::new();
        let qa = conv.ask(&mut s, "kimchi fried rice?").await.unwrap();
        assert_eq!(qa.answer, "Fry it, you donkey.");
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.history()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn streamed_turn_commits_on_completion() {
        let dir = tempfile::tempdir().unwrap();
        let conv = conversation(dir.path(), Arc::new(ScriptedChat::new(["Use day-old rice."]))).await;
        let reg = SessionRegistry::new();
        let id = reg.create().await;
        let handle = reg.get(id).await.unwrap();

        let turn = conv.ask_stream(handle.clone(), "kimchi rice").await.unwrap();
        let parts: Vec<String> = turn.try_collect().await.unwrap();
        assert_eq!(parts.concat(), "Use day-old rice.");

        let s = handle.lock().await;
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.history()[1].text, "Use day-old rice.");
    }

    #[tokio::test]
    async fn dropped_stream_records_no_answer() {
        let dir = tempfile::tempdir().unwrap();
        let conv = conversation(dir.path(), Arc::new(ScriptedChat::new(["one two three"]))).await;
        let reg = SessionRegistry::new();
        let handle = reg.get(reg.create().await).await.unwrap();

        let mut turn = conv.ask_stream(handle.clone(), "kimchi rice").await.unwrap();
        assert_eq!(turn.next().await.unwrap().unwrap(), "one ");
        drop(turn);

        let s = handle.lock().await;
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.history()[0].role, Role::User);
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_the_turn_without_answer() {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(AnswerFailingChat {
            first: "Right, ".into(),
        });
        let conv = conversation(dir.path(), chat).await;
        let reg = SessionRegistry::new();
        let handle = reg.get(reg.create().await).await.unwrap();

        let mut turn = conv.ask_stream(handle.clone(), "kimchi rice").await.unwrap();
        assert!(turn.next().await.unwrap().is_ok());
        assert!(turn.next().await.unwrap().is_err());
        assert!(turn.next().await.is_none());
        drop(turn);

        assert_eq!(handle.lock().await.history().len(), 1);
    }
}
