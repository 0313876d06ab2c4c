//! Per-conversation state and the in-process registry of sessions.
//!
//! A [`SessionHandle`] wraps the session in an async mutex: one turn per
//! session runs at a time, while different sessions never contend.

use std::collections::HashMap;
use std::sync::Arc;

use ai_llm_service::ChatMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl From<&Turn> for ChatMessage {
    fn from(t: &Turn) -> Self {
        match t.role {
            Role::User => ChatMessage::user(t.text.clone()),
            Role::Assistant => ChatMessage::assistant(t.text.clone()),
        }
    }
}

/// Ordered, append-only list of turns with a unique id.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    turns: Vec<Turn>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: services::uuid::random_uuid(),
            created_at: Utc::now(),
            turns: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            text: text.into(),
        });
    }

    pub fn history(&self) -> &[Turn] {
        &self.turns
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Live sessions of this process. Not persisted.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh session and returns its id.
    pub async fn create(&self) -> Uuid {
        let session = Session::new();
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        debug!(session_id = %id, "session created");
        id
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_keep_conversation_order() {
        let mut s = Session::new();
        s.append_turn(Role::User, "hi");
        s.append_turn(Role::Assistant, "hello");
        let roles: Vec<Role> = s.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(ChatMessage::from(&s.history()[1]), ChatMessage::assistant("hello"));
    }

    #[tokio::test]
    async fn registry_hands_out_independent_sessions() {
        let reg = SessionRegistry::new();
        let a = reg.create().await;
        let b = reg.create().await;
        assert_ne!(a, b);
        assert_eq!(reg.len().await, 2);

        reg.get(a).await.unwrap().lock().await.append_turn(Role::User, "x");
        assert!(reg.get(b).await.unwrap().lock().await.history().is_empty());
        assert!(reg.get(Uuid::nil()).await.is_none());
    }
}
