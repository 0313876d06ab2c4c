//! Shared LLM service with four logical profiles: `chat`, `rewrite`,
//! `embedding` and `query_embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (provider+endpoint+model+key+timeout).
//! - Every call runs under a [`CallPolicy`] (timeout plus one retry on transient failures).
//! - `rewrite` falls back to `chat`, `query_embedding` falls back to `embedding`.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::{ChatMessage, LlmServiceProfiles};
//!
//! # async fn run() -> Result<(), ai_llm_service::AiLlmError> {
//! let svc = Arc::new(LlmServiceProfiles::from_env()?);
//! let reply = svc.chat(&[ChatMessage::user("What goes into kimchi fried rice?")]).await?;
//! let vector = svc.embed_query("kimchi fried rice").await?;
//! println!("{reply} / dim={}", vector.len());
//! # Ok(()) }
//! ```

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    chat::ChatMessage,
    config::{
        default_config::profiles_from_env, llm_model_config::LlmModelConfig,
        llm_provider::LlmProvider,
    },
    error_handler::AiLlmError,
    health_service::{HealthService, HealthStatus},
    retry::CallPolicy,
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
    streaming::TextStream,
};

/// Provider client behind one cached config.
#[derive(Debug)]
enum Client {
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

impl Client {
    fn new(cfg: &LlmModelConfig) -> Result<Self, AiLlmError> {
        Ok(match cfg.provider {
            LlmProvider::Ollama => Client::Ollama(OllamaService::new(cfg.clone())?),
            LlmProvider::OpenAI => Client::OpenAI(OpenAiService::new(cfg.clone())?),
        })
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        match self {
            Client::Ollama(c) => c.chat(messages).await,
            Client::OpenAI(c) => c.chat(messages).await,
        }
    }

    async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TextStream, AiLlmError> {
        match self {
            Client::Ollama(c) => c.chat_stream(messages).await,
            Client::OpenAI(c) => c.chat_stream(messages).await,
        }
    }

    async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match self {
            Client::Ollama(c) => c.embeddings(input).await,
            Client::OpenAI(c) => c.embeddings(input).await,
        }
    }
}

/// Shared service managing the chat, rewrite and embedding profiles.
#[derive(Debug)]
pub struct LlmServiceProfiles {
    chat: LlmModelConfig,
    rewrite: LlmModelConfig,
    embedding: LlmModelConfig,
    query_embedding: LlmModelConfig,
    policy: CallPolicy,

    clients: RwLock<HashMap<ClientKey, Arc<Client>>>,
    health: HealthService,
}

impl LlmServiceProfiles {
    /// Creates a new service.
    ///
    /// - `rewrite_opt`: dedicated rewrite profile; `None` reuses `chat`.
    /// - `query_embedding_opt`: dedicated query-side embedding profile; `None` reuses `embedding`.
    /// - `health_timeout_secs`: optional timeout for the health checker.
    pub fn new(
        chat: LlmModelConfig,
        rewrite_opt: Option<LlmModelConfig>,
        embedding: LlmModelConfig,
        query_embedding_opt: Option<LlmModelConfig>,
        policy: CallPolicy,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        let rewrite = rewrite_opt.unwrap_or_else(|| chat.clone());
        let query_embedding = query_embedding_opt.unwrap_or_else(|| embedding.clone());

        info!(
            chat = %chat.model,
            rewrite = %rewrite.model,
            embedding = %embedding.model,
            query_embedding = %query_embedding.model,
            timeout_secs = policy.timeout.as_secs(),
            max_retries = policy.max_retries,
            "LLM profiles configured"
        );

        Ok(Self {
            chat,
            rewrite,
            embedding,
            query_embedding,
            policy,
            clients: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Builds every profile from environment variables.
    pub fn from_env() -> Result<Self, AiLlmError> {
        let p = profiles_from_env()?;
        Self::new(
            p.chat,
            p.rewrite,
            p.embedding,
            p.query_embedding,
            CallPolicy::from_env()?,
            None,
        )
    }

    /// Answers with the **chat** profile.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let cli = self.client_for(&self.chat).await?;
        self.policy.run("chat", || cli.chat(messages)).await
    }

    /// Rewrites with the **rewrite** profile (falls back to chat).
    pub async fn rewrite(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let cli = self.client_for(&self.rewrite).await?;
        self.policy.run("rewrite", || cli.chat(messages)).await
    }

    /// Opens a token stream with the **chat** profile.
    ///
    /// The policy covers opening the stream only; once tokens flow, a failure
    /// surfaces as an `Err` item and is not retried.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<TextStream, AiLlmError> {
        let cli = self.client_for(&self.chat).await?;
        self.policy
            .run("chat_stream", || cli.chat_stream(messages))
            .await
    }

    /// Embeds a document passage with the **embedding** profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let cli = self.client_for(&self.embedding).await?;
        self.policy.run("embed", || cli.embeddings(input)).await
    }

    /// Embeds a search query with the **query_embedding** profile.
    pub async fn embed_query(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let cli = self.client_for(&self.query_embedding).await?;
        self.policy
            .run("embed_query", || cli.embeddings(input))
            .await
    }

    /// Returns a health snapshot for all distinct profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list: Vec<LlmModelConfig> = Vec::with_capacity(4);
        for cfg in [&self.chat, &self.rewrite, &self.embedding, &self.query_embedding] {
            if !list.contains(cfg) {
                list.push(cfg.clone());
            }
        }
        self.health.check_many(&list).await
    }

    /// Returns `(chat, rewrite, embedding, query_embedding)`.
    pub fn profiles(
        &self,
    ) -> (
        &LlmModelConfig,
        &LlmModelConfig,
        &LlmModelConfig,
        &LlmModelConfig,
    ) {
        (
            &self.chat,
            &self.rewrite,
            &self.embedding,
            &self.query_embedding,
        )
    }

    /* --------------------- Internals --------------------- */

    async fn client_for(&self, cfg: &LlmModelConfig) -> Result<Arc<Client>, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.clients.read().await.get(&key).cloned() {
            return Ok(cli);
        }
        let mut w = self.clients.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        debug!(provider = ?cfg.provider, model = %cfg.model, "creating provider client");
        let cli = Arc::new(Client::new(cfg)?);
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Option<u64>,
}

// The credential is part of the key but never printed.
impl std::fmt::Debug for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientKey")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn openai(endpoint: &str, model: &str) -> LlmModelConfig {
        LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: model.into(),
            endpoint: endpoint.into(),
            api_key: Some("k".into()),
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    fn quick() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 1,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_once_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "recovered"}}]
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let chat = openai(&server.uri(), "solar-1-mini-chat");
        let svc = LlmServiceProfiles::new(chat.clone(), None, chat, None, quick(), Some(1)).unwrap();
        let out = svc.chat(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(out, "recovered");
    }

    #[tokio::test]
    async fn query_embedding_uses_its_own_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(wiremock::matchers::body_partial_json(
                json!({"model": "emb-query"}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [{"embedding": [1.0, 0.0]}]})),
            )
            .mount(&server)
            .await;

        let chat = openai(&server.uri(), "chat");
        let passage = openai(&server.uri(), "emb-passage");
        let query = openai(&server.uri(), "emb-query");
        let svc =
            LlmServiceProfiles::new(chat, None, passage, Some(query), quick(), Some(1)).unwrap();
        assert_eq!(svc.embed_query("rice").await.unwrap(), vec![1.0, 0.0]);
        // The passage model has no mock, so it fails with a 404.
        assert!(svc.embed("rice").await.is_err());
    }

    #[test]
    fn fallbacks_reuse_primary_profiles() {
        let chat = openai("http://localhost:1", "chat");
        let emb = openai("http://localhost:1", "emb");
        let svc = LlmServiceProfiles::new(chat.clone(), None, emb.clone(), None, quick(), None)
            .unwrap();
        let (c, r, e, q) = svc.profiles();
        assert_eq!(c, r);
        assert_eq!(e, q);
        assert_eq!(c, &chat);
        assert_eq!(e, &emb);
    }

    #[tokio::test]
    async fn debug_output_hides_credentials() {
        let mut chat = openai("http://localhost:1", "chat");
        chat.api_key = Some("sk-recipe-secret".into());
        let svc = LlmServiceProfiles::new(chat.clone(), None, chat.clone(), None, quick(), None)
            .unwrap();
        svc.client_for(&chat).await.unwrap();

        let key = format!("{:?}", ClientKey::from(&chat));
        assert!(key.contains("***"));
        assert!(!key.contains("sk-recipe-secret"));
        assert!(!format!("{svc:?}").contains("sk-recipe-secret"));
    }
}
