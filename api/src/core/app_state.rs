use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use ai_llm_service::error_handler::{env_u64_or, opt_env};
use contextor::{ContextorConfig, Conversation, RagAnswerer, SessionRegistry};
use rag_store::{EmbeddingsProvider, LlmEmbedder, RagConfig, RagStore};
use tracing::info;

use crate::error_handler::AppError;

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// HTTP-level settings.
#[derive(Clone, Debug)]
pub struct ApiSettings {
    /// Bind address (`API_ADDRESS`).
    pub address: String,
    /// Request body limit for uploads (`MAX_UPLOAD_BYTES`).
    pub max_upload_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8080".into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES as usize,
        }
    }
}

impl ApiSettings {
    pub fn from_env() -> Result<Self, AppError> {
        let address = opt_env("API_ADDRESS").unwrap_or_else(|| Self::default().address);
        let max_upload_bytes = env_u64_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        Ok(Self {
            address,
            max_upload_bytes: usize::try_from(max_upload_bytes).unwrap_or(usize::MAX),
        })
    }
}

/// Shared state for all HTTP handlers.
pub struct AppState {
    pub conversation: Conversation,
    pub store: Arc<RagStore>,
    /// Passage embedder used for uploads.
    pub embedder: Arc<dyn EmbeddingsProvider>,
    pub sessions: SessionRegistry,
    /// Provider profiles probed by `/health`; `None` when running on fakes.
    pub llm: Option<Arc<LlmServiceProfiles>>,
    pub settings: ApiSettings,
}

impl AppState {
    /// Wires the pipeline from already-built parts.
    pub fn new(
        conversation: Conversation,
        store: Arc<RagStore>,
        embedder: Arc<dyn EmbeddingsProvider>,
        settings: ApiSettings,
    ) -> Self {
        Self {
            conversation,
            store,
            embedder,
            sessions: SessionRegistry::new(),
            llm: None,
            settings,
        }
    }

    /// Loads every layer from environment variables and opens the index.
    ///
    /// # Errors
    /// Any configuration error is fatal at startup.
    pub fn from_env() -> Result<Self, AppError> {
        let settings = ApiSettings::from_env()?;
        let rag_cfg = RagConfig::from_env()?;
        let ctx_cfg = ContextorConfig::from_env()?;
        let llm = Arc::new(LlmServiceProfiles::from_env()?);

        let embedder: Arc<dyn EmbeddingsProvider> =
            Arc::new(LlmEmbedder::new(llm.clone(), rag_cfg.embedding_dim));
        let store = Arc::new(RagStore::open(rag_cfg)?);
        let answerer = RagAnswerer::new(llm.clone(), embedder.clone(), store.clone(), ctx_cfg);

        info!(
            address = %settings.address,
            max_upload_bytes = settings.max_upload_bytes,
            backend = ?store.config().backend,
            "application state ready"
        );

        let mut state = Self::new(
            Conversation::new(Arc::new(answerer)),
            store,
            embedder,
            settings,
        );
        state.llm = Some(llm);
        Ok(state)
    }
}
