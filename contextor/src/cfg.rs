//! Runtime configuration loaded from environment variables.

use ai_llm_service::AiLlmError;
use ai_llm_service::error_handler::{ConfigError, env_f32_or, env_u64_or, opt_env};

use crate::prompt::{DEFAULT_PERSONA, HistoryBudget};

/// Retrieval and prompt knobs. All fields have defaults via [`Default`].
#[derive(Clone, Debug)]
pub struct ContextorConfig {
    /// Chunks fetched per question (`RAG_TOP_K`, >= 1).
    pub top_k: usize,
    /// Hits scoring at or below this are dropped before prompting.
    pub score_floor: f32,
    /// Character budget of the context block.
    pub max_ctx_chars: usize,
    /// History kept in prompts, newest first.
    pub history: HistoryBudget,
    /// System persona preceding the context.
    pub persona: String,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            score_floor: 0.0,
            max_ctx_chars: 6000,
            history: HistoryBudget::default(),
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl ContextorConfig {
    /// Reads `RAG_TOP_K`, `SCORE_FLOOR`, `MAX_CTX_CHARS`, `MAX_HISTORY_TURNS`,
    /// `MAX_HISTORY_CHARS` and `BOT_PERSONA`.
    ///
    /// # Errors
    /// [`ConfigError::InvalidNumber`] for unparsable numbers and
    /// [`ConfigError::OutOfRange`] when `RAG_TOP_K` is 0.
    pub fn from_env() -> Result<Self, AiLlmError> {
        let d = Self::default();
        let cfg = Self {
            top_k: env_u64_or("RAG_TOP_K", d.top_k as u64)? as usize,
            score_floor: env_f32_or("SCORE_FLOOR", d.score_floor)?,
            max_ctx_chars: env_u64_or("MAX_CTX_CHARS", d.max_ctx_chars as u64)? as usize,
            history: HistoryBudget {
                max_turns: env_u64_or("MAX_HISTORY_TURNS", d.history.max_turns as u64)? as usize,
                max_chars: env_u64_or("MAX_HISTORY_CHARS", d.history.max_chars as u64)? as usize,
            },
            persona: opt_env("BOT_PERSONA").unwrap_or(d.persona),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AiLlmError> {
        if self.top_k == 0 {
            return Err(ConfigError::OutOfRange {
                field: "RAG_TOP_K",
                detail: "must be >= 1",
            }
            .into());
        }
        Ok(())
    }
}
