//! Default LLM configs loaded from environment variables.
//!
//! This module provides convenience constructors for [`LlmModelConfig`],
//! one per role:
//!
//! - **Chat**            → answers user questions
//! - **Rewrite**         → turns follow-up questions into standalone ones (optional)
//! - **Embedding**       → embeds document passages
//! - **Query embedding** → embeds search queries (optional)
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`          = provider kind (`openai` | `upstage` | `ollama`, default `openai`)
//! - `LLM_URL`           = endpoint base override
//! - `LLM_MAX_TOKENS`    = optional max tokens (u32)
//! - `LLM_TEMPERATURE`   = chat temperature (default 0.7)
//! - `LLM_TIMEOUT_SECS`  = request timeout (default 60)
//! - `CHAT_MODEL`, `REWRITE_MODEL`, `EMBEDDING_MODEL`, `EMBEDDING_QUERY_MODEL`
//!
//! OpenAI-compatible:
//! - `UPSTAGE_API_KEY` or `LLM_API_KEY` = credential (mandatory)
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (when `LLM_URL` is unset)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_f32_or, env_opt_u32, env_u64_or, must_env, opt_env,
        validate_http_endpoint, validate_range_f32,
    },
};

/// Upstage exposes an OpenAI-compatible API under `/v1`.
const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.upstage.ai";
const DEFAULT_OPENAI_CHAT_MODEL: &str = "solar-1-mini-chat";
const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "solar-embedding-1-large-passage";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// All four role configs resolved from the environment in one go.
#[derive(Debug, Clone)]
pub struct EnvProfiles {
    pub chat: LlmModelConfig,
    pub rewrite: Option<LlmModelConfig>,
    pub embedding: LlmModelConfig,
    pub query_embedding: Option<LlmModelConfig>,
}

/// Resolves every profile from the environment.
///
/// # Errors
/// Returns [`ConfigError`] variants for missing credentials/models or invalid numbers.
pub fn profiles_from_env() -> Result<EnvProfiles, AiLlmError> {
    let provider = provider_from_env()?;
    let base = base_config(provider)?;

    let chat_model = match provider {
        LlmProvider::OpenAI => {
            opt_env("CHAT_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_CHAT_MODEL.to_string())
        }
        LlmProvider::Ollama => must_env("CHAT_MODEL")?,
    };
    let temperature = env_f32_or("LLM_TEMPERATURE", 0.7)?;
    validate_range_f32("temperature", temperature, 0.0, 2.0)?;

    let chat = LlmModelConfig {
        model: chat_model,
        temperature: Some(temperature),
        ..base.clone()
    };

    // Rewriting should be as deterministic as the backend allows.
    let rewrite = opt_env("REWRITE_MODEL").map(|model| LlmModelConfig {
        model,
        temperature: Some(0.0),
        ..base.clone()
    });

    let embedding_model = match provider {
        LlmProvider::OpenAI => opt_env("EMBEDDING_MODEL")
            .unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string()),
        LlmProvider::Ollama => must_env("EMBEDDING_MODEL")?,
    };
    let query_model = opt_env("EMBEDDING_QUERY_MODEL").or_else(|| query_model_for(&embedding_model));

    let embedding = LlmModelConfig {
        model: embedding_model,
        max_tokens: None,
        temperature: None,
        top_p: None,
        ..base.clone()
    };
    let query_embedding = query_model.map(|model| LlmModelConfig {
        model,
        ..embedding.clone()
    });

    for cfg in [&chat, &embedding] {
        if cfg.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }
    }

    Ok(EnvProfiles {
        chat,
        rewrite,
        embedding,
        query_embedding,
    })
}

/// Reads `LLM_KIND` (default `openai`).
pub fn provider_from_env() -> Result<LlmProvider, AiLlmError> {
    match opt_env("LLM_KIND") {
        Some(kind) => Ok(kind.parse::<LlmProvider>()?),
        None => Ok(LlmProvider::OpenAI),
    }
}

/// Upstage names its embedding pairs `<name>-passage` / `<name>-query`.
///
/// Returns the query twin of a passage model, if the naming applies.
pub fn query_model_for(passage_model: &str) -> Option<String> {
    passage_model
        .strip_suffix("-passage")
        .map(|stem| format!("{stem}-query"))
}

/// Endpoint, credential and shared knobs for the selected provider.
fn base_config(provider: LlmProvider) -> Result<LlmModelConfig, AiLlmError> {
    let (endpoint, api_key) = match provider {
        LlmProvider::OpenAI => {
            let endpoint =
                opt_env("LLM_URL").unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_string());
            let key = opt_env("UPSTAGE_API_KEY")
                .or_else(|| opt_env("LLM_API_KEY"))
                .ok_or(ConfigError::MissingVar("UPSTAGE_API_KEY or LLM_API_KEY"))?;
            (endpoint, Some(key))
        }
        LlmProvider::Ollama => {
            let endpoint = match opt_env("LLM_URL") {
                Some(url) => url,
                None => ollama_endpoint()?,
            };
            (endpoint, opt_env("LLM_API_KEY"))
        }
    };
    validate_http_endpoint("LLM_URL", &endpoint)?;

    Ok(LlmModelConfig {
        provider,
        model: String::new(),
        endpoint,
        api_key,
        max_tokens: env_opt_u32("LLM_MAX_TOKENS")?,
        temperature: None,
        top_p: None,
        timeout_secs: Some(env_u64_or("LLM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
    })
}

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
///
/// # Errors
///
/// - [`ConfigError::MissingVar`] if both are missing
/// - [`ConfigError::InvalidNumber`] if `OLLAMA_PORT` is invalid
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Some(url) = opt_env("OLLAMA_URL") {
        return Ok(url);
    }
    if let Some(port) = opt_env("OLLAMA_PORT") {
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{port}"));
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "LLM_URL, OLLAMA_URL or OLLAMA_PORT",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_models_map_to_query_twins() {
        assert_eq!(
            query_model_for("solar-embedding-1-large-passage").as_deref(),
            Some("solar-embedding-1-large-query")
        );
        assert_eq!(query_model_for("nomic-embed-text"), None);
    }
}
