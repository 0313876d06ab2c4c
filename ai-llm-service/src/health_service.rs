//! Reachability probes for the configured LLM backends.
//!
//! - Ollama: `GET {endpoint}/api/tags`, model looked up in `models[].name`
//! - OpenAI-compatible: `GET {endpoint}/v1/models`, model looked up in `data[].id`
//!
//! [`HealthService::check`] never fails; every problem is folded into a
//! [`HealthStatus`] with `ok = false`, which is what `/health` reports.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, HttpError, make_snippet};

/// One probe result, serialized verbatim into the health response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: format!("{:?}", cfg.provider),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// Health checker reusing one HTTP client for every probe.
#[derive(Debug)]
pub struct HealthService {
    client: reqwest::Client,
}

/// Minimal listing shapes; every field is optional so that unknown servers
/// still count as reachable.
#[derive(Debug, Default, Deserialize)]
struct Listing {
    #[serde(default)]
    models: Vec<NamedItem>,
    #[serde(default)]
    data: Vec<NamedItem>,
}

#[derive(Debug, Deserialize)]
struct NamedItem {
    #[serde(alias = "id")]
    name: String,
}

impl HealthService {
    /// Creates the checker with a per-probe timeout (default 10 s).
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        info!(timeout_secs = timeout.as_secs(), "HealthService initialized");
        Ok(Self { client })
    }

    /// Probes a single config.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let started = Instant::now();
        match self.probe(cfg).await {
            Ok((listed, found)) => {
                let latency = started.elapsed().as_millis();
                let message = match (listed, found) {
                    (_, true) => "reachable; model is available",
                    (true, false) => "reachable, but model is not listed",
                    (false, _) => "reachable; model listing unavailable",
                };
                info!(provider = ?cfg.provider, model = %cfg.model, latency_ms = latency, found, "health probe completed");
                // Hosted catalogs may omit aliases, so only Ollama requires the model to be listed.
                let ok = found || !listed || cfg.provider != LlmProvider::Ollama;
                HealthStatus::new(cfg, ok, latency, message)
            }
            Err(err) => {
                let latency = started.elapsed().as_millis();
                warn!(provider = ?cfg.provider, endpoint = %cfg.endpoint, error = %err, "health probe failed");
                HealthStatus::new(cfg, false, latency, err.to_string())
            }
        }
    }

    /// Probes configs one after another.
    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        debug!(count = configs.len(), "running batch health probes");
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    /// Returns `(listing_decoded, model_found)`.
    async fn probe(&self, cfg: &LlmModelConfig) -> Result<(bool, bool), AiLlmError> {
        let base = cfg.endpoint.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(HealthError::InvalidEndpoint(cfg.endpoint.clone()).into());
        }

        let url = match cfg.provider {
            LlmProvider::Ollama => format!("{base}/api/tags"),
            LlmProvider::OpenAI => format!("{base}/v1/models"),
        };
        let mut req = self.client.get(&url);
        if let Some(key) = cfg.api_key.as_deref() {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", key.trim()));
        } else if cfg.provider == LlmProvider::OpenAI {
            return Err(HealthError::Decode("missing API key".into()).into());
        }

        debug!("GET {}", url);
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HealthError::HttpStatus(HttpError {
                status,
                url,
                snippet: make_snippet(&text),
            })
            .into());
        }

        let Ok(listing) = resp.json::<Listing>().await else {
            return Ok((false, false));
        };
        let found = listing
            .models
            .iter()
            .chain(listing.data.iter())
            .any(|m| m.name == cfg.model);
        Ok((true, found))
    }
}
