//! GET /health: provider probes plus index and session counts.

use std::sync::Arc;

use ai_llm_service::health_service::HealthStatus;
use axum::extract::State;
use serde::Serialize;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when every probe passed, `degraded` otherwise.
    pub status: &'static str,
    pub providers: Vec<HealthStatus>,
    pub index_entries: usize,
    pub sessions: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> AppResult<ApiResponse<HealthResponse>> {
    let providers = match &state.llm {
        Some(llm) => llm.health_all().await,
        None => Vec::new(),
    };
    let index_entries = state.store.len().await?;
    let sessions = state.sessions.len().await;

    let status = if providers.iter().all(|p| p.ok) {
        "ok"
    } else {
        "degraded"
    };
    Ok(ApiResponse::success(HealthResponse {
        status,
        providers,
        index_entries,
        sessions,
    }))
}
