use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::{DateTime, Utc};
use contextor::{ContextorError, SessionHandle, Turn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
};

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub turns: Vec<Turn>,
}

/// Looks up a live session or fails with `SESSION_NOT_FOUND`.
pub async fn lookup(state: &AppState, id: Uuid) -> AppResult<SessionHandle> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ContextorError::SessionNotFound(id).into())
}

/// Handler: POST /sessions
pub async fn create_session(State(state): State<Arc<AppState>>) -> Response {
    let session_id = state.sessions.create().await;
    ApiResponse::success(SessionCreated { session_id }).into_response_with_status(StatusCode::CREATED)
}

/// Handler: GET /sessions/{id}/history
///
/// Waits for a running turn on the same session to finish.
pub async fn session_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<HistoryResponse>> {
    let handle = lookup(&state, id).await?;
    let session = handle.lock().await;
    Ok(ApiResponse::success(HistoryResponse {
        session_id: session.id(),
        created_at: session.created_at(),
        turns: session.history().to_vec(),
    }))
}
