//! POST /sessions/{id}/ask: one blocking RAG turn.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use uuid::Uuid;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
    routes::{
        ask::ask_request::{AskRequest, AskResponse},
        sessions::session_routes::lookup,
    },
};

/// Handler: POST /sessions/{id}/ask
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/sessions/$ID/ask \
///   -H 'content-type: application/json' \
///   -d '{"question":"How do I make kimchi fried rice?"}'
/// ```
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> AppResult<ApiResponse<AskResponse>> {
    let Json(body) = body?;
    let handle = lookup(&state, id).await?;
    let mut session = handle.lock().await;
    let started = Instant::now();
    let qa = state.conversation.ask(&mut session, &body.question).await?;
    let top_k = state.conversation.answerer().config().top_k;
    Ok(ApiResponse::success(AskResponse::new(qa, top_k, started.elapsed())))
}
