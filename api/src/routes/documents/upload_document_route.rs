//! POST /documents/{file_name}: ingests a raw PDF/DOC/DOCX body.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use rag_store::IngestOutcome;
use tracing::info;

use crate::{
    core::{app_state::AppState, http::response_envelope::ApiResponse},
    error_handler::AppResult,
};

/// Handler: POST /documents/{file_name}
///
/// `201` with `{status: "indexed", source, chunks}` for a new document,
/// `200` with `{status: "already_indexed", source}` when the name is known.
///
/// # Example
/// ```bash
/// curl -X POST http://127.0.0.1:8080/documents/kimchi.docx \
///   --data-binary @kimchi.docx
/// ```
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    info!(file_name = %file_name, bytes = body.len(), "upload received");
    let outcome = state
        .store
        .ingest_upload(&file_name, &body, state.embedder.as_ref())
        .await?;

    let status = match outcome {
        IngestOutcome::Indexed { .. } => StatusCode::CREATED,
        IngestOutcome::AlreadyIndexed { .. } => StatusCode::OK,
    };
    Ok(ApiResponse::success(outcome).into_response_with_status(status))
}
