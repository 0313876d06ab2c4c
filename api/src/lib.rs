//! HTTP surface of the recipe bot.
//!
//! | route | purpose |
//! |---|---|
//! | `GET  /health` | provider probes, index size, live sessions |
//! | `POST /documents/{file_name}` | upload a PDF/DOC/DOCX recipe |
//! | `POST /sessions` | open a conversation |
//! | `GET  /sessions/{id}/history` | ordered turns |
//! | `POST /sessions/{id}/ask` | one turn, JSON answer |
//! | `POST /sessions/{id}/ask/stream` | one turn, SSE tokens |

pub mod core;
pub mod error_handler;
mod middleware_layer;
mod routes;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tokio::signal;
use tracing::{info, warn};

use crate::core::app_state::AppState;
use crate::error_handler::AppError;
use crate::middleware_layer::json_extractor::json_error_mapper;
use crate::routes::{
    ask::{ask_question_route::ask_question, ask_stream_route::ask_question_stream},
    documents::upload_document_route::upload_document,
    health_route::health,
    sessions::session_routes::{create_session, session_history},
};

/// Builds the router over shared `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.settings.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route(
            "/documents/{file_name}",
            post(upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/history", get(session_history))
        .route("/sessions/{id}/ask", post(ask_question))
        .route("/sessions/{id}/ask/stream", post(ask_question_stream))
        .layer(middleware::from_fn(json_error_mapper))
        .with_state(state)
}

/// Loads state from the environment, binds `API_ADDRESS` and serves until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let state = Arc::new(AppState::from_env()?);
    let address = state.settings.address.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(AppError::Bind)?;
    info!(%address, "recipe bot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("server stopped");
    Ok(())
}

/// Resolves when Ctrl+C is pressed.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
