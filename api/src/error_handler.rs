use ai_llm_service::AiLlmError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::ContextorError;
use rag_store::RagError;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error(transparent)]
    Llm(#[from] AiLlmError),

    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request ---
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upload failures and startup index errors.
    #[error(transparent)]
    Rag(#[from] RagError),

    /// Turn failures.
    #[error(transparent)]
    Contextor(#[from] ContextorError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Llm(AiLlmError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Llm(_) => StatusCode::BAD_GATEWAY,
            AppError::Bind(_) | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,

            AppError::Rag(e) => match e {
                RagError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                RagError::Read(_) => StatusCode::UNPROCESSABLE_ENTITY,
                RagError::Embedding(_) | RagError::Qdrant(_) | RagError::VectorSizeMismatch { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },

            AppError::Contextor(e) => match e {
                ContextorError::EmptyQuestion => StatusCode::BAD_REQUEST,
                ContextorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
                ContextorError::AnswerGeneration { .. } => StatusCode::BAD_GATEWAY,
                ContextorError::Rag(_) | ContextorError::Llm(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Llm(AiLlmError::Config(_)) => "CONFIG_ERROR",
            AppError::Llm(_) => "EXTERNAL_SERVICE_ERROR",
            AppError::Bind(_) => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",

            AppError::Rag(e) => match e {
                RagError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
                RagError::Read(_) => "READ_ERROR",
                RagError::Embedding(_) | RagError::Qdrant(_) | RagError::VectorSizeMismatch { .. } => {
                    "EXTERNAL_SERVICE_ERROR"
                }
                _ => "INTERNAL_ERROR",
            },

            AppError::Contextor(e) => match e {
                ContextorError::EmptyQuestion => "EMPTY_QUESTION",
                ContextorError::SessionNotFound(_) => "SESSION_NOT_FOUND",
                ContextorError::AnswerGeneration { .. } => "ANSWER_GENERATION_ERROR",
                ContextorError::Rag(_) | ContextorError::Llm(_) => "INTERNAL_ERROR",
            },
        }
    }

    /// Message shown to the user. Upstream detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Rag(e) => match e {
                RagError::UnsupportedFormat(ext) if ext.is_empty() => {
                    "Upload failed: the file has no extension. Upload a PDF, DOC or DOCX recipe."
                        .to_string()
                }
                RagError::UnsupportedFormat(ext) => format!(
                    "Upload failed: '{ext}' files are not supported. Upload a PDF, DOC or DOCX recipe."
                ),
                RagError::Read(_) => {
                    "Upload failed: the recipe file could not be read.".to_string()
                }
                RagError::Embedding(_) | RagError::Qdrant(_) | RagError::VectorSizeMismatch { .. } => {
                    "Upload failed: the recipe index is unavailable right now. Please try again."
                        .to_string()
                }
                _ => "Upload failed because of an internal error.".to_string(),
            },
            AppError::Contextor(e) => e.user_message(),
            _ => "Internal server error.".to_string(),
        }
    }

    fn details(&self) -> Vec<ApiErrorDetail> {
        match self {
            AppError::Rag(RagError::UnsupportedFormat(_)) => vec![
                ApiErrorDetail::stage("upload"),
                ApiErrorDetail::hint("Accepted extensions: .pdf, .doc, .docx"),
            ],
            AppError::Rag(_) => vec![ApiErrorDetail::stage("upload")],
            AppError::Contextor(ContextorError::AnswerGeneration { stage, .. }) => {
                vec![ApiErrorDetail::stage(stage)]
            }
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "request failed");
        } else {
            warn!(code = self.error_code(), error = %self, "request rejected");
        }
        ApiResponse::<()>::error(self.error_code(), self.user_message(), self.details())
            .into_response_with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(err.body_text())
    }
}
