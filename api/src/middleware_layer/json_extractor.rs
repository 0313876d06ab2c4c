//! Rewraps axum's plain-text rejections (bad JSON, bad path params, body too
//! large, unknown route) into the JSON envelope. Responses that are already
//! JSON, and SSE streams, pass through untouched.

use axum::{
    body::{Body, Bytes},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use crate::core::http::response_envelope::{ApiErrorDetail, ApiResponse};

const REQUEST_ID: &str = "X-Request-Id";

/// Rejection bodies are short; anything larger is dropped.
const MAX_REJECTION_BODY: usize = 64 * 1024;

fn is_json(parts: &axum::http::response::Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

fn code_for(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        _ => "UNPROCESSABLE_ENTITY",
    }
}

fn hint_for(status: StatusCode, original: &str) -> Option<String> {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Some("The upload exceeds MAX_UPLOAD_BYTES.".into())
    } else if original.contains("UUID") || original.contains("uuid") {
        Some("Session ids are UUIDs returned by POST /sessions.".into())
    } else if original.contains("missing field `question`") {
        Some("Send a JSON object like { \"question\": \"...\" }.".into())
    } else if original.contains("Content-Type") {
        Some("Set 'Content-Type: application/json'.".into())
    } else {
        None
    }
}

fn ensure_request_id(parts: &mut axum::http::response::Parts) -> String {
    if let Some(v) = parts.headers.get(REQUEST_ID).and_then(|h| h.to_str().ok()) {
        if !v.trim().is_empty() {
            return v.to_string();
        }
    }
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let id = format!("req-{nanos}");
    if let Ok(v) = HeaderValue::from_str(&id) {
        parts.headers.insert(REQUEST_ID, v);
    }
    id
}

pub async fn json_error_mapper(req: Request<Body>, next: Next) -> Response {
    let res = next.run(req).await;
    let status = res.status();
    if !status.is_client_error() {
        return res;
    }

    let (mut parts, body) = res.into_parts();
    if is_json(&parts) {
        return Response::from_parts(parts, body);
    }

    let bytes: Bytes = axum::body::to_bytes(body, MAX_REJECTION_BODY)
        .await
        .unwrap_or_default();
    let original = String::from_utf8_lossy(&bytes);
    let request_id = ensure_request_id(&mut parts);
    debug!(%status, request_id = %request_id, "wrapping rejection into envelope");

    let message = match original.trim() {
        "" => status.canonical_reason().unwrap_or("request rejected").to_string(),
        text => text.to_string(),
    };
    let details = hint_for(status, &original)
        .map(|h| vec![ApiErrorDetail::hint(h)])
        .unwrap_or_default();
    let envelope = ApiResponse::<()>::error(code_for(status), message, details);

    let body = match serde_json::to_vec(&envelope) {
        Ok(v) => v,
        Err(_) => bytes.to_vec(),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Response::from_parts(parts, Body::from(body))
}
