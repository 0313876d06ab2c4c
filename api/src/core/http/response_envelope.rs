use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Envelope shared by every JSON response: `{success, data}` or `{success, error}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Stable, machine-readable code, e.g. `UNSUPPORTED_FORMAT`.
    pub code: &'static str,
    /// Message safe to show to the end user.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    /// Pipeline stage that failed (`upload`, `rewrite`, `embed`, `search`, `complete`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ApiErrorDetail {
    pub fn stage(stage: impl ToString) -> Self {
        Self {
            stage: Some(stage.to_string()),
            hint: None,
        }
    }

    pub fn hint(hint: impl Into<String>) -> Self {
        Self {
            stage: None,
            hint: Some(hint.into()),
        }
    }
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(
        code: &'static str,
        message: impl Into<String>,
        details: Vec<ApiErrorDetail>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
                details,
            }),
        }
    }

    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        self.into_response_with_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_omits_data() {
        let env = ApiResponse::<()>::error(
            "READ_ERROR",
            "That recipe file could not be read.",
            vec![ApiErrorDetail::stage("upload")],
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["success"], false);
        assert!(v.get("data").is_none());
        assert_eq!(v["error"]["code"], "READ_ERROR");
        assert_eq!(v["error"]["details"][0]["stage"], "upload");
        assert!(v["error"]["details"][0].get("hint").is_none());
    }

    #[test]
    fn success_envelope_omits_error() {
        let v = serde_json::to_value(ApiResponse::success(3)).unwrap();
        assert_eq!(v, serde_json::json!({"success": true, "data": 3}));
    }
}
