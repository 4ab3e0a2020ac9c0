//! HTTP error responses

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use candor_core::CandorError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] CandorError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(e) => match e {
                CandorError::Validation { .. } => StatusCode::BAD_REQUEST,
                CandorError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                CandorError::Forbidden(_) => StatusCode::FORBIDDEN,
                CandorError::NotFound(_) => StatusCode::NOT_FOUND,
                CandorError::Conflict(_) => StatusCode::CONFLICT,
                CandorError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                CandorError::Config(_) | CandorError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::MalformedPayload(_) => "malformed_payload",
            ApiError::Domain(e) => match e {
                CandorError::Validation { .. } => "invalid_data",
                CandorError::Unauthorized(_) => "unauthorized",
                CandorError::Forbidden(_) => "forbidden",
                CandorError::NotFound(_) => "not_found",
                CandorError::Conflict(_) => "conflict",
                CandorError::StoreUnavailable(_) => "store_unavailable",
                CandorError::Config(_) | CandorError::Internal(_) => "internal",
            },
        }
    }

    fn body(self) -> ErrorBody {
        let code = self.code();
        let (message, errors) = match self {
            ApiError::MalformedPayload(detail) => {
                ("Invalid data".to_string(), vec![detail])
            }
            ApiError::Domain(CandorError::Validation { message, errors }) => (message, errors),
            ApiError::Domain(CandorError::Unauthorized(m))
            | ApiError::Domain(CandorError::Forbidden(m))
            | ApiError::Domain(CandorError::Conflict(m)) => (m, Vec::new()),
            ApiError::Domain(CandorError::NotFound(what)) => {
                (format!("{} not found", capitalize(&what)), Vec::new())
            }
            ApiError::Domain(CandorError::StoreUnavailable(_)) => (
                "Service temporarily unavailable".to_string(),
                Vec::new(),
            ),
            ApiError::Domain(_) => ("Internal server error".to_string(), Vec::new()),
        };
        ErrorBody {
            message,
            code,
            errors,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedPayload(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::MalformedPayload(rejection.body_text())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (CandorError::validation("bad"), StatusCode::BAD_REQUEST),
            (
                CandorError::Unauthorized("no".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (CandorError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (CandorError::NotFound("user 9".into()), StatusCode::NOT_FOUND),
            (CandorError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                CandorError::StoreUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CandorError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_validation_body_lists_errors() {
        let err = CandorError::invalid_fields("Invalid data", vec!["strengths is required".into()]);
        let (status, body) = render(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid data");
        assert_eq!(body["code"], "invalid_data");
        assert_eq!(body["errors"][0], "strengths is required");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (_, body) = render(CandorError::Internal("secret detail".into()).into()).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("errors").is_none());

        let (_, body) = render(CandorError::NotFound("feedback 4".into()).into()).await;
        assert_eq!(body["message"], "Feedback 4 not found");
    }
}
