//! API error responses

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dreamlog_core::{
    ConversationError, InterpretationError, RateLimitDecision, RateLimitError, StorageError,
    SummaryError,
};
use serde_json::json;
use tracing::error;

/// Every failure an endpoint can answer with
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Admission denied; the body is the decision itself
    #[error("rate limited")]
    RateLimited(RateLimitDecision),
    #[error("text generation failed: {0}")]
    Upstream(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad_request", "message": message })),
            )
                .into_response(),
            ApiError::RateLimited(decision) => {
                (StatusCode::TOO_MANY_REQUESTS, Json(decision)).into_response()
            }
            ApiError::Upstream(message) => {
                error!(%message, "Upstream text generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "upstream_failure" })),
                )
                    .into_response()
            }
            ApiError::Storage(message) => {
                error!(%message, "Storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "storage_failure" })),
                )
                    .into_response()
            }
            ApiError::Unavailable(message) => {
                error!(%message, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "unavailable" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<RateLimitError> for ApiError {
    fn from(e: RateLimitError) -> Self {
        match e {
            RateLimitError::BadRequest(message) => ApiError::BadRequest(message),
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

impl From<SummaryError> for ApiError {
    fn from(e: SummaryError) -> Self {
        ApiError::Storage(e.to_string())
    }
}

impl From<InterpretationError> for ApiError {
    fn from(e: InterpretationError) -> Self {
        match e {
            InterpretationError::Upstream(e) => ApiError::Upstream(e.to_string()),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<ConversationError> for ApiError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::BadRequest(message) => ApiError::BadRequest(message),
            ConversationError::Upstream(e) => ApiError::Upstream(e.to_string()),
            other => ApiError::Storage(other.to_string()),
        }
    }
}
