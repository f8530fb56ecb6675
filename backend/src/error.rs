//! Unified error handling for the HTTP handlers.
//!
//! Handlers return `ApiResult` and use `?` freely; each variant maps to one
//! status code and an `{"error": ...}` body through [`ApiReply`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::oauth::OAuthError;
use crate::response::ApiReply;
use crate::scheduler::SchedulerError;
use crate::storage::StoreError;
use crate::trigger::TriggerError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No caller identity supplied by the authorizer
    #[error("Unauthorized")]
    Unauthorized,

    /// Missing or malformed request data
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found; the message is returned verbatim
    #[error("{0}")]
    NotFound(String),

    /// The identity provider rejected a request; its status and body are passed through
    #[error("Upstream error ({status}): {body}")]
    Upstream { status: StatusCode, body: String },

    /// Anything unexpected
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<TriggerError> for ApiError {
    fn from(err: TriggerError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::Rejected { status, body } => ApiError::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                body,
            },
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let reply = match self {
            ApiError::Unauthorized => ApiReply::error(StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::BadRequest(msg) => {
                tracing::warn!("Rejected request: {}", msg);
                ApiReply::error(StatusCode::BAD_REQUEST, msg)
            }
            ApiError::NotFound(msg) => ApiReply::error(StatusCode::NOT_FOUND, msg),
            ApiError::Upstream { status, body } => {
                tracing::error!("Upstream request failed: {} - {}", status, body);
                ApiReply::error(status, body)
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                ApiReply::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        reply.into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_oauth_keeps_upstream_status() {
        let err: ApiError = OAuthError::Rejected {
            status: 400,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        }
        .into();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ApiError::Internal(anyhow::anyhow!("dynamodb exploded"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
