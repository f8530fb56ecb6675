//! The single place where HTTP responses are shaped.
//!
//! Every reply carries the same CORS headers and JSON bodies are either the
//! payload itself or `{"error": <message>}`.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use alarm_shared::api::ErrorResponse;
use serde::Serialize;

const ALLOW_ORIGIN: &str = "*";
const ALLOW_HEADERS: &str = "Content-Type,Authorization";
const ALLOW_METHODS: &str = "OPTIONS,POST,GET";

/// Typed reply used by every handler.
#[derive(Debug)]
pub struct ApiReply {
    status: StatusCode,
    body: Option<serde_json::Value>,
}

impl ApiReply {
    /// 200 with `payload` as the JSON body.
    pub fn ok<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body: Some(body),
            },
            Err(e) => {
                tracing::error!("Failed to serialize response body: {}", e);
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }

    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        let body = serde_json::to_value(ErrorResponse::new(message))
            .unwrap_or(serde_json::Value::Null);
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        apply_cors(response.headers_mut());
        response
    }
}

pub fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
}

/// Router-level hook so responses produced outside the handlers (method
/// rejections, health checks) carry the headers too.
pub async fn with_cors(mut response: Response) -> Response {
    apply_cors(response.headers_mut());
    response
}
