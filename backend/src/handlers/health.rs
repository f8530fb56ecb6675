use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::response::ApiReply;

pub async fn health_check() -> ApiReply {
    ApiReply::ok(&json!({
        "status": "healthy",
        "service": "alarm-api",
    }))
}

/// CORS preflight; the headers themselves are added by [`ApiReply`].
pub async fn preflight() -> ApiReply {
    ApiReply::no_content()
}

/// Unknown paths still answer preflight requests.
pub async fn fallback(method: Method) -> ApiReply {
    if method == Method::OPTIONS {
        return ApiReply::no_content();
    }
    ApiReply::error(StatusCode::NOT_FOUND, "Not found")
}
