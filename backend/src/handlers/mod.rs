pub mod alarms;
pub mod calendar;
pub mod health;
pub mod tokens;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};

/// Decode a JSON request body. An empty body yields the default value so
/// field validation can report what is missing.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}
