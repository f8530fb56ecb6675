use alarm_shared::api::ExchangeRequest;
use alarm_shared::TokenRecord;
use axum::{body::Bytes, extract::State};
use chrono::Utc;
use validator::Validate;

use super::parse_body;
use crate::auth::CallerIdentity;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiReply;
use crate::AppState;

/// `POST /exchange`: trade an authorization code and PKCE verifier for
/// Google tokens and store them for the caller.
pub async fn exchange_code(
    State(state): State<AppState>,
    CallerIdentity(user_id): CallerIdentity,
    body: Bytes,
) -> ApiResult<ApiReply> {
    let request: ExchangeRequest = parse_body(&body)?;

    let (code, code_verifier) = match (request.validate(), request.code, request.code_verifier) {
        (Ok(()), Some(code), Some(verifier)) => (code, verifier),
        _ => return Err(ApiError::bad_request("code and code_verifier are required")),
    };

    let tokens = state.oauth.exchange_code(&code, &code_verifier).await?;

    // Google only sends a refresh token on first consent
    let refresh_token = match tokens.refresh_token.clone() {
        Some(token) => Some(token),
        None => state
            .tokens
            .get(&user_id)
            .await?
            .and_then(|existing| existing.refresh_token),
    };

    let record = TokenRecord {
        user_id: user_id.clone(),
        access_token: tokens.access_token.clone(),
        refresh_token,
        expires_at: Utc::now().timestamp() + tokens.expires_in.unwrap_or(0),
        code: Some(code),
    };
    state.tokens.put(&record).await?;

    tracing::info!(user_id = %user_id, expires_at = record.expires_at, "Stored Google tokens");

    Ok(ApiReply::ok(&tokens))
}
