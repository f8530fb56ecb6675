use alarm_shared::api::CalendarEventsResponse;
use anyhow::Context;
use axum::extract::State;
use chrono::Utc;

use crate::auth::CallerIdentity;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiReply;
use crate::AppState;

/// Number of upcoming events returned per request.
pub const UPCOMING_EVENT_LIMIT: i32 = 10;

/// `GET|POST /calendar`: list the caller's next upcoming events, refreshing
/// the stored access token first when it has expired.
pub async fn list_upcoming(
    State(state): State<AppState>,
    CallerIdentity(user_id): CallerIdentity,
) -> ApiResult<ApiReply> {
    let record = state
        .tokens
        .get(&user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No tokens found for user_id {}", user_id)))?;

    let access_token = if !record.is_expired_at(Utc::now()) {
        record.access_token
    } else if let Some(refresh_token) = record.refresh_token.as_deref() {
        tracing::info!(user_id = %user_id, "Access token expired, refreshing");
        let refreshed = state
            .oauth
            .refresh(refresh_token)
            .await
            .context("Failed to refresh access token")?;
        state
            .tokens
            .update_access_token(&user_id, &refreshed.access_token, refreshed.expires_at)
            .await?;
        refreshed.access_token
    } else {
        tracing::warn!(user_id = %user_id, "Access token expired and no refresh token stored");
        record.access_token
    };

    let events = state
        .calendar
        .upcoming_events(&access_token, UPCOMING_EVENT_LIMIT)
        .await?;

    tracing::debug!(user_id = %user_id, count = events.len(), "Fetched upcoming events");

    Ok(ApiReply::ok(&CalendarEventsResponse { events }))
}
