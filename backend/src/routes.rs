use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{alarms, calendar, health, tokens};
use crate::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health::health_check).options(health::preflight))

        // Google token exchange
        .route(
            "/exchange",
            post(tokens::exchange_code).options(health::preflight),
        )

        // Upcoming calendar events
        .route(
            "/calendar",
            get(calendar::list_upcoming)
                .post(calendar::list_upcoming)
                .options(health::preflight),
        )

        // Alarm schedules
        .route(
            "/alarm",
            post(alarms::create_alarm).options(health::preflight),
        )
        .fallback(health::fallback)
}
