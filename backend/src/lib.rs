//! HTTP functions of the wake-up alarm system: Google token exchange,
//! upcoming calendar events, and alarm scheduling.

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod oauth;
pub mod response;
pub mod routes;
pub mod scheduler;
pub mod storage;
pub mod trigger;

use anyhow::Result;
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::calendar::{CalendarApi, GoogleCalendar};
use crate::config::{AppConfig, StorageBackend};
use crate::oauth::{GoogleOAuth, OAuthProvider};
use crate::scheduler::{AlarmScheduler, EventBridgeScheduler, EventBridgeTarget};
use crate::storage::{
    DynamoScheduleStore, DynamoTokenStore, MemoryScheduleStore, MemoryTokenStore, ScheduleStore,
    TokenStore,
};

/// Collaborators shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<dyn TokenStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub calendar: Arc<dyn CalendarApi>,
    pub scheduler: Arc<dyn AlarmScheduler>,
    /// Caller identity when no authorizer claims are present
    pub dev_user_id: Option<String>,
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let (tokens, schedules): (Arc<dyn TokenStore>, Arc<dyn ScheduleStore>) =
            match config.storage_backend {
                StorageBackend::DynamoDb => (
                    Arc::new(DynamoTokenStore::new(&aws_config, &config.token_table)),
                    Arc::new(DynamoScheduleStore::new(&aws_config, &config.schedule_table)),
                ),
                StorageBackend::Memory => {
                    tracing::warn!("Using in-memory storage; records are lost on restart");
                    (
                        Arc::new(MemoryTokenStore::new()),
                        Arc::new(MemoryScheduleStore::new()),
                    )
                }
            };

        let scheduler = EventBridgeScheduler::new(
            &aws_config,
            EventBridgeTarget {
                function_arn: config.notification_function_arn.clone(),
                role_arn: config.scheduler_role_arn.clone(),
                group_name: config.schedule_group.clone(),
            },
        );

        Ok(Self {
            tokens,
            schedules,
            oauth: Arc::new(GoogleOAuth::new(
                config.google_client_id.clone(),
                config.google_client_secret.clone(),
                config.google_redirect_uri.clone(),
            )),
            calendar: Arc::new(GoogleCalendar::new()?),
            scheduler: Arc::new(scheduler),
            dev_user_id: config.dev_user_id.clone(),
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    routes::api_routes()
        .layer(middleware::map_response(response::with_cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
