//! Google Calendar API client for listing upcoming events.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use google_calendar3::hyper_rustls::HttpsConnector;
use google_calendar3::CalendarHub;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

/// Calendar queried for upcoming events.
pub const PRIMARY_CALENDAR: &str = "primary";

#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Next `max_results` events from now, ordered by start time. Events are
    /// returned in the API's own JSON shape.
    async fn upcoming_events(
        &self,
        access_token: &str,
        max_results: i32,
    ) -> Result<Vec<serde_json::Value>>;
}

pub struct GoogleCalendar {
    connector: HttpsConnector<HttpConnector>,
}

impl GoogleCalendar {
    pub fn new() -> Result<Self> {
        let connector = google_calendar3::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self { connector })
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn upcoming_events(
        &self,
        access_token: &str,
        max_results: i32,
    ) -> Result<Vec<serde_json::Value>> {
        let client = Client::builder(TokioExecutor::new()).build(self.connector.clone());
        // A bare access token is enough; refreshing is the caller's job
        let hub = CalendarHub::new(client, access_token.to_string());

        let (_, events) = hub
            .events()
            .list(PRIMARY_CALENDAR)
            .time_min(Utc::now())
            .max_results(max_results)
            .single_events(true)
            .order_by("startTime")
            .doit()
            .await
            .context("Failed to list calendar events")?;

        events
            .items
            .unwrap_or_default()
            .iter()
            .map(|event| serde_json::to_value(event).context("Failed to encode calendar event"))
            .collect()
    }
}
