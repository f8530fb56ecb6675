use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Token Exchange API Types
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ExchangeRequest {
    #[validate(required, length(min = 1))]
    pub code: Option<String>,

    #[validate(required, length(min = 1))]
    pub code_verifier: Option<String>,
}

/// Token endpoint response, passed back to the caller as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Calendar API Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct CalendarEventsResponse {
    pub events: Vec<serde_json::Value>,
}

// ============================================================================
// Alarm API Types
// ============================================================================

/// Body of `POST /alarm`. `event` is either a JSON-encoded string or an
/// inline object.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateAlarmRequest {
    #[serde(default)]
    pub event: serde_json::Value,
}

impl CreateAlarmRequest {
    pub fn parse_event(&self) -> Result<AlarmEvent, serde_json::Error> {
        match &self.event {
            serde_json::Value::String(encoded) => serde_json::from_str(encoded),
            other => serde_json::from_value(other.clone()),
        }
    }
}

/// A Google Calendar event annotated with the user's alarm settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub id: String,
    pub start: EventStart,
    #[serde(default)]
    pub reminders: Option<Reminders>,
    pub spray_flag: bool,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub receivers: Vec<String>,
    pub alarm_repeat_times: u32,
    pub alarm_interval: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStart {
    #[serde(default)]
    pub date_time: Option<String>,
    /// All-day events carry a date instead of a date-time
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    #[serde(default)]
    pub use_default: bool,
    #[serde(default)]
    pub overrides: Vec<ReminderOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderOverride {
    pub method: String,
    #[serde(default)]
    pub minutes: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAlarmResponse {
    pub message: String,
    pub schedule_name: String,
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
