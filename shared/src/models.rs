use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before the recorded expiry at which an access token is treated as expired.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth tokens stored per user, keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which `access_token` stops being valid
    pub expires_at: i64,
    /// Authorization code the tokens were exchanged from
    pub code: Option<String>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at - EXPIRY_SKEW_SECS
    }
}

/// A registered alarm, keyed by (`user_id`, `event_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub user_id: String,
    pub event_id: String,
    /// Trigger instant expressed in the event's timezone
    pub trigger_time: DateTime<FixedOffset>,
    pub spray_flag: bool,
    pub user_prompt: String,
    pub alarm_repeat_times: u32,
    /// Minutes between two plays of the alarm sound
    pub alarm_interval: u32,
    pub receivers: Vec<String>,
    pub schedule_name: String,
}

/// Payload delivered to the device on `<device-id>/alarm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmMessage {
    pub user_id: String,
    pub event_id: String,
    #[serde(default)]
    pub spray_flag: bool,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub receivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_repeat_times: Option<u32>,
    /// Minutes; the device default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_interval: Option<u32>,
}

impl From<&ScheduleRecord> for AlarmMessage {
    fn from(record: &ScheduleRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            event_id: record.event_id.clone(),
            spray_flag: record.spray_flag,
            user_prompt: record.user_prompt.clone(),
            receivers: record.receivers.clone(),
            alarm_repeat_times: Some(record.alarm_repeat_times),
            alarm_interval: Some(record.alarm_interval),
        }
    }
}

/// Topic a device subscribes to for alarms.
pub fn alarm_topic(device_id: &str) -> String {
    format!("{}/alarm", device_id)
}
