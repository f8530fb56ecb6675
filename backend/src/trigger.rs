//! Alarm trigger time computation.
//!
//! The alarm fires at the event start minus the first popup reminder offset,
//! expressed as wall time in the event's own timezone.

use alarm_shared::api::AlarmEvent;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

pub const DEFAULT_REMINDER_MINUTES: i64 = 10;

const POPUP_METHOD: &str = "popup";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("event start has neither dateTime nor date")]
    MissingStart,

    #[error("invalid event start '{0}'")]
    InvalidStart(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("local time '{0}' does not exist in {1}")]
    NonexistentLocalTime(String, String),
}

/// When an alarm fires, in the event's timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmTrigger {
    pub at: DateTime<Tz>,
}

impl AlarmTrigger {
    /// One-time schedule expression, e.g. `at(2025-05-01T08:50:00)`.
    pub fn schedule_expression(&self) -> String {
        format!("at({})", self.at.format("%Y-%m-%dT%H:%M:%S"))
    }

    pub fn timezone_name(&self) -> &'static str {
        self.at.timezone().name()
    }
}

/// Minutes before start given by the first popup override.
pub fn reminder_minutes(event: &AlarmEvent) -> i64 {
    event
        .reminders
        .as_ref()
        .and_then(|r| r.overrides.iter().find(|o| o.method == POPUP_METHOD))
        .map(|o| o.minutes.unwrap_or(DEFAULT_REMINDER_MINUTES))
        .unwrap_or(DEFAULT_REMINDER_MINUTES)
}

pub fn trigger_time(event: &AlarmEvent) -> Result<AlarmTrigger, TriggerError> {
    let tz = match event.start.time_zone.as_deref() {
        Some(name) if !name.trim().is_empty() => name
            .parse::<Tz>()
            .map_err(|_| TriggerError::UnknownTimezone(name.to_string()))?,
        _ => Tz::UTC,
    };

    let start = event_start(event, tz)?;
    let at = start - Duration::minutes(reminder_minutes(event));

    Ok(AlarmTrigger { at })
}

fn event_start(event: &AlarmEvent, tz: Tz) -> Result<DateTime<Tz>, TriggerError> {
    if let Some(raw) = event.start.date_time.as_deref() {
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Ok(instant.with_timezone(&tz));
        }

        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|_| TriggerError::InvalidStart(raw.to_string()))?;
        return localize(tz, naive, raw);
    }

    if let Some(raw) = event.start.date.as_deref() {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| TriggerError::InvalidStart(raw.to_string()))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| TriggerError::InvalidStart(raw.to_string()))?;
        return localize(tz, midnight, raw);
    }

    Err(TriggerError::MissingStart)
}

fn localize(tz: Tz, naive: NaiveDateTime, raw: &str) -> Result<DateTime<Tz>, TriggerError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| TriggerError::NonexistentLocalTime(raw.to_string(), tz.name().to_string()))
}
