//! Types shared between the cloud handlers and the alarm device.

pub mod api;
pub mod models;

pub use models::{alarm_topic, AlarmMessage, ScheduleRecord, TokenRecord};
