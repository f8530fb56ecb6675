//! One-time alarm schedules on AWS EventBridge Scheduler.
//!
//! Each schedule invokes the notifier function once, at wall time in the
//! event's timezone, with the alarm message as its input.

use alarm_shared::AlarmMessage;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_scheduler::types::{FlexibleTimeWindow, FlexibleTimeWindowMode, Target};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid schedule request: {0}")]
    Invalid(String),

    #[error("Scheduler provider error: {0}")]
    Provider(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// A schedule that fires exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct OneTimeSchedule {
    pub name: String,
    /// `at(YYYY-MM-DDTHH:MM:SS)`
    pub expression: String,
    /// IANA timezone the expression is read in
    pub timezone: String,
    pub input: AlarmMessage,
}

#[async_trait]
pub trait AlarmScheduler: Send + Sync {
    async fn create_one_time(&self, schedule: &OneTimeSchedule) -> SchedulerResult<()>;
}

/// Where schedules deliver their input.
#[derive(Debug, Clone)]
pub struct EventBridgeTarget {
    /// ARN of the notifier function
    pub function_arn: String,
    /// Role the scheduler assumes to invoke it
    pub role_arn: String,
    pub group_name: String,
}

pub struct EventBridgeScheduler {
    client: aws_sdk_scheduler::Client,
    target: EventBridgeTarget,
}

impl EventBridgeScheduler {
    pub fn new(aws_config: &SdkConfig, target: EventBridgeTarget) -> Self {
        Self {
            client: aws_sdk_scheduler::Client::new(aws_config),
            target,
        }
    }
}

#[async_trait]
impl AlarmScheduler for EventBridgeScheduler {
    async fn create_one_time(&self, schedule: &OneTimeSchedule) -> SchedulerResult<()> {
        let input = serde_json::to_string(&schedule.input)
            .map_err(|e| SchedulerError::Invalid(format!("Failed to encode input: {}", e)))?;

        let target = Target::builder()
            .arn(&self.target.function_arn)
            .role_arn(&self.target.role_arn)
            .input(input)
            .build()
            .map_err(|e| SchedulerError::Provider(format!("Failed to build target: {}", e)))?;

        let flexible_time_window = FlexibleTimeWindow::builder()
            .mode(FlexibleTimeWindowMode::Off)
            .build()
            .map_err(|e| SchedulerError::Provider(format!("Failed to build time window: {}", e)))?;

        self.client
            .create_schedule()
            .name(&schedule.name)
            .group_name(&self.target.group_name)
            .schedule_expression(&schedule.expression)
            .schedule_expression_timezone(&schedule.timezone)
            .flexible_time_window(flexible_time_window)
            .target(target)
            .send()
            .await
            .map_err(|e| SchedulerError::Provider(format!("AWS SDK error: {}", e)))?;

        tracing::info!(
            schedule_name = %schedule.name,
            expression = %schedule.expression,
            timezone = %schedule.timezone,
            event_id = %schedule.input.event_id,
            "Created EventBridge schedule"
        );

        Ok(())
    }
}
