use alarm_shared::api::{CreateAlarmRequest, CreateAlarmResponse};
use alarm_shared::{AlarmMessage, ScheduleRecord};
use axum::{body::Bytes, extract::State};
use uuid::Uuid;

use super::parse_body;
use crate::auth::CallerIdentity;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiReply;
use crate::scheduler::OneTimeSchedule;
use crate::trigger::trigger_time;
use crate::AppState;

/// `POST /alarm`: register a one-time schedule that fires the alarm ahead of
/// a calendar event and remember it.
pub async fn create_alarm(
    State(state): State<AppState>,
    CallerIdentity(user_id): CallerIdentity,
    body: Bytes,
) -> ApiResult<ApiReply> {
    let request: CreateAlarmRequest = parse_body(&body)?;
    let event = request
        .parse_event()
        .map_err(|e| ApiError::bad_request(format!("Invalid event: {}", e)))?;

    let trigger = trigger_time(&event)?;

    let record = ScheduleRecord {
        user_id: user_id.clone(),
        event_id: event.id.clone(),
        trigger_time: trigger.at.fixed_offset(),
        spray_flag: event.spray_flag,
        user_prompt: event.user_prompt,
        alarm_repeat_times: event.alarm_repeat_times,
        alarm_interval: event.alarm_interval,
        receivers: event.receivers,
        schedule_name: Uuid::new_v4().to_string(),
    };

    let schedule = OneTimeSchedule {
        name: record.schedule_name.clone(),
        expression: trigger.schedule_expression(),
        timezone: trigger.timezone_name().to_string(),
        input: AlarmMessage::from(&record),
    };

    state.scheduler.create_one_time(&schedule).await?;
    state.schedules.put(&record).await?;

    tracing::info!(
        user_id = %user_id,
        event_id = %record.event_id,
        schedule_name = %record.schedule_name,
        trigger_time = %record.trigger_time,
        "Alarm scheduled"
    );

    Ok(ApiReply::ok(&CreateAlarmResponse {
        message: "schedule created".to_string(),
        schedule_name: record.schedule_name,
    }))
}

#[cfg(test)]
mod tests {
    use crate::storage::ScheduleStore;
    use crate::testing::{json_body, request, FakeOAuth, FakeScheduler, Harness};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn event() -> Value {
        json!({
            "id": "evt-42",
            "summary": "Flight",
            "start": { "dateTime": "2025-05-01T09:00:00+08:00", "timeZone": "Asia/Taipei" },
            "reminders": { "useDefault": false, "overrides": [{ "method": "popup", "minutes": 30 }] },
            "spray_flag": true,
            "user_prompt": "wake up, flight at nine",
            "receivers": ["friend@example.com"],
            "alarm_repeat_times": 3,
            "alarm_interval": 2
        })
    }

    #[tokio::test]
    async fn test_create_alarm_registers_schedule_and_record() {
        let harness = Harness::new();

        let response = harness
            .app()
            .oneshot(request(
                "POST",
                "/alarm",
                Some("user-1"),
                Some(json!({ "event": event().to_string() })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "schedule created");
        let name = body["schedule_name"].as_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&name).is_ok());

        let created = harness.scheduler.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, name);
        assert_eq!(created[0].expression, "at(2025-05-01T08:30:00)");
        assert_eq!(created[0].timezone, "Asia/Taipei");
        assert_eq!(created[0].input.user_id, "user-1");
        assert_eq!(created[0].input.alarm_repeat_times, Some(3));

        let record = harness
            .schedules
            .get("user-1", "evt-42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.schedule_name, name);
        assert_eq!(record.trigger_time.to_rfc3339(), "2025-05-01T08:30:00+08:00");
        assert!(record.spray_flag);
        assert_eq!(record.receivers, vec!["friend@example.com"]);
    }

    #[tokio::test]
    async fn test_inline_event_without_popup_uses_default_offset() {
        let harness = Harness::new();
        let mut event = event();
        event["reminders"] = json!({ "useDefault": true });

        let response = harness
            .app()
            .oneshot(request(
                "POST",
                "/alarm",
                Some("user-1"),
                Some(json!({ "event": event })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let created = harness.scheduler.created.lock().unwrap().clone();
        assert_eq!(created[0].expression, "at(2025-05-01T08:50:00)");
    }

    #[tokio::test]
    async fn test_missing_alarm_fields_is_bad_request() {
        let harness = Harness::new();
        let mut event = event();
        event.as_object_mut().unwrap().remove("spray_flag");

        let response = harness
            .app()
            .oneshot(request(
                "POST",
                "/alarm",
                Some("user-1"),
                Some(json!({ "event": event })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(harness.scheduler.created.lock().unwrap().is_empty());
        assert_eq!(harness.schedules.count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_timezone_is_bad_request() {
        let harness = Harness::new();
        let mut event = event();
        event["start"]["timeZone"] = json!("Nowhere/Special");

        let response = harness
            .app()
            .oneshot(request(
                "POST",
                "/alarm",
                Some("user-1"),
                Some(json!({ "event": event })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "unknown timezone 'Nowhere/Special'"
        );
    }

    #[tokio::test]
    async fn test_scheduler_failure_is_internal_error() {
        let harness = Harness::with(
            FakeOAuth::default(),
            FakeScheduler {
                fail: true,
                ..Default::default()
            },
        );

        let response = harness
            .app()
            .oneshot(request(
                "POST",
                "/alarm",
                Some("user-1"),
                Some(json!({ "event": event() })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Internal server error");
        assert_eq!(harness.schedules.count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let harness = Harness::new();

        let response = harness
            .app()
            .oneshot(request("POST", "/alarm", None, Some(json!({ "event": event() }))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(harness.scheduler.created.lock().unwrap().is_empty());
    }
}
