//! DynamoDB-backed stores.
//!
//! Tables:
//! - tokens: partition key `user_id`
//! - schedules: partition key `user_id`, sort key `event_id`

use alarm_shared::{ScheduleRecord, TokenRecord};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{types::AttributeValue, Client};
use chrono::DateTime;
use std::collections::HashMap;

use super::{ScheduleStore, StoreError, StoreResult, TokenStore};

type Item = HashMap<String, AttributeValue>;

pub struct DynamoTokenStore {
    client: Client,
    table: String,
}

impl DynamoTokenStore {
    pub fn new(aws_config: &SdkConfig, table: impl Into<String>) -> Self {
        Self {
            client: Client::new(aws_config),
            table: table.into(),
        }
    }
}

#[async_trait]
impl TokenStore for DynamoTokenStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<TokenRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        output.item().map(item_to_token).transpose()
    }

    async fn put(&self, record: &TokenRecord) -> StoreResult<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(token_to_item(record)))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(user_id = %record.user_id, table = %self.table, "Stored token record");
        Ok(())
    }

    async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> StoreResult<()> {
        self.client
            .update_item()
            .table_name(&self.table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .update_expression("SET access_token = :at, expires_at = :exp")
            .expression_attribute_values(":at", AttributeValue::S(access_token.to_string()))
            .expression_attribute_values(":exp", AttributeValue::N(expires_at.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }
}

pub struct DynamoScheduleStore {
    client: Client,
    table: String,
}

impl DynamoScheduleStore {
    pub fn new(aws_config: &SdkConfig, table: impl Into<String>) -> Self {
        Self {
            client: Client::new(aws_config),
            table: table.into(),
        }
    }
}

#[async_trait]
impl ScheduleStore for DynamoScheduleStore {
    async fn put(&self, record: &ScheduleRecord) -> StoreResult<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(schedule_to_item(record)))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(
            user_id = %record.user_id,
            event_id = %record.event_id,
            schedule_name = %record.schedule_name,
            "Stored schedule record"
        );
        Ok(())
    }

    async fn get(&self, user_id: &str, event_id: &str) -> StoreResult<Option<ScheduleRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("user_id", AttributeValue::S(user_id.to_string()))
            .key("event_id", AttributeValue::S(event_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        output.item().map(item_to_schedule).transpose()
    }
}

fn token_to_item(record: &TokenRecord) -> Item {
    let mut item = HashMap::new();
    item.insert("user_id".into(), AttributeValue::S(record.user_id.clone()));
    item.insert(
        "access_token".into(),
        AttributeValue::S(record.access_token.clone()),
    );
    item.insert(
        "expires_at".into(),
        AttributeValue::N(record.expires_at.to_string()),
    );
    if let Some(refresh_token) = &record.refresh_token {
        item.insert(
            "refresh_token".into(),
            AttributeValue::S(refresh_token.clone()),
        );
    }
    if let Some(code) = &record.code {
        item.insert("code".into(), AttributeValue::S(code.clone()));
    }
    item
}

fn item_to_token(item: &Item) -> StoreResult<TokenRecord> {
    Ok(TokenRecord {
        user_id: required_s(item, "user_id")?,
        access_token: required_s(item, "access_token")?,
        refresh_token: optional_s(item, "refresh_token"),
        // Records written before the first exchange completed have no expiry
        expires_at: optional_n(item, "expires_at")?.unwrap_or(0),
        code: optional_s(item, "code"),
    })
}

fn schedule_to_item(record: &ScheduleRecord) -> Item {
    let mut item = HashMap::new();
    item.insert("user_id".into(), AttributeValue::S(record.user_id.clone()));
    item.insert("event_id".into(), AttributeValue::S(record.event_id.clone()));
    item.insert(
        "trigger_time".into(),
        AttributeValue::S(record.trigger_time.to_rfc3339()),
    );
    item.insert("spray_flag".into(), AttributeValue::Bool(record.spray_flag));
    item.insert(
        "user_prompt".into(),
        AttributeValue::S(record.user_prompt.clone()),
    );
    item.insert(
        "alarm_repeat_times".into(),
        AttributeValue::N(record.alarm_repeat_times.to_string()),
    );
    item.insert(
        "alarm_interval".into(),
        AttributeValue::N(record.alarm_interval.to_string()),
    );
    item.insert(
        "receivers".into(),
        AttributeValue::L(
            record
                .receivers
                .iter()
                .cloned()
                .map(AttributeValue::S)
                .collect(),
        ),
    );
    item.insert(
        "schedule_name".into(),
        AttributeValue::S(record.schedule_name.clone()),
    );
    item
}

fn item_to_schedule(item: &Item) -> StoreResult<ScheduleRecord> {
    let trigger_time = required_s(item, "trigger_time")?;
    let trigger_time = DateTime::parse_from_rfc3339(&trigger_time)
        .map_err(|e| StoreError::Malformed(format!("trigger_time '{}': {}", trigger_time, e)))?;

    let receivers = match item.get("receivers") {
        Some(AttributeValue::L(values)) => values
            .iter()
            .filter_map(|v| v.as_s().ok().cloned())
            .collect(),
        _ => Vec::new(),
    };

    Ok(ScheduleRecord {
        user_id: required_s(item, "user_id")?,
        event_id: required_s(item, "event_id")?,
        trigger_time,
        spray_flag: item
            .get("spray_flag")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        user_prompt: optional_s(item, "user_prompt").unwrap_or_default(),
        alarm_repeat_times: optional_n(item, "alarm_repeat_times")?.unwrap_or(0),
        alarm_interval: optional_n(item, "alarm_interval")?.unwrap_or(0),
        receivers,
        schedule_name: required_s(item, "schedule_name")?,
    })
}

fn optional_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

fn required_s(item: &Item, key: &str) -> StoreResult<String> {
    optional_s(item, key).ok_or_else(|| StoreError::Malformed(format!("missing string '{}'", key)))
}

fn optional_n<T: std::str::FromStr>(item: &Item, key: &str) -> StoreResult<Option<T>> {
    match item.get(key).and_then(|v| v.as_n().ok()) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| StoreError::Malformed(format!("'{}' is not a valid number: {}", key, raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn token() -> TokenRecord {
        TokenRecord {
            user_id: "user-1".to_string(),
            access_token: "ya29.token".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: 1_746_100_000,
            code: Some("4/code".to_string()),
        }
    }

    #[test]
    fn test_token_item_layout() {
        let item = token_to_item(&token());

        assert_eq!(item["user_id"].as_s().unwrap(), "user-1");
        assert_eq!(item["expires_at"].as_n().unwrap(), "1746100000");
        assert_eq!(item["refresh_token"].as_s().unwrap(), "1//refresh");
        assert_eq!(item_to_token(&item).unwrap(), token());
    }

    #[test]
    fn test_token_without_refresh_token_omits_attribute() {
        let mut record = token();
        record.refresh_token = None;

        let item = token_to_item(&record);
        assert!(!item.contains_key("refresh_token"));
        assert_eq!(item_to_token(&item).unwrap().refresh_token, None);
    }

    #[test]
    fn test_token_item_with_bad_expiry_is_malformed() {
        let mut item = token_to_item(&token());
        item.insert("expires_at".into(), AttributeValue::N("soon".into()));

        assert!(matches!(
            item_to_token(&item),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_schedule_item_layout() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let record = ScheduleRecord {
            user_id: "user-1".to_string(),
            event_id: "evt-1".to_string(),
            trigger_time: offset.with_ymd_and_hms(2025, 5, 1, 8, 50, 0).unwrap(),
            spray_flag: true,
            user_prompt: "wake up".to_string(),
            alarm_repeat_times: 3,
            alarm_interval: 5,
            receivers: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            schedule_name: "5b1c".to_string(),
        };

        let item = schedule_to_item(&record);
        assert_eq!(
            item["trigger_time"].as_s().unwrap(),
            "2025-05-01T08:50:00+08:00"
        );
        assert_eq!(item["receivers"].as_l().unwrap().len(), 2);
        assert_eq!(item_to_schedule(&item).unwrap(), record);
    }
}
