//! Persistence seams for token and schedule records.
//!
//! Handlers only see these traits; `dynamo` talks to DynamoDB and `memory`
//! keeps everything in-process for local runs and tests.

use alarm_shared::{ScheduleRecord, TokenRecord};
use async_trait::async_trait;
use thiserror::Error;

pub mod dynamo;
pub mod memory;

pub use dynamo::{DynamoScheduleStore, DynamoTokenStore};
pub use memory::{MemoryScheduleStore, MemoryTokenStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage request failed: {0}")]
    Backend(String),

    #[error("Malformed item: {0}")]
    Malformed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Token records keyed by user id.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, user_id: &str) -> StoreResult<Option<TokenRecord>>;

    /// Insert or overwrite the record for `record.user_id`.
    async fn put(&self, record: &TokenRecord) -> StoreResult<()>;

    /// Write back a refreshed access token, leaving the rest of the record untouched.
    async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> StoreResult<()>;
}

/// Schedule records keyed by (user id, event id).
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn put(&self, record: &ScheduleRecord) -> StoreResult<()>;

    async fn get(&self, user_id: &str, event_id: &str) -> StoreResult<Option<ScheduleRecord>>;
}
