//! In-process stores, used when `STORAGE_BACKEND=memory` and by tests.

use alarm_shared::{ScheduleRecord, TokenRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ScheduleStore, StoreError, StoreResult, TokenStore};

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<TokenRecord>> {
        Ok(self.records.read().await.get(user_id).cloned())
    }

    async fn put(&self, record: &TokenRecord) -> StoreResult<()> {
        self.records
            .write()
            .await
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn update_access_token(
        &self,
        user_id: &str,
        access_token: &str,
        expires_at: i64,
    ) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| StoreError::Backend(format!("no token record for {}", user_id)))?;
        record.access_token = access_token.to_string();
        record.expires_at = expires_at;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    records: RwLock<HashMap<(String, String), ScheduleRecord>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn put(&self, record: &ScheduleRecord) -> StoreResult<()> {
        self.records.write().await.insert(
            (record.user_id.clone(), record.event_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn get(&self, user_id: &str, event_id: &str) -> StoreResult<Option<ScheduleRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(user_id.to_string(), event_id.to_string()))
            .cloned())
    }
}
