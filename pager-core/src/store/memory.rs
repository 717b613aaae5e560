//! In-memory status store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{StatusStore, StoreError, StoreResult};
use crate::alert::{AlertKey, AlertStatus};

/// Process-local status store
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<AlertKey, AlertStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records
    pub fn with_records(records: impl IntoIterator<Item = AlertStatus>) -> Self {
        let records = records.into_iter().map(|s| (s.key(), s)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Copy of every record, sorted by key
    pub async fn snapshot(&self) -> Vec<AlertStatus> {
        let mut records: Vec<AlertStatus> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.key().cmp(&b.key()));
        records
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get_status(&self, key: &AlertKey) -> StoreResult<Option<AlertStatus>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn create(&self, status: AlertStatus) -> StoreResult<AlertStatus> {
        let mut records = self.records.write().await;
        let key = status.key();
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        records.insert(key, status.clone());
        Ok(status)
    }

    async fn update(&self, status: &AlertStatus) -> StoreResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&status.key()) {
            Some(slot) => {
                *slot = status.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(status.key())),
        }
    }
}
