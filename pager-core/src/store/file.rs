//! JSON-file-backed status store
//!
//! Keeps the full record map in memory and rewrites the file after every
//! successful `create`/`update`. The write goes to a sibling temp file that
//! is then renamed over the target, so a crash never leaves a torn file.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use super::{StatusStore, StoreError, StoreResult};
use crate::alert::{AlertKey, AlertStatus};

/// Status store persisted as a JSON array of records
pub struct JsonFileStatusStore {
    path: PathBuf,
    records: Mutex<HashMap<AlertKey, AlertStatus>>,
}

impl JsonFileStatusStore {
    /// Open the store, loading existing records if the file exists
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = if path.exists() {
            let json = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let list: Vec<AlertStatus> = serde_json::from_str(&json)
                .map_err(|e| StoreError::Deserialization(e.to_string()))?;
            list.into_iter().map(|s| (s.key(), s)).collect()
        } else {
            HashMap::new()
        };

        debug!(path = %path.display(), records = records.len(), "Opened status store");

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    async fn flush(&self, records: &HashMap<AlertKey, AlertStatus>) -> StoreResult<()> {
        let mut list: Vec<&AlertStatus> = records.values().collect();
        list.sort_by_key(|s| s.key());

        let json = serde_json::to_string_pretty(&list)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for JsonFileStatusStore {
    async fn get_status(&self, key: &AlertKey) -> StoreResult<Option<AlertStatus>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn create(&self, status: AlertStatus) -> StoreResult<AlertStatus> {
        let mut records = self.records.lock().await;
        let key = status.key();
        if records.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        records.insert(key.clone(), status.clone());
        if let Err(e) = self.flush(&records).await {
            records.remove(&key);
            return Err(e);
        }
        Ok(status)
    }

    async fn update(&self, status: &AlertStatus) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        let key = status.key();
        let previous = match records.get_mut(&key) {
            Some(slot) => std::mem::replace(slot, status.clone()),
            None => return Err(StoreError::NotFound(key)),
        };
        if let Err(e) = self.flush(&records).await {
            records.insert(key, previous);
            return Err(e);
        }
        Ok(())
    }
}
