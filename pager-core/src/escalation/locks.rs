//! Per-alert serialization
//!
//! Every engine entry point is a read-modify-write of one status record.
//! Holding the alert's lock for the whole event keeps two in-flight events
//! for the same alert from interleaving; different alerts never contend.
//! `tokio::sync::Mutex` is fair, so waiters are served in arrival order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use crate::alert::AlertKey;

/// Map size above which idle entries are dropped on the next acquire
const PRUNE_THRESHOLD: usize = 1024;

type KeyLock = Arc<tokio::sync::Mutex<()>>;

/// Table of per-alert async locks
#[derive(Debug, Default)]
pub struct AlertLocks {
    locks: Mutex<HashMap<AlertKey, KeyLock>>,
}

impl AlertLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one alert
    pub async fn acquire(&self, key: &AlertKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            if locks.len() >= PRUNE_THRESHOLD {
                // Only the table holds an idle lock.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of alerts with a lock entry
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
