//! Alert status persistence
//!
//! The status store owns every [`AlertStatus`] record. The engine borrows a
//! record for the duration of one event and hands it back through
//! [`StatusStore::update`]. Two backends ship with the crate:
//!
//! - [`MemoryStatusStore`]: process-local map, used by tests and ephemeral runs
//! - [`JsonFileStatusStore`]: same map, flushed to a JSON file after each write

pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::alert::{AlertKey, AlertStatus};

pub use file::JsonFileStatusStore;
pub use memory::MemoryStatusStore;

/// Error type for status store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Status record already exists: {0}")]
    AlreadyExists(AlertKey),

    #[error("Status record not found: {0}")]
    NotFound(AlertKey),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for status store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to a status store
pub type SharedStatusStore = Arc<dyn StatusStore>;

/// Trait for the persistence collaborator
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Load the record for an alert, if one exists
    async fn get_status(&self, key: &AlertKey) -> StoreResult<Option<AlertStatus>>;

    /// Insert a new record; fails if the key is already present
    async fn create(&self, status: AlertStatus) -> StoreResult<AlertStatus>;

    /// Replace an existing record; fails if the key is absent
    async fn update(&self, status: &AlertStatus) -> StoreResult<()>;
}
