//! Durable identity -> secret mapping.
//!
//! Every backend exposes the same write-once contract: `put_if_absent` is
//! the only mutation, and it re-checks presence inside the backend's own
//! critical section. Two racing inserts for one identity therefore agree
//! on a single secret, and the loser gets the winner's value back instead
//! of an error.

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::AppResult;
use crate::model::{CredentialRecord, Identity, InsertOutcome, Secret};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Secret issued to `identity`, if any
    async fn get(&self, identity: &Identity) -> AppResult<Option<Secret>>;

    /// Record `secret` for `identity` unless one is already recorded
    async fn put_if_absent(&self, identity: &Identity, secret: Secret) -> AppResult<InsertOutcome>;

    /// All records, oldest first
    async fn snapshot(&self) -> AppResult<Vec<CredentialRecord>>;
}

/// Shared store handle for use across the application.
pub type SharedCredentialStore = Arc<dyn CredentialStore>;

/// Open the backend selected in configuration.
pub async fn open(config: &StoreConfig) -> AppResult<SharedCredentialStore> {
    match config.backend {
        StoreBackend::File => {
            info!("Using JSON credential store at {}", config.path.display());
            Ok(Arc::new(JsonFileStore::new(&config.path)))
        }
        StoreBackend::Sqlite => {
            let store = SqliteStore::connect(&config.database_url, config.max_connections).await?;
            info!("Using SQLite credential store at {}", config.database_url);
            Ok(Arc::new(store))
        }
    }
}

/// Open the configured backend for inspection only. Nothing is created:
/// a missing SQLite database is an error rather than a new empty file.
pub async fn open_read_only(config: &StoreConfig) -> AppResult<SharedCredentialStore> {
    match config.backend {
        StoreBackend::File => Ok(Arc::new(JsonFileStore::new(&config.path))),
        StoreBackend::Sqlite => {
            let store = SqliteStore::connect_read_only(&config.database_url).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_only_open_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("proxygate.db");
        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            database_url: format!("sqlite://{}?mode=rwc", db.display()),
            ..StoreConfig::default()
        };
        assert!(open_read_only(&config).await.is_err());
        assert!(!db.exists());

        let config = StoreConfig {
            backend: StoreBackend::File,
            path: dir.path().join("users.json"),
            ..StoreConfig::default()
        };
        let store = open_read_only(&config).await.unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
