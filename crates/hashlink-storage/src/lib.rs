//! Storage backends for the Hashlink URL shortener.
//!
//! - [`InMemoryStorage`]: process-local reference implementation.
//! - [`FileStorage`]: in-memory cache persisted to an append-only JSON-lines
//!   journal that is replayed on start and whenever it grows.
//! - [`PostgresStorage`]: `urls`/`relations` tables with asynchronous,
//!   chunked soft deletion.
//!
//! [`open`] builds any of them from a [`StorageConfig`].

pub mod file;
pub mod memory;
pub mod postgres;

pub use file::{FileStorage, FileStorageConfig, JournalRecord};
pub use hashlink_core::{Result, Storage, StorageError};
pub use memory::InMemoryStorage;
pub use postgres::{PostgresConfig, PostgresStorage, MAX_DELETE_CHUNK};

use std::sync::Arc;
use tracing::info;

/// Selects and configures a backend.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    File(FileStorageConfig),
    Postgres(PostgresConfig),
}

impl StorageConfig {
    /// Short backend name for logs.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::InMemory => "in-memory",
            StorageConfig::File(_) => "file",
            StorageConfig::Postgres(_) => "postgres",
        }
    }
}

/// Opens the configured backend.
///
/// For Postgres this includes running migrations; an error here means the
/// backend must not be used.
pub async fn open(config: StorageConfig) -> Result<Arc<dyn Storage>> {
    info!(backend = config.backend_name(), "opening storage");

    let storage: Arc<dyn Storage> = match config {
        StorageConfig::InMemory => Arc::new(InMemoryStorage::new()),
        StorageConfig::File(config) => Arc::new(FileStorage::open(config).await?),
        StorageConfig::Postgres(config) => Arc::new(PostgresStorage::connect(config).await?),
    };

    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashlink_core::{FullUrl, User};

    #[tokio::test]
    async fn open_in_memory() {
        let storage = open(StorageConfig::InMemory).await.unwrap();

        let id = storage
            .put(User::ANONYMOUS, FullUrl::new("https://example.com"))
            .await
            .unwrap();

        assert_eq!(
            storage.get(id).await.unwrap(),
            FullUrl::new("https://example.com")
        );
    }

    #[tokio::test]
    async fn open_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = FileStorageConfig::builder()
            .path(dir.path().join("urls.jsonl"))
            .build();

        let storage = open(StorageConfig::File(config)).await.unwrap();

        assert!(storage.ping().await);
    }
}
