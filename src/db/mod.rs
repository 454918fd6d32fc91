//! Entity store for filevault.
//!
//! The [`Storage`] trait is the single seam between the service layer and
//! persistence. Two backends implement it:
//! - [`MemoryStorage`]: in-process tables, used by tests and ephemeral runs;
//! - [`SqliteStorage`]: SQLite via sqlx (feature `sqlite`, on by default).

mod memory;
mod schema;
#[cfg(feature = "sqlite")]
mod sqlite;
mod traits;
mod user;

pub use memory::MemoryStorage;
pub use schema::MIGRATIONS;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
pub use traits::{SharedStorage, Storage};
pub use user::{NewUser, User, UserUpdate};

use std::sync::Arc;

use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::Result;

/// Open the store selected by the configuration.
pub async fn open_storage(config: &DatabaseConfig) -> Result<SharedStorage> {
    let storage: SharedStorage = match config.backend {
        DatabaseBackend::Memory => Arc::new(MemoryStorage::new()),
        #[cfg(feature = "sqlite")]
        DatabaseBackend::Sqlite => Arc::new(SqliteStorage::open(&config.path).await?),
        #[cfg(not(feature = "sqlite"))]
        DatabaseBackend::Sqlite => {
            return Err(crate::VaultError::Config(
                "built without the sqlite feature; set database.backend = \"memory\"".to_string(),
            ))
        }
    };
    info!("Using {} storage backend", storage.backend_name());
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_backend() {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Memory,
            path: String::new(),
        };
        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            path: temp_dir.path().join("vault.db").display().to_string(),
        };
        let storage = open_storage(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "sqlite");
    }
}
