//! Session store implementations for RepairKit.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use repairkit_config::StoreConfig;
use repairkit_core::SessionStore;
use repairkit_core::error::StoreError;
use std::sync::Arc;

/// Open the backend named in the config.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn SessionStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteStore::new(&config.resolved_database_url()).await?)),
        other => Err(StoreError::Storage(format!("unsupported store backend '{other}'"))),
    }
}
