//! Backend selection
//!
//! `db.type` picks which [`AccountStore`] implementation is constructed at
//! startup. The rest of the crate only ever sees the trait object.

use crate::config::{BackendKind, LedgerConfig};
use crate::core::{AccountStore, EmbeddedStore, MemoryStore, PooledStore};
use crate::dispatch::{Ledger, TaskExecutor};
use crate::types::LedgerError;
use std::sync::Arc;
use tracing::info;

/// Construct the store selected by `config.backend`
///
/// # Errors
///
/// Returns a storage error if the database file cannot be opened or the
/// pool cannot reach the server within its connection timeout.
pub fn open_store(config: &LedgerConfig) -> Result<Arc<dyn AccountStore>, LedgerError> {
    info!(backend = ?config.backend, "opening account store");
    let store: Arc<dyn AccountStore> = match config.backend {
        BackendKind::Sqlite => Arc::new(EmbeddedStore::open(&config.sqlite.path)?),
        BackendKind::MySql => Arc::new(PooledStore::connect(&config.mysql)?),
        BackendKind::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Open the configured store and wrap it for asynchronous use
pub fn open_ledger(
    config: &LedgerConfig,
    executor: Arc<dyn TaskExecutor>,
) -> Result<Ledger, LedgerError> {
    Ok(Ledger::new(open_store(config)?, executor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqliteConfig;
    use crate::types::{AccountKey, Currency};
    use tempfile::TempDir;

    #[test]
    fn test_sqlite_backend_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data/ledger.db");
        let config = LedgerConfig {
            backend: BackendKind::Sqlite,
            sqlite: SqliteConfig { path: path.clone() },
            ..LedgerConfig::default()
        };

        let store = open_store(&config).unwrap();
        store.ensure_exists(&AccountKey::player("P1").unwrap()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_memory_backend() {
        let config = LedgerConfig {
            backend: BackendKind::Memory,
            ..LedgerConfig::default()
        };

        let store = open_store(&config).unwrap();
        let p1 = AccountKey::clan("red").unwrap();
        store.add(&p1, Currency::Silver, 3).unwrap();

        assert_eq!(store.get(&p1, Currency::Silver).unwrap(), 3);
    }
}
