//! Single-file embedded store backed by SQLite
//!
//! SQLite cannot safely run concurrent statements on one connection, so the
//! store owns exactly one connection behind a mutex. Every operation holds
//! the lock for its whole read-decide-write sequence; nothing else ever
//! touches the connection.

use super::schema::{self, Dialect};
use super::traits::{require_non_negative, require_positive, AccountStore};
use crate::types::{AccountKey, Balances, Currency, LedgerError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info};

/// How long a statement waits on a file lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Account store over a single SQLite connection
pub struct EmbeddedStore {
    /// `None` once the store is closed
    conn: Mutex<Option<Connection>>,
    /// Backing file; `None` for in-memory databases
    path: Option<PathBuf>,
}

impl EmbeddedStore {
    /// Open (or create) the database file at `path`
    ///
    /// Missing parent directories are created and the accounts table is
    /// created if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL: readers in other processes do not block the writer
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(&Dialect::Sqlite.create_table())?;

        info!(path = %path.display(), "opened embedded account store");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database (used in tests)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&Dialect::Sqlite.create_table())?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` while holding the connection lock
    fn with_conn<T, F>(&self, operation: &str, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, LedgerError>,
    {
        // A panic inside a previous closure leaves no open transaction behind
        // (rusqlite rolls back on drop), so a poisoned lock is still usable.
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_mut().ok_or(LedgerError::Closed)?;
        let result = f(conn);
        if let Err(e) = &result {
            if e.is_storage() {
                error!(operation, error = %e, "embedded store operation failed");
            } else {
                debug!(operation, error = %e, "embedded store operation rejected");
            }
        }
        result
    }
}

fn ensure(conn: &Connection, account: &AccountKey) -> Result<(), LedgerError> {
    conn.prepare_cached(&Dialect::Sqlite.insert_if_absent())?
        .execute(params![account.id(), account.kind().as_str()])?;
    Ok(())
}

fn read(conn: &Connection, account: &AccountKey, currency: Currency) -> Result<i64, LedgerError> {
    let balance = conn
        .prepare_cached(&schema::select_balance(currency))?
        .query_row(params![account.id(), account.kind().as_str()], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(balance.unwrap_or(0))
}

fn credit(
    conn: &Connection,
    account: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    let changed = conn
        .prepare_cached(&schema::update_credit(currency))?
        .execute(params![amount, account.id(), account.kind().as_str(), amount])?;
    if changed == 0 {
        return Err(LedgerError::balance_overflow(account, currency, amount));
    }
    Ok(())
}

fn debit(
    conn: &Connection,
    account: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    let changed = conn
        .prepare_cached(&schema::update_debit(currency))?
        .execute(params![amount, account.id(), account.kind().as_str(), amount])?;
    if changed == 0 {
        return Err(LedgerError::insufficient_funds(account, currency, amount));
    }
    Ok(())
}

impl AccountStore for EmbeddedStore {
    fn get(&self, account: &AccountKey, currency: Currency) -> Result<i64, LedgerError> {
        self.with_conn("get", |conn| {
            ensure(conn, account)?;
            read(conn, account, currency)
        })
    }

    fn balances(&self, account: &AccountKey) -> Result<Balances, LedgerError> {
        self.with_conn("balances", |conn| {
            ensure(conn, account)?;
            let balances = conn
                .prepare_cached(&schema::select_balances())?
                .query_row(params![account.id(), account.kind().as_str()], |row| {
                    Ok(Balances {
                        coin: row.get(0)?,
                        copper: row.get(1)?,
                        silver: row.get(2)?,
                        gold: row.get(3)?,
                    })
                })?;
            Ok(balances)
        })
    }

    fn set(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_non_negative("set", amount)?;
        self.with_conn("set", |conn| {
            ensure(conn, account)?;
            conn.prepare_cached(&schema::update_set(currency))?
                .execute(params![amount, account.id(), account.kind().as_str()])?;
            Ok(())
        })
    }

    fn add(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_positive("add", amount)?;
        self.with_conn("add", |conn| {
            ensure(conn, account)?;
            credit(conn, account, currency, amount)
        })
    }

    fn subtract(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_positive("subtract", amount)?;
        self.with_conn("subtract", |conn| {
            ensure(conn, account)?;
            debit(conn, account, currency, amount)
        })
    }

    fn transfer(
        &self,
        from: &AccountKey,
        to: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_positive("transfer", amount)?;
        self.with_conn("transfer", |conn| {
            // Dropping the transaction without commit rolls it back
            let tx = conn.transaction()?;
            ensure(&tx, from)?;
            ensure(&tx, to)?;
            debit(&tx, from, currency, amount)?;
            credit(&tx, to, currency, amount)?;
            tx.commit()?;
            debug!(%from, %to, %currency, amount, "transfer committed");
            Ok(())
        })
    }

    fn ensure_exists(&self, account: &AccountKey) -> Result<(), LedgerError> {
        self.with_conn("ensure_exists", |conn| ensure(conn, account))
    }

    fn close(&self) -> Result<(), LedgerError> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| LedgerError::from(e))?;
            info!("closed embedded account store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn player(id: &str) -> AccountKey {
        AccountKey::player(id).unwrap()
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/ledger.db");

        let store = EmbeddedStore::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_balances_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.db");

        let store = EmbeddedStore::open(&path).unwrap();
        store.add(&player("P1"), Currency::Gold, 42).unwrap();
        store.close().unwrap();

        let reopened = EmbeddedStore::open(&path).unwrap();
        assert_eq!(reopened.get(&player("P1"), Currency::Gold).unwrap(), 42);
    }

    #[test]
    fn test_get_unknown_account_creates_it() {
        let store = EmbeddedStore::open_in_memory().unwrap();

        assert_eq!(store.get(&player("new"), Currency::Coin).unwrap(), 0);

        let exists: i64 = store
            .with_conn("count", |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM economy_accounts WHERE account_id = 'new'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(exists, 1);
    }

    #[test]
    fn test_transfer_rolls_back_when_deposit_fails() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        let p1 = player("P1");
        let p2 = player("P2");
        store.set(&p1, Currency::Coin, 100).unwrap();
        store.ensure_exists(&p2).unwrap();

        // Simulate the engine failing halfway through the transfer
        store
            .with_conn("install trigger", |conn| {
                conn.execute_batch(
                    "CREATE TRIGGER fail_deposit BEFORE UPDATE ON economy_accounts \
                     WHEN NEW.account_id = 'P2' \
                     BEGIN SELECT RAISE(ABORT, 'simulated connection drop'); END;",
                )?;
                Ok(())
            })
            .unwrap();

        let err = store.transfer(&p1, &p2, Currency::Coin, 60).unwrap_err();

        assert!(err.is_storage());
        assert!(!err.is_insufficient_funds());
        assert_eq!(store.get(&p1, Currency::Coin).unwrap(), 100);
        assert_eq!(store.get(&p2, Currency::Coin).unwrap(), 0);
    }

    #[test]
    fn test_add_rejects_overflow_without_mutation() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        let p1 = player("P1");
        store.set(&p1, Currency::Copper, i64::MAX - 1).unwrap();

        let err = store.add(&p1, Currency::Copper, 2).unwrap_err();

        assert!(matches!(err, LedgerError::BalanceOverflow { .. }));
        assert_eq!(store.get(&p1, Currency::Copper).unwrap(), i64::MAX - 1);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let store = EmbeddedStore::open_in_memory().unwrap();
        store.close().unwrap();

        assert_eq!(
            store.get(&player("P1"), Currency::Coin).unwrap_err(),
            LedgerError::Closed
        );
        // Closing twice is harmless
        assert!(store.close().is_ok());
    }

    #[test]
    fn test_concurrent_subtracts_never_overdraw() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(EmbeddedStore::open(dir.path().join("ledger.db")).unwrap());
        let p1 = player("P1");
        store.set(&p1, Currency::Coin, 100).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let p1 = p1.clone();
                thread::spawn(move || store.subtract(&p1, Currency::Coin, 15).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 6);
        assert_eq!(store.get(&p1, Currency::Coin).unwrap(), 10);
    }
}
