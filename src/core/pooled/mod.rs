//! Networked store backed by a pool of MySQL connections
//!
//! Each operation borrows a connection for its own duration only. Debits are
//! a single conditional `UPDATE`, so the sufficiency check and the decrement
//! are one statement and cannot race. Transfers run inside a transaction:
//! row locks in key order, conditional withdrawal, guarded deposit, commit.
//! Any failure rolls the transaction back before it is reported.

mod lease;

pub use lease::Lease;

use super::schema::{self, Dialect};
use super::traits::{require_non_negative, require_positive, AccountStore};
use crate::config::MySqlConfig;
use crate::types::{AccountKey, Balances, Currency, LedgerError};
use r2d2_mysql::mysql::prelude::Queryable;
use r2d2_mysql::mysql::{OptsBuilder, Params, SslOpts, Transaction, TxOpts};
use r2d2_mysql::MySqlConnectionManager;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info};

pub type MySqlPool = r2d2::Pool<MySqlConnectionManager>;

/// Account store over an r2d2 MySQL pool
pub struct PooledStore {
    /// `None` once the store is closed
    pool: RwLock<Option<MySqlPool>>,
    leak_threshold: Duration,
}

impl PooledStore {
    /// Build the pool and create the accounts table if needed
    ///
    /// Blocks until `min_idle` connections are open or the connection
    /// timeout elapses.
    pub fn connect(config: &MySqlConfig) -> Result<Self, LedgerError> {
        config.validate()?;

        let mut opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .db_name(Some(config.database.clone()))
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .stmt_cache_size(config.stmt_cache_size)
            .tcp_connect_timeout(Some(config.pool.connection_timeout));
        if config.ssl {
            opts = opts.ssl_opts(SslOpts::default());
        }

        let pool = r2d2::Pool::builder()
            .max_size(config.pool.max_size)
            .min_idle(Some(config.pool.min_idle))
            .connection_timeout(config.pool.connection_timeout)
            .build(MySqlConnectionManager::new(opts))?;

        let store = Self::from_pool(pool, config.pool.leak_detection_threshold);
        store.create_table()?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            pool_size = config.pool.max_size,
            "connected pooled account store"
        );
        Ok(store)
    }

    /// Wrap an existing pool; the table is assumed to exist
    pub fn from_pool(pool: MySqlPool, leak_threshold: Duration) -> Self {
        Self {
            pool: RwLock::new(Some(pool)),
            leak_threshold,
        }
    }

    fn create_table(&self) -> Result<(), LedgerError> {
        let mut conn = self.lease("create_table")?;
        conn.query_drop(Dialect::MySql.create_table())?;
        Ok(())
    }

    /// Borrow a connection for one operation
    fn lease(&self, operation: &'static str) -> Result<Lease, LedgerError> {
        let pool = self
            .pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LedgerError::Closed)?;
        let conn = pool.get()?;
        Ok(Lease::new(conn, operation, self.leak_threshold))
    }

    /// Borrow a connection and run `f` with it, logging failures
    fn with_lease<T, F>(&self, operation: &'static str, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Lease) -> Result<T, LedgerError>,
    {
        let result = self.lease(operation).and_then(|mut conn| f(&mut conn));
        if let Err(e) = &result {
            if e.is_storage() {
                error!(operation, error = %e, "pooled store operation failed");
            } else {
                debug!(operation, error = %e, "pooled store operation rejected");
            }
        }
        result
    }
}

fn key_params(account: &AccountKey) -> Params {
    (account.id(), account.kind().as_str()).into()
}

fn amount_params(amount: i64, account: &AccountKey) -> Params {
    (amount, account.id(), account.kind().as_str(), amount).into()
}

/// Execute a statement and report the number of rows it changed
fn execute<Q: Queryable>(q: &mut Q, sql: String, params: Params) -> Result<u64, LedgerError> {
    let result = q.exec_iter(sql, params)?;
    Ok(result.affected_rows())
}

fn ensure<Q: Queryable>(q: &mut Q, account: &AccountKey) -> Result<(), LedgerError> {
    q.exec_drop(Dialect::MySql.insert_if_absent(), key_params(account))?;
    Ok(())
}

fn credit<Q: Queryable>(
    q: &mut Q,
    account: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    let changed = execute(q, schema::update_credit(currency), amount_params(amount, account))?;
    if changed == 0 {
        return Err(LedgerError::balance_overflow(account, currency, amount));
    }
    Ok(())
}

fn debit<Q: Queryable>(
    q: &mut Q,
    account: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    let changed = execute(q, schema::update_debit(currency), amount_params(amount, account))?;
    if changed == 0 {
        return Err(LedgerError::insufficient_funds(account, currency, amount));
    }
    Ok(())
}

/// Rows a transfer locks, in the order it locks them
///
/// Every transfer locks in key order, so two transfers over the same pair of
/// accounts in opposite directions queue instead of deadlocking.
fn lock_order<'a>(from: &'a AccountKey, to: &'a AccountKey) -> Vec<&'a AccountKey> {
    let mut keys = vec![from, to];
    keys.sort();
    keys.dedup();
    keys
}

fn transfer_within(
    tx: &mut Transaction<'_>,
    from: &AccountKey,
    to: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    for key in lock_order(from, to) {
        tx.exec_drop(schema::lock_row(), key_params(key))?;
    }
    debit(tx, from, currency, amount)?;
    credit(tx, to, currency, amount)
}

impl AccountStore for PooledStore {
    fn get(&self, account: &AccountKey, currency: Currency) -> Result<i64, LedgerError> {
        self.with_lease("get", |conn| {
            ensure(&mut **conn, account)?;
            let balance: Option<i64> =
                conn.exec_first(schema::select_balance(currency), key_params(account))?;
            Ok(balance.unwrap_or(0))
        })
    }

    fn balances(&self, account: &AccountKey) -> Result<Balances, LedgerError> {
        self.with_lease("balances", |conn| {
            ensure(&mut **conn, account)?;
            let row: Option<(i64, i64, i64, i64)> =
                conn.exec_first(schema::select_balances(), key_params(account))?;
            Ok(row
                .map(|(coin, copper, silver, gold)| Balances {
                    coin,
                    copper,
                    silver,
                    gold,
                })
                .unwrap_or_default())
        })
    }

    fn set(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_non_negative("set", amount)?;
        self.with_lease("set", |conn| {
            ensure(&mut **conn, account)?;
            conn.exec_drop(
                schema::update_set(currency),
                (amount, account.id(), account.kind().as_str()),
            )?;
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
        self.with_lease("add", |conn| {
            ensure(&mut **conn, account)?;
            credit(&mut **conn, account, currency, amount)
        })
    }

    fn subtract(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_positive("subtract", amount)?;
        self.with_lease("subtract", |conn| {
            ensure(&mut **conn, account)?;
            debit(&mut **conn, account, currency, amount)
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
        self.with_lease("transfer", |conn| {
            // Created outside the transaction: insert-if-absent takes shared
            // locks that two opposite transfers would both hold
            for key in lock_order(from, to) {
                ensure(&mut **conn, key)?;
            }
            let mut tx = conn.start_transaction(TxOpts::default())?;
            match transfer_within(&mut tx, from, to, currency, amount) {
                Ok(()) => {
                    tx.commit()?;
                    debug!(%from, %to, %currency, amount, "transfer committed");
                    Ok(())
                }
                Err(e) => {
                    if let Err(rollback) = tx.rollback() {
                        error!(error = %rollback, "transfer rollback failed");
                    }
                    Err(e)
                }
            }
        })
    }

    fn ensure_exists(&self, account: &AccountKey) -> Result<(), LedgerError> {
        self.with_lease("ensure_exists", |conn| ensure(&mut **conn, account))
    }

    fn close(&self) -> Result<(), LedgerError> {
        let mut guard = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            // Idle connections close with the last pool handle; leased ones
            // close as soon as their operation returns them.
            info!("closed pooled account store");
        }
        Ok(())
    }
}
