//! Asynchronous dispatch over a blocking account store
//!
//! Store calls block on disk or network I/O, which must never happen on a
//! game-tick loop. [`Ledger`] submits every call to an injected
//! [`TaskExecutor`] and hands back a [`Pending`] future, so the caller only
//! ever suspends at the future boundary.
//!
//! # Architecture
//!
//! ```text
//! Ledger (cloneable handle)
//!     ├── Arc<dyn AccountStore>   (embedded, pooled or memory)
//!     ├── Arc<dyn TaskExecutor>   (tokio handle, thread pool, host closure)
//!     └── in-flight counter       (defers store close until work drains)
//! ```
//!
//! # Shutdown
//!
//! [`Ledger::shutdown`] stops accepting new work immediately. Calls already
//! submitted still run to completion; the store is closed once the last of
//! them finishes, or right away if nothing is in flight.

pub mod executor;
pub mod pending;

pub use executor::{default_thread_pool, ExecutorFn, Task, TaskExecutor};
pub use pending::Pending;

use crate::core::traits::{require_non_negative, require_positive};
use crate::core::AccountStore;
use crate::types::{AccountKey, Balances, Currency, LedgerError};
use futures::channel::oneshot;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared state behind every clone of a [`Ledger`]
struct Inner {
    store: Arc<dyn AccountStore>,
    executor: Arc<dyn TaskExecutor>,
    /// Set by `shutdown`; no new work is accepted afterwards
    closing: AtomicBool,
    /// Set once the store has been closed
    closed: AtomicBool,
    in_flight: AtomicUsize,
}

impl Inner {
    fn close_store(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.store.close() {
            Ok(()) => info!("ledger store closed"),
            Err(e) => error!(error = %e, "failed to close ledger store"),
        }
    }
}

/// Counts one submitted task; released when the task finishes or is dropped
struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let was_last = self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1;
        if was_last && self.0.closing.load(Ordering::SeqCst) {
            self.0.close_store();
        }
    }
}

/// Asynchronous handle to the account ledger
///
/// Construct once at startup and clone it into every consumer. All clones
/// share the same store, executor and shutdown state.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("closing", &self.inner.closing.load(Ordering::SeqCst))
            .field("in_flight", &self.inner.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

impl Ledger {
    pub fn new(store: Arc<dyn AccountStore>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                executor,
                closing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Submit `f` to the executor and return its future result
    fn dispatch<T, F>(&self, operation: &'static str, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn AccountStore) -> Result<T, LedgerError> + Send + 'static,
    {
        let inner = &self.inner;
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(inner));
        if inner.closing.load(Ordering::SeqCst) {
            return Pending::failed(LedgerError::ShutDown);
        }

        debug!(operation, "dispatching ledger operation");
        let (tx, rx) = oneshot::channel();
        inner.executor.execute(Box::new(move || {
            let result = f(guard.0.store.as_ref());
            // Release before replying so an awaited call is no longer in flight
            drop(guard);
            // The caller may have stopped waiting; the work is done either way
            let _ = tx.send(result);
        }));
        Pending::waiting(rx)
    }

    /// Balance of one tier
    pub fn get(&self, account: &AccountKey, currency: Currency) -> Pending<i64> {
        let account = account.clone();
        self.dispatch("get", move |store| store.get(&account, currency))
    }

    pub fn get_default(&self, account: &AccountKey) -> Pending<i64> {
        self.get(account, Currency::DEFAULT)
    }

    /// All four balances
    pub fn balances(&self, account: &AccountKey) -> Pending<Balances> {
        let account = account.clone();
        self.dispatch("balances", move |store| store.balances(&account))
    }

    pub fn set(&self, account: &AccountKey, currency: Currency, amount: i64) -> Pending<()> {
        if let Err(e) = require_non_negative("set", amount) {
            return Pending::failed(e);
        }
        let account = account.clone();
        self.dispatch("set", move |store| store.set(&account, currency, amount))
    }

    pub fn set_default(&self, account: &AccountKey, amount: i64) -> Pending<()> {
        self.set(account, Currency::DEFAULT, amount)
    }

    pub fn add(&self, account: &AccountKey, currency: Currency, amount: i64) -> Pending<()> {
        if let Err(e) = require_positive("add", amount) {
            return Pending::failed(e);
        }
        let account = account.clone();
        self.dispatch("add", move |store| store.add(&account, currency, amount))
    }

    pub fn add_default(&self, account: &AccountKey, amount: i64) -> Pending<()> {
        self.add(account, Currency::DEFAULT, amount)
    }

    pub fn subtract(&self, account: &AccountKey, currency: Currency, amount: i64) -> Pending<()> {
        if let Err(e) = require_positive("subtract", amount) {
            return Pending::failed(e);
        }
        let account = account.clone();
        self.dispatch("subtract", move |store| {
            store.subtract(&account, currency, amount)
        })
    }

    pub fn subtract_default(&self, account: &AccountKey, amount: i64) -> Pending<()> {
        self.subtract(account, Currency::DEFAULT, amount)
    }

    /// Move `amount` between accounts; both sides apply or neither does
    pub fn transfer(
        &self,
        from: &AccountKey,
        to: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Pending<()> {
        if let Err(e) = require_positive("transfer", amount) {
            return Pending::failed(e);
        }
        let from = from.clone();
        let to = to.clone();
        self.dispatch("transfer", move |store| {
            store.transfer(&from, &to, currency, amount)
        })
    }

    pub fn transfer_default(&self, from: &AccountKey, to: &AccountKey, amount: i64) -> Pending<()> {
        self.transfer(from, to, Currency::DEFAULT, amount)
    }

    /// Create a zero-balance record if absent, e.g. when a session starts
    pub fn ensure_exists(&self, account: &AccountKey) -> Pending<()> {
        let account = account.clone();
        self.dispatch("ensure_exists", move |store| store.ensure_exists(&account))
    }

    /// Stop accepting work and close the store once in-flight calls finish
    pub fn shutdown(&self) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        let in_flight = self.inner.in_flight.load(Ordering::SeqCst);
        info!(in_flight, "ledger shutting down");
        if in_flight == 0 {
            self.inner.close_store();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }
}
