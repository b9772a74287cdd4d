//! Volatile in-memory store
//!
//! Backs `db.type = memory` and tests that do not need a database file.
//! Balances live in a `DashMap`, so single-account operations on different
//! accounts proceed in parallel and operations on the same account are
//! serialized by the map's entry lock.
//!
//! Transfers touch two entries. Holding two entry guards at once can
//! deadlock when both keys land in the same shard, so a transfer instead
//! takes the write side of a gate that every other operation enters in
//! read mode. No reader can observe a transfer half-applied.

use super::traits::{require_non_negative, require_positive, AccountStore};
use crate::types::{AccountKey, Balances, Currency, LedgerError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Account store that keeps balances in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<AccountKey, Balances>,
    /// Read: single-account operation; write: transfer
    gate: RwLock<()>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts created so far
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn check_open(&self) -> Result<(), LedgerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LedgerError::Closed);
        }
        Ok(())
    }

    /// Apply `f` to the account's balances, creating the account first
    fn update<T, F>(&self, account: &AccountKey, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Balances) -> Result<T, LedgerError>,
    {
        self.check_open()?;
        let _shared = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let mut entry = self.accounts.entry(account.clone()).or_default();
        f(entry.value_mut())
    }
}

fn credit(
    balances: &mut Balances,
    account: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    let slot = balances.slot_mut(currency);
    *slot = slot
        .checked_add(amount)
        .ok_or_else(|| LedgerError::balance_overflow(account, currency, amount))?;
    Ok(())
}

fn debit(
    balances: &mut Balances,
    account: &AccountKey,
    currency: Currency,
    amount: i64,
) -> Result<(), LedgerError> {
    let slot = balances.slot_mut(currency);
    if *slot < amount {
        return Err(LedgerError::insufficient_funds(account, currency, amount));
    }
    *slot -= amount;
    Ok(())
}

impl AccountStore for MemoryStore {
    fn get(&self, account: &AccountKey, currency: Currency) -> Result<i64, LedgerError> {
        self.update(account, |balances| Ok(balances.get(currency)))
    }

    fn balances(&self, account: &AccountKey) -> Result<Balances, LedgerError> {
        self.update(account, |balances| Ok(*balances))
    }

    fn set(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_non_negative("set", amount)?;
        self.update(account, |balances| {
            *balances.slot_mut(currency) = amount;
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
        self.update(account, |balances| credit(balances, account, currency, amount))
    }

    fn subtract(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_positive("subtract", amount)?;
        self.update(account, |balances| debit(balances, account, currency, amount))
    }

    fn transfer(
        &self,
        from: &AccountKey,
        to: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError> {
        require_positive("transfer", amount)?;
        self.check_open()?;
        let _exclusive = self.gate.write().unwrap_or_else(PoisonError::into_inner);

        // Work on copies so a failed credit leaves both entries untouched
        let mut source = *self.accounts.entry(from.clone()).or_default();
        debit(&mut source, from, currency, amount)?;
        if from == to {
            // Debit then credit of the same row nets to zero
            return Ok(());
        }
        let mut target = *self.accounts.entry(to.clone()).or_default();
        credit(&mut target, to, currency, amount)?;

        self.accounts.insert(from.clone(), source);
        self.accounts.insert(to.clone(), target);
        debug!(%from, %to, %currency, amount, "transfer applied");
        Ok(())
    }

    fn ensure_exists(&self, account: &AccountKey) -> Result<(), LedgerError> {
        self.update(account, |_| Ok(()))
    }

    fn close(&self) -> Result<(), LedgerError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
