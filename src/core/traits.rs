//! Core trait for ledger storage backends
//!
//! This module defines the trait abstraction that lets the embedded, pooled
//! and in-memory stores be used interchangeably behind the dispatch wrapper.

use crate::types::{AccountKey, Balances, Currency, LedgerError};

/// Blocking account ledger operations
///
/// Every operation lazily creates the accounts it touches. Implementations
/// must keep each balance non-negative and apply a transfer entirely or not
/// at all. Calls block the current thread; use [`crate::Ledger`] to issue
/// them from an event loop.
pub trait AccountStore: Send + Sync {
    /// Balance of one tier
    fn get(&self, account: &AccountKey, currency: Currency) -> Result<i64, LedgerError>;

    /// All four balances in one read
    fn balances(&self, account: &AccountKey) -> Result<Balances, LedgerError>;

    /// Overwrite a balance; `amount` must be zero or positive
    fn set(&self, account: &AccountKey, currency: Currency, amount: i64)
        -> Result<(), LedgerError>;

    /// Credit a balance; `amount` must be positive
    fn add(&self, account: &AccountKey, currency: Currency, amount: i64)
        -> Result<(), LedgerError>;

    /// Debit a balance; fails with `InsufficientFunds` if it would go negative
    fn subtract(
        &self,
        account: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError>;

    /// Move `amount` from one account to another as a single unit
    fn transfer(
        &self,
        from: &AccountKey,
        to: &AccountKey,
        currency: Currency,
        amount: i64,
    ) -> Result<(), LedgerError>;

    /// Create a zero-balance record if absent
    fn ensure_exists(&self, account: &AccountKey) -> Result<(), LedgerError>;

    /// Release connections; later calls fail with `LedgerError::Closed`
    fn close(&self) -> Result<(), LedgerError>;
}

/// Reject amounts that are not strictly positive
pub fn require_positive(operation: &str, amount: i64) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::invalid_amount(operation, amount));
    }
    Ok(())
}

/// Reject negative balance targets
pub fn require_non_negative(operation: &str, amount: i64) -> Result<(), LedgerError> {
    if amount < 0 {
        return Err(LedgerError::invalid_amount(operation, amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-1)]
    #[case::min(i64::MIN)]
    fn test_require_positive_rejects(#[case] amount: i64) {
        let err = require_positive("add", amount).unwrap_err();
        assert_eq!(err, LedgerError::invalid_amount("add", amount));
    }

    #[test]
    fn test_require_non_negative_accepts_zero() {
        assert!(require_non_negative("set", 0).is_ok());
        assert!(require_non_negative("set", -5).is_err());
    }
}
