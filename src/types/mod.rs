//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `account`: account keys, account categories and balance snapshots
//! - `currency`: the closed set of currency tiers
//! - `error`: error types for the ledger

pub mod account;
pub mod currency;
pub mod error;

pub use account::{AccountKey, AccountType, Balances, MAX_ACCOUNT_ID_LEN};
pub use currency::Currency;
pub use error::{ErrorKind, LedgerError};
