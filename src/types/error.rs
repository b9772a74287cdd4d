//! Error types for the game ledger
//!
//! Every failure a ledger operation can produce is a [`LedgerError`]. The
//! variants fall into three classes, reported by [`LedgerError::kind`]:
//!
//! - **Validation**: unknown currency, malformed account key, amount out of
//!   range, bad configuration. Raised before any storage access.
//! - **Rejected**: the request was well formed but a business rule refused
//!   it (insufficient funds, balance overflow). Nothing was mutated.
//! - **Storage**: the engine or transport failed, or the ledger is no longer
//!   accepting work. Any open transaction was rolled back first.
//!
//! Call sites that only care about success can collapse a result to a
//! boolean, but the classes stay distinguishable so a UI can tell "not
//! enough coin" apart from "unknown currency" or "database down".

use super::currency::Currency;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Rejected,
    Storage,
}

/// Main error type for ledger operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Currency identifier is not one of the known tiers
    #[error("Unknown currency '{name}'")]
    UnknownCurrency {
        /// The identifier as supplied by the caller
        name: String,
    },

    /// Account type tag is not one of the known categories
    #[error("Unknown account type '{name}'")]
    UnknownAccountType {
        /// The tag as supplied by the caller
        name: String,
    },

    /// Account identifier is empty or too long for the schema
    #[error("Invalid account id '{id}': {reason}")]
    InvalidAccountId {
        /// The rejected identifier
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Amount is outside the range accepted by the operation
    #[error("Invalid amount {amount} for {operation}")]
    InvalidAmount {
        /// Operation that rejected the amount
        operation: String,
        /// The rejected amount
        amount: i64,
    },

    /// Source balance is lower than the requested debit
    #[error("Insufficient {currency} for {account}: requested {requested}")]
    InsufficientFunds {
        /// Display form of the debited account key
        account: String,
        /// Tier being debited
        currency: Currency,
        /// Requested debit
        requested: i64,
    },

    /// Credit would push the balance past the largest storable value
    #[error("Balance overflow in {currency} for {account}: adding {amount}")]
    BalanceOverflow {
        /// Display form of the credited account key
        account: String,
        /// Tier being credited
        currency: Currency,
        /// Requested credit
        amount: i64,
    },

    /// Database engine or transport failure
    #[error("Storage error: {message}")]
    Storage {
        /// Description reported by the engine or pool
        message: String,
    },

    /// Configuration value could not be interpreted
    #[error("Configuration error for '{key}': {message}")]
    Config {
        /// Configuration key that failed
        key: String,
        /// What was wrong with it
        message: String,
    },

    /// File system failure while preparing storage
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// Store was closed before the operation ran
    #[error("Account store is closed")]
    Closed,

    /// Ledger is shutting down and no longer accepts work
    #[error("Ledger is shut down")]
    ShutDown,

    /// Executor dropped the task before it produced a result
    #[error("Ledger task was dropped before completion")]
    TaskDropped,
}

impl LedgerError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::UnknownCurrency { .. }
            | LedgerError::UnknownAccountType { .. }
            | LedgerError::InvalidAccountId { .. }
            | LedgerError::InvalidAmount { .. }
            | LedgerError::Config { .. } => ErrorKind::Validation,
            LedgerError::InsufficientFunds { .. } | LedgerError::BalanceOverflow { .. } => {
                ErrorKind::Rejected
            }
            LedgerError::Storage { .. }
            | LedgerError::IoError { .. }
            | LedgerError::Closed
            | LedgerError::ShutDown
            | LedgerError::TaskDropped => ErrorKind::Storage,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_storage(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, LedgerError::InsufficientFunds { .. })
    }

    /// Create an UnknownCurrency error
    pub fn unknown_currency(name: &str) -> Self {
        LedgerError::UnknownCurrency {
            name: name.to_string(),
        }
    }

    /// Create an UnknownAccountType error
    pub fn unknown_account_type(name: &str) -> Self {
        LedgerError::UnknownAccountType {
            name: name.to_string(),
        }
    }

    /// Create an InvalidAccountId error
    pub fn invalid_account_id(id: &str, reason: &str) -> Self {
        LedgerError::InvalidAccountId {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(operation: &str, amount: i64) -> Self {
        LedgerError::InvalidAmount {
            operation: operation.to_string(),
            amount,
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: impl ToString, currency: Currency, requested: i64) -> Self {
        LedgerError::InsufficientFunds {
            account: account.to_string(),
            currency,
            requested,
        }
    }

    /// Create a BalanceOverflow error
    pub fn balance_overflow(account: impl ToString, currency: Currency, amount: i64) -> Self {
        LedgerError::BalanceOverflow {
            account: account.to_string(),
            currency,
            amount,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl ToString) -> Self {
        LedgerError::Storage {
            message: message.to_string(),
        }
    }

    /// Create a Config error
    pub fn config(key: &str, message: impl ToString) -> Self {
        LedgerError::Config {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(error: config::ConfigError) -> Self {
        // Type errors carry the offending key; anything else is blamed on the section
        let key = match &error {
            config::ConfigError::Type { key: Some(key), .. } => key.clone(),
            config::ConfigError::NotFound(key) => key.clone(),
            _ => "db".to_string(),
        };
        LedgerError::Config {
            key,
            message: error.to_string(),
        }
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(error: rusqlite::Error) -> Self {
        LedgerError::storage(error)
    }
}

impl From<r2d2::Error> for LedgerError {
    fn from(error: r2d2::Error) -> Self {
        LedgerError::storage(format!("connection pool: {}", error))
    }
}

impl From<r2d2_mysql::mysql::Error> for LedgerError {
    fn from(error: r2d2_mysql::mysql::Error) -> Self {
        LedgerError::storage(error)
    }
}
