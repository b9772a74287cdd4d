//! SQL text shared by the relational backends
//!
//! Both engines store one row per account in `economy_accounts`. Statements
//! only differ in DDL types and the insert-if-absent syntax, so each builder
//! takes a [`Dialect`]. Column names always come from [`Currency::column`].

use crate::types::Currency;

/// Table holding every account row
pub const TABLE: &str = "economy_accounts";

/// SQL flavour of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    MySql,
}

impl Dialect {
    /// Idempotent DDL for the accounts table
    pub fn create_table(self) -> String {
        let (id_type, kind_type, balance_type) = match self {
            Dialect::Sqlite => ("TEXT", "TEXT", "INTEGER"),
            Dialect::MySql => ("VARCHAR(36)", "VARCHAR(32)", "BIGINT"),
        };
        let balances = Currency::ALL
            .iter()
            .map(|c| format!("{} {} NOT NULL DEFAULT 0", c.column(), balance_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (\
             account_id {id_type} NOT NULL, \
             account_type {kind_type} NOT NULL, \
             {balances}, \
             PRIMARY KEY (account_id, account_type))"
        )
    }

    /// Insert a zero-balance row unless the key already exists
    pub fn insert_if_absent(self) -> String {
        let verb = match self {
            Dialect::Sqlite => "INSERT OR IGNORE",
            Dialect::MySql => "INSERT IGNORE",
        };
        format!("{verb} INTO {TABLE} (account_id, account_type) VALUES (?, ?)")
    }
}

/// `SELECT <column>` for one account; params: id, type
pub fn select_balance(currency: Currency) -> String {
    format!(
        "SELECT {} FROM {TABLE} WHERE account_id = ? AND account_type = ?",
        currency.column()
    )
}

/// `SELECT` of all four columns in [`Currency::ALL`] order; params: id, type
pub fn select_balances() -> String {
    let columns = Currency::ALL
        .iter()
        .map(|c| c.column())
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {columns} FROM {TABLE} WHERE account_id = ? AND account_type = ?")
}

/// Take the row's write lock for the rest of the transaction; params: id, type
pub fn lock_row() -> String {
    format!("SELECT account_id FROM {TABLE} WHERE account_id = ? AND account_type = ? FOR UPDATE")
}

/// Overwrite a balance; params: amount, id, type
pub fn update_set(currency: Currency) -> String {
    format!(
        "UPDATE {TABLE} SET {col} = ? WHERE account_id = ? AND account_type = ?",
        col = currency.column()
    )
}

/// Increment guarded against overflow; params: amount, id, type, amount
///
/// Affects no row when `balance + amount` would exceed `i64::MAX`.
pub fn update_credit(currency: Currency) -> String {
    format!(
        "UPDATE {TABLE} SET {col} = {col} + ? \
         WHERE account_id = ? AND account_type = ? AND {col} <= {max} - ?",
        col = currency.column(),
        max = i64::MAX
    )
}

/// Decrement guarded against going negative; params: amount, id, type, amount
///
/// Affects no row when the balance is lower than the amount.
pub fn update_debit(currency: Currency) -> String {
    format!(
        "UPDATE {TABLE} SET {col} = {col} - ? \
         WHERE account_id = ? AND account_type = ? AND {col} >= ?",
        col = currency.column()
    )
}
