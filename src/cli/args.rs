use crate::config::{env_overrides, BackendKind, LedgerConfig};
use crate::types::{AccountType, Currency, LedgerError};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;

/// Inspect and adjust game account balances
#[derive(Parser, Debug)]
#[command(name = "game-ledger")]
#[command(about = "Inspect and adjust game account balances", long_about = None)]
pub struct CliArgs {
    /// Storage backend, overriding db.type
    #[arg(
        long = "db-type",
        value_name = "BACKEND",
        help = "Storage backend: 'sqlite', 'mysql' or 'memory' (default: from environment, else sqlite)"
    )]
    pub db_type: Option<BackendArg>,

    /// Database file for the sqlite backend, overriding db.sqlite.path
    #[arg(long = "sqlite-path", value_name = "PATH")]
    pub sqlite_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Backends selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Sqlite,
    Mysql,
    Memory,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sqlite => BackendKind::Sqlite,
            BackendArg::Mysql => BackendKind::MySql,
            BackendArg::Memory => BackendKind::Memory,
        }
    }
}

/// Ledger operation to run
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print one balance
    Get {
        account: String,
        #[arg(long = "type", default_value = "PLAYER")]
        account_type: AccountType,
        #[arg(long, default_value = "coin")]
        currency: Currency,
    },
    /// Print all four balances
    Balances {
        account: String,
        #[arg(long = "type", default_value = "PLAYER")]
        account_type: AccountType,
    },
    /// Overwrite a balance
    Set {
        account: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(long = "type", default_value = "PLAYER")]
        account_type: AccountType,
        #[arg(long, default_value = "coin")]
        currency: Currency,
    },
    /// Credit a balance
    Add {
        account: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(long = "type", default_value = "PLAYER")]
        account_type: AccountType,
        #[arg(long, default_value = "coin")]
        currency: Currency,
    },
    /// Debit a balance
    Subtract {
        account: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(long = "type", default_value = "PLAYER")]
        account_type: AccountType,
        #[arg(long, default_value = "coin")]
        currency: Currency,
    },
    /// Move funds between two accounts
    Transfer {
        from: String,
        to: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
        #[arg(long = "from-type", default_value = "PLAYER")]
        from_type: AccountType,
        #[arg(long = "to-type", default_value = "PLAYER")]
        to_type: AccountType,
        #[arg(long, default_value = "coin")]
        currency: Currency,
    },
    /// Create an account with zero balances if it does not exist
    Ensure {
        account: String,
        #[arg(long = "type", default_value = "PLAYER")]
        account_type: AccountType,
    },
}

impl CliArgs {
    /// Resolve the ledger configuration
    ///
    /// Command-line flags win over environment overrides, which win over
    /// the built-in defaults.
    pub fn to_config(&self) -> Result<LedgerConfig, LedgerError> {
        self.to_config_with(&env_overrides())
    }

    pub fn to_config_with(
        &self,
        env: &HashMap<String, String>,
    ) -> Result<LedgerConfig, LedgerError> {
        let mut config = LedgerConfig::resolve_with(env, &HashMap::new())?;
        if let Some(db_type) = self.db_type {
            config.backend = db_type.into();
        }
        if let Some(path) = &self.sqlite_path {
            config.sqlite.path = path.clone();
        }
        Ok(config)
    }
}
