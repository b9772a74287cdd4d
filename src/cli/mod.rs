// CLI module
// Operator commands for inspecting and adjusting balances

mod args;

pub use args::{BackendArg, CliArgs, Command};

use crate::backend::open_ledger;
use crate::dispatch::Ledger;
use crate::types::{AccountKey, Currency, LedgerError};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;

/// Parse command-line arguments using clap
///
/// On invalid arguments or `--help`, clap prints its message and exits the
/// process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Run one command against the configured backend
///
/// Store calls are dispatched onto the blocking pool of a multi-threaded
/// tokio runtime, the same path a game server takes. The ledger is shut
/// down before returning, whether or not the command succeeded.
pub fn run(args: &CliArgs, output: &mut dyn Write) -> Result<(), LedgerError> {
    let config = args.to_config()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let ledger = open_ledger(&config, Arc::new(runtime.handle().clone()))?;
    let result = runtime.block_on(execute(&ledger, &args.command, output));
    ledger.shutdown();
    result
}

async fn execute(
    ledger: &Ledger,
    command: &Command,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    match command {
        Command::Get {
            account,
            account_type,
            currency,
        } => {
            let key = AccountKey::new(account.as_str(), *account_type)?;
            let balance = ledger.get(&key, *currency).await?;
            writeln!(output, "{} {} = {}", key, currency, balance)?;
        }
        Command::Balances {
            account,
            account_type,
        } => {
            let key = AccountKey::new(account.as_str(), *account_type)?;
            let balances = ledger.balances(&key).await?;
            for currency in Currency::ALL {
                writeln!(output, "{} {} = {}", key, currency, balances.get(currency))?;
            }
        }
        Command::Set {
            account,
            amount,
            account_type,
            currency,
        } => {
            let key = AccountKey::new(account.as_str(), *account_type)?;
            ledger.set(&key, *currency, *amount).await?;
            writeln!(output, "OK")?;
        }
        Command::Add {
            account,
            amount,
            account_type,
            currency,
        } => {
            let key = AccountKey::new(account.as_str(), *account_type)?;
            ledger.add(&key, *currency, *amount).await?;
            writeln!(output, "OK")?;
        }
        Command::Subtract {
            account,
            amount,
            account_type,
            currency,
        } => {
            let key = AccountKey::new(account.as_str(), *account_type)?;
            ledger.subtract(&key, *currency, *amount).await?;
            writeln!(output, "OK")?;
        }
        Command::Transfer {
            from,
            to,
            amount,
            from_type,
            to_type,
            currency,
        } => {
            let from = AccountKey::new(from.as_str(), *from_type)?;
            let to = AccountKey::new(to.as_str(), *to_type)?;
            ledger.transfer(&from, &to, *currency, *amount).await?;
            writeln!(output, "OK")?;
        }
        Command::Ensure {
            account,
            account_type,
        } => {
            let key = AccountKey::new(account.as_str(), *account_type)?;
            ledger.ensure_exists(&key).await?;
            writeln!(output, "OK")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run_with(db: &TempDir, argv: &[&str]) -> Result<String, LedgerError> {
        let path = db.path().join("ledger.db");
        let mut full = vec!["game-ledger", "--db-type", "sqlite", "--sqlite-path"];
        full.push(path.to_str().unwrap());
        full.extend_from_slice(argv);

        let args = CliArgs::try_parse_from(full).unwrap();
        let mut output = Vec::new();
        run(&args, &mut output)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_commands_persist_between_runs() {
        let db = TempDir::new().unwrap();

        assert_eq!(run_with(&db, &["add", "P1", "100"]).unwrap(), "OK\n");
        assert_eq!(
            run_with(&db, &["transfer", "P1", "P2", "60"]).unwrap(),
            "OK\n"
        );

        assert_eq!(
            run_with(&db, &["get", "P1"]).unwrap(),
            "PLAYER:P1 coin = 40\n"
        );
        assert_eq!(
            run_with(&db, &["balances", "P2"]).unwrap(),
            "PLAYER:P2 coin = 60\nPLAYER:P2 copper = 0\nPLAYER:P2 silver = 0\nPLAYER:P2 gold = 0\n"
        );
    }

    #[test]
    fn test_insufficient_funds_is_reported() {
        let db = TempDir::new().unwrap();
        run_with(&db, &["set", "P1", "10", "--currency", "gold"]).unwrap();

        let err = run_with(&db, &["subtract", "P1", "11", "--currency", "gold"]).unwrap_err();

        assert!(err.is_insufficient_funds());
        assert_eq!(
            run_with(&db, &["get", "P1", "--currency", "gold"]).unwrap(),
            "PLAYER:P1 gold = 10\n"
        );
    }

    #[test]
    fn test_invalid_account_id_is_rejected() {
        let db = TempDir::new().unwrap();
        let long_id = "x".repeat(37);

        let err = run_with(&db, &["ensure", long_id.as_str()]).unwrap_err();

        assert!(err.is_validation());
    }

    #[test]
    fn test_negative_set_is_rejected() {
        let db = TempDir::new().unwrap();

        let err = run_with(&db, &["set", "P1", "-5"]).unwrap_err();

        assert_eq!(err, LedgerError::invalid_amount("set", -5));
    }
}
