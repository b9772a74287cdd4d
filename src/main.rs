//! Game Ledger CLI
//!
//! Operator tool for inspecting and adjusting account balances in the same
//! store a game server uses.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- get P1
//! cargo run -- balances red --type clan
//! cargo run -- add P1 100 --currency gold
//! cargo run -- transfer P1 P2 60
//! cargo run -- --db-type mysql set P1 0
//! ```
//!
//! Backend settings come from `GAME_LEDGER_*` environment variables
//! (for example `GAME_LEDGER_DB_MYSQL_HOST`); `--db-type` and
//! `--sqlite-path` override them. Log verbosity follows `RUST_LOG`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (invalid input, insufficient funds, storage failure)

use game_ledger::cli;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let mut output = std::io::stdout();
    if let Err(e) = cli::run(&args, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
