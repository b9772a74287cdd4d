//! Game Ledger Library
//! # Overview
//!
//! Persistent multi-currency balances for game-server accounts, with a
//! non-blocking API suitable for calling from a tick loop.
//!
//! # Architecture
//!
//! - [`types`] - Account keys, currencies, balances and errors
//! - [`core`] - Blocking storage backends behind [`AccountStore`]:
//!   - [`core::embedded`] - Single-file SQLite store guarded by a mutex
//!   - [`core::pooled`] - MySQL store over an r2d2 connection pool
//!   - [`core::memory`] - Volatile store for tests and tooling
//! - [`dispatch`] - [`Ledger`], which runs store calls on an injected executor
//! - [`config`] - `db.*` settings layered over environment variables
//! - [`backend`] - Builds the configured store at startup
//! - [`cli`] - Operator command line
//!
//! # Currencies
//!
//! Every account carries four independent balances: `coin` (the default),
//! `copper`, `silver` and `gold`. Balances are whole numbers and never go
//! negative.
//!
//! # Example
//!
//! ```no_run
//! use game_ledger::{open_ledger, AccountKey, Currency, LedgerConfig};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! # async fn demo(handle: tokio::runtime::Handle) -> Result<(), game_ledger::LedgerError> {
//! let config = LedgerConfig::resolve(&HashMap::new())?;
//! let ledger = open_ledger(&config, Arc::new(handle))?;
//! let p1 = AccountKey::player("P1")?;
//! let p2 = AccountKey::player("P2")?;
//!
//! ledger.add(&p1, Currency::Gold, 100).await?;
//! ledger.transfer(&p1, &p2, Currency::Gold, 60).await?;
//! assert_eq!(ledger.get(&p2, Currency::Gold).await?, 60);
//!
//! ledger.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod types;

pub use crate::backend::{open_ledger, open_store};
pub use crate::config::{BackendKind, LedgerConfig, MySqlConfig, PoolConfig, SqliteConfig};
pub use crate::core::{AccountStore, EmbeddedStore, MemoryStore, PooledStore};
pub use crate::dispatch::{default_thread_pool, ExecutorFn, Ledger, Pending, Task, TaskExecutor};
pub use crate::types::{AccountKey, AccountType, Balances, Currency, ErrorKind, LedgerError};
