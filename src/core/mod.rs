//! Core ledger storage module
//!
//! This module contains the account store components:
//! - `traits` - the `AccountStore` abstraction shared by every backend
//! - `schema` - SQL text for the relational backends
//! - `embedded` - single-connection SQLite store
//! - `pooled` - pooled MySQL store
//! - `memory` - volatile DashMap store

pub mod embedded;
pub mod memory;
pub mod pooled;
pub mod schema;
pub mod traits;

pub use embedded::EmbeddedStore;
pub use memory::MemoryStore;
pub use pooled::PooledStore;
pub use traits::AccountStore;
