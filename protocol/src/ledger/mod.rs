//! # Ledger Module
//!
//! Accounts, balances and the engine that moves money between them.
//!
//! ```text
//! account.rs — Account and per-currency Balances
//! store.rs   — LedgerStore trait and the atomic CommitBatch
//! memory.rs  — mutex-backed LedgerStore for tests and embedding
//! engine.rs  — validation, compare-and-swap commit, retries, queries
//! error.rs   — LedgerError
//! ```
//!
//! The sled-backed store lives in [`crate::storage`].

pub mod account;
pub mod engine;
pub mod error;
pub mod memory;
pub mod store;

pub use account::{Account, Balances};
pub use engine::{DailySales, HistoryPage, LedgerEngine, OpenedAccount};
pub use error::LedgerError;
pub use memory::MemoryStore;
pub use store::{BalanceSwap, CommitBatch, ConsumedNonce, LedgerStore, StoreError};
