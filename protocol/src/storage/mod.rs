//! # Storage Module
//!
//! Persistent storage for the ledger. [`LedgerDb`] implements
//! [`LedgerStore`](crate::ledger::LedgerStore) on sled so balances, records
//! and consumed authorization nonces survive restarts.
//!
//! Values are bincode on disk. JSON is for the CLI and QR payloads.

pub mod db;

pub use db::LedgerDb;
