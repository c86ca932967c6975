//! The storage contract the ledger engine commits through.
//!
//! A [`CommitBatch`] is all-or-nothing: every balance compare-and-swap,
//! the record append and the optional nonce consumption land together, or
//! the store reports why none of them did.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::account::Account;
use crate::transaction::record::TransactionRecord;
use crate::transaction::types::Currency;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("account not found: {0}")]
    NotFound(Uuid),

    #[error("account already exists: {0}")]
    AlreadyExists(Uuid),

    /// A balance no longer holds the value the batch expected.
    #[error("balance of {account} ({currency}) changed underneath the commit")]
    Conflict { account: Uuid, currency: Currency },

    #[error("authorization nonce already consumed: {0}")]
    NonceConsumed(String),

    /// A record with this id is already in the ledger.
    #[error("record already committed: {0}")]
    RecordExists(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Conflicts and I/O failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Commit batch
// ---------------------------------------------------------------------------

/// Replace `expected` with `new` for one (account, currency) balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSwap {
    pub account: Uuid,
    pub currency: Currency,
    pub expected: u64,
    pub new: u64,
}

/// A payment authorization nonce consumed by this commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedNonce {
    /// `merchant_id:nonce`.
    pub key: String,
    /// The authorization's `t`, used for pruning.
    pub issued_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    pub swaps: Vec<BalanceSwap>,
    pub record: TransactionRecord,
    pub nonce: Option<ConsumedNonce>,
}

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Persistence for accounts, ledger records and consumed nonces.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Insert a new account. Fails with `AlreadyExists` rather than
    /// overwriting balances.
    async fn put_account(&self, account: Account) -> Result<(), StoreError>;

    /// Apply a batch atomically. Each touched account's `version` goes up
    /// by one.
    async fn commit(&self, batch: CommitBatch) -> Result<(), StoreError>;

    /// Every record where `account` is sender or receiver, newest first.
    async fn records_for(&self, account: Uuid) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Forget nonces issued before `issued_before` (Unix millis). Returns
    /// how many were removed.
    async fn prune_nonces(&self, issued_before: u64) -> Result<usize, StoreError>;
}
