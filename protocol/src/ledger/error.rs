//! Error types for the ledger engine.
//!
//! Every way a ledger operation can fail maps to exactly one variant here.
//! Callers branch on the variant; [`LedgerError::is_retryable`] tells them
//! whether trying the same request again can possibly help.

use thiserror::Error;
use uuid::Uuid;

use crate::authorization::AuthorizationError;
use crate::crypto::keys::KeyError;
use crate::transaction::types::Currency;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("amount must be a positive number of minor units")]
    InvalidAmount,

    /// Parties don't fit the transaction type (e.g. a PAYMENT to a user).
    #[error("invalid counterparty: {0}")]
    InvalidCounterparty(String),

    /// The record already reached a terminal status or was already committed.
    #[error("record {0} is already finalized")]
    AlreadyFinalized(Uuid),

    #[error("signature does not verify against the sender's registered key")]
    SignatureInvalid,

    #[error("insufficient funds in {account}: {available} {currency} available, {required} required")]
    InsufficientFunds {
        account: Uuid,
        currency: Currency,
        available: u64,
        required: u64,
    },

    #[error("balance overflow crediting {account}")]
    BalanceOverflow { account: Uuid },

    #[error("payment authorization signature mismatch")]
    AuthorizationSignatureMismatch,

    #[error("payment authorization expired {overdue_ms}ms ago")]
    AuthorizationExpired { overdue_ms: u64 },

    #[error("payment authorization already redeemed")]
    AuthorizationReplayed,

    /// Lost the optimistic concurrency race on every allowed attempt.
    #[error("transfer conflicted after {attempts} attempts")]
    TransferConflict { attempts: u32 },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("random source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransferConflict { .. } | Self::StorageUnavailable(_)
        )
    }
}

impl From<AuthorizationError> for LedgerError {
    fn from(e: AuthorizationError) -> Self {
        match e {
            AuthorizationError::SignatureMismatch => Self::AuthorizationSignatureMismatch,
            AuthorizationError::Expired { overdue_ms } => Self::AuthorizationExpired { overdue_ms },
            AuthorizationError::InvalidAmount => Self::InvalidAmount,
            AuthorizationError::EntropyUnavailable(msg) => Self::EntropyUnavailable(msg),
        }
    }
}

impl From<KeyError> for LedgerError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::EntropyUnavailable(msg) => Self::EntropyUnavailable(msg),
            KeyError::InvalidSecretKey | KeyError::InvalidPublicKey => Self::SignatureInvalid,
        }
    }
}
