//! # Transaction Module
//!
//! Construction, hashing and signing of SmartPay ledger records. Every
//! deposit, withdrawal, transfer and merchant payment is represented as a
//! [`TransactionRecord`].
//!
//! ```text
//! types.rs   — TransactionType, TransactionStatus, Currency, Party
//! record.rs  — TransactionRecord and its RecordBuilder
//! signing.rs — canonical hash, secp256k1 sign / verify / recover
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** a pending record with [`RecordBuilder`].
//! 2. **Sign** it with the sender's keypair ([`sign_record`]), if the sender
//!    signs its own debits.
//! 3. **Execute** it through the ledger engine, which stores it `Completed`.
//!
//! Amounts are `u64` minor units. No floating point anywhere near money.

pub mod record;
pub mod signing;
pub mod types;

pub use record::{RecordBuilder, RecordSignature, StatusTransitionError, TransactionRecord};
pub use signing::{canonical_hash, recover, sign, sign_record, verify, verify_with_key};
pub use types::{
    AccountKind, BalanceEffect, Currency, Party, PartyKind, TransactionStatus, TransactionType,
    UnknownCode,
};
