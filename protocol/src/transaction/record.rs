//! Ledger record construction via the builder pattern.
//!
//! The [`RecordBuilder`] sets the fields, fills in the timestamp if the
//! caller didn't, and hands back a `Pending`, unsigned [`TransactionRecord`].
//! Signing happens in [`super::signing`] so construction stays testable
//! without key material.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::types::{Currency, Party, TransactionStatus, TransactionType};
use crate::config::now_millis;

/// Attempted to move a record out of a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {id} is already {status}")]
pub struct StatusTransitionError {
    pub id: Uuid,
    pub status: TransactionStatus,
}

/// Signature attached to a record by its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSignature {
    /// Compact `(r, s)`, 64 bytes as 128 hex characters.
    pub signature: String,
    /// Public key recovery id (0..=3).
    pub recovery_id: i32,
    /// Hex of the canonical hash that was signed.
    pub hash: String,
}

// ---------------------------------------------------------------------------
// TransactionRecord
// ---------------------------------------------------------------------------

/// One entry in the SmartPay ledger.
///
/// # Canonical Byte Format
///
/// Hashing and signing use [`TransactionRecord::signable_bytes`], which
/// serializes type, sender, receiver, amount, currency and timestamp.
/// `id`, `status` and `signature` are excluded, so a record hashes the same
/// before and after it is signed or completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub sender: Party,
    pub receiver: Party,
    /// Always positive, in minor units. WITHDRAW direction comes from the
    /// type, not from the sign.
    pub amount: u64,
    pub currency: Currency,
    pub status: TransactionStatus,
    /// Unix milliseconds.
    pub timestamp: u64,
    pub signature: Option<RecordSignature>,
}

impl TransactionRecord {
    /// Canonical bytes for hashing and signing.
    ///
    /// Fixed field order, null-byte separators after variable-length
    /// fields, little-endian fixed-width integers. Never serde: field order
    /// in a serializer is not a contract.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);

        buf.extend_from_slice(self.tx_type.code().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(self.sender.id.as_bytes());
        buf.extend_from_slice(self.sender.kind.code().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(self.receiver.id.as_bytes());
        buf.extend_from_slice(self.receiver.kind.code().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&self.amount.to_le_bytes());

        buf.extend_from_slice(self.currency.code().as_bytes());
        buf.push(0x00);

        buf.extend_from_slice(&self.timestamp.to_le_bytes());

        buf
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// `Pending -> Completed`.
    pub fn complete(&mut self) -> Result<(), StatusTransitionError> {
        self.transition(TransactionStatus::Completed)
    }

    /// `Pending -> Failed`.
    pub fn fail(&mut self) -> Result<(), StatusTransitionError> {
        self.transition(TransactionStatus::Failed)
    }

    fn transition(&mut self, to: TransactionStatus) -> Result<(), StatusTransitionError> {
        if self.status.is_terminal() {
            return Err(StatusTransitionError {
                id: self.id,
                status: self.status,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Whether `account` is on either side of this record.
    pub fn involves(&self, account: Uuid) -> bool {
        self.sender.id == account || self.receiver.id == account
    }
}

// ---------------------------------------------------------------------------
// RecordBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned, pending [`TransactionRecord`]s.
///
/// ```
/// use smartpay_protocol::transaction::{Currency, Party, RecordBuilder, TransactionType};
/// use uuid::Uuid;
///
/// let (alice, shop) = (Uuid::new_v4(), Uuid::new_v4());
/// let record = RecordBuilder::new(TransactionType::Payment)
///     .sender(Party::user(alice))
///     .receiver(Party::merchant(shop))
///     .amount(3_000)
///     .currency(Currency::SmartPay)
///     .build();
/// assert!(!record.is_signed());
/// ```
pub struct RecordBuilder {
    id: Option<Uuid>,
    tx_type: TransactionType,
    sender: Option<Party>,
    receiver: Option<Party>,
    amount: u64,
    currency: Currency,
    timestamp: Option<u64>,
}

impl RecordBuilder {
    /// Defaults: random id, zero amount, `SMART_PAY`, timestamp at build time.
    pub fn new(tx_type: TransactionType) -> Self {
        Self {
            id: None,
            tx_type,
            sender: None,
            receiver: None,
            amount: 0,
            currency: Currency::SmartPay,
            timestamp: None,
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn sender(mut self, party: Party) -> Self {
        self.sender = Some(party);
        self
    }

    /// Defaults to the sender when unset, which is what DEPOSIT wants.
    pub fn receiver(mut self, party: Party) -> Self {
        self.receiver = Some(party);
        self
    }

    pub fn amount(mut self, minor_units: u64) -> Self {
        self.amount = minor_units;
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Unix milliseconds. If not called, `build()` uses the current time.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> TransactionRecord {
        let sender = self.sender.unwrap_or_else(|| Party::user(Uuid::nil()));
        TransactionRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            tx_type: self.tx_type,
            sender,
            receiver: self.receiver.unwrap_or(sender),
            amount: self.amount,
            currency: self.currency,
            status: TransactionStatus::Pending,
            timestamp: self.timestamp.unwrap_or_else(now_millis),
            signature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransactionRecord {
        RecordBuilder::new(TransactionType::Transfer)
            .sender(Party::user(Uuid::from_u128(1)))
            .receiver(Party::user(Uuid::from_u128(2)))
            .amount(1_000)
            .currency(Currency::LocalCurrency)
            .timestamp(1_700_000_000_000)
            .build()
    }

    #[test]
    fn build_defaults() {
        let before = now_millis();
        let r = RecordBuilder::new(TransactionType::Deposit)
            .sender(Party::user(Uuid::from_u128(9)))
            .amount(5)
            .build();
        assert_eq!(r.status, TransactionStatus::Pending);
        assert!(r.timestamp >= before);
        assert_eq!(r.receiver, r.sender);
        assert_eq!(r.currency, Currency::SmartPay);
        assert!(!r.is_signed());
    }

    #[test]
    fn signable_bytes_deterministic() {
        let a = sample();
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        b.status = TransactionStatus::Completed;
        assert_eq!(a.signable_bytes(), b.signable_bytes());
    }

    #[test]
    fn signable_bytes_cover_every_hashed_field() {
        let base = sample().signable_bytes();
        let mutations: Vec<Box<dyn Fn(&mut TransactionRecord)>> = vec![
            Box::new(|r| r.tx_type = TransactionType::Payment),
            Box::new(|r| r.sender.id = Uuid::from_u128(3)),
            Box::new(|r| r.sender.kind = crate::transaction::PartyKind::Merchant),
            Box::new(|r| r.receiver.id = Uuid::from_u128(4)),
            Box::new(|r| r.receiver.kind = crate::transaction::PartyKind::Merchant),
            Box::new(|r| r.amount += 1),
            Box::new(|r| r.currency = Currency::SmartPay),
            Box::new(|r| r.timestamp += 1),
        ];
        for mutate in mutations {
            let mut r = sample();
            mutate(&mut r);
            assert_ne!(r.signable_bytes(), base);
        }
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut r = sample();
        r.complete().unwrap();
        assert_eq!(r.status, TransactionStatus::Completed);
        assert!(r.fail().is_err());
        assert!(r.complete().is_err());
        assert_eq!(r.status, TransactionStatus::Completed);

        let mut r = sample();
        r.fail().unwrap();
        assert!(r.complete().is_err());
        assert_eq!(r.status, TransactionStatus::Failed);
    }

    #[test]
    fn json_uses_type_key() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "TRANSFER");
        assert_eq!(json["currency"], "LOCAL_CURRENCY");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["receiver"]["kind"], "User");
    }
}
