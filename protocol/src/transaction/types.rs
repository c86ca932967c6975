//! Core type definitions for SmartPay ledger transactions.
//!
//! These types form the vocabulary of every ledger record. They are `Copy`
//! wherever possible and serialize to the upper-snake-case codes the rest of
//! the SmartPay stack already speaks (`PAYMENT`, `SMART_PAY`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::CURRENCY_DECIMALS;

/// A code string that didn't name any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} code: {code}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: String,
}

// ---------------------------------------------------------------------------
// TransactionType
// ---------------------------------------------------------------------------

/// The operation a ledger record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// External funds credited to one account.
    Deposit,
    /// Funds debited from one account and paid out externally.
    Withdraw,
    /// Value moved between two user accounts.
    Transfer,
    /// Value moved from a user to a merchant.
    Payment,
}

/// How a transaction type changes the total money supply on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    /// Supply grows by the amount (DEPOSIT).
    Credit,
    /// Supply shrinks by the amount (WITHDRAW).
    Debit,
    /// Supply unchanged; value moves between two accounts.
    Move,
}

impl TransactionType {
    pub fn balance_effect(&self) -> BalanceEffect {
        match self {
            Self::Deposit => BalanceEffect::Credit,
            Self::Withdraw => BalanceEffect::Debit,
            Self::Transfer | Self::Payment => BalanceEffect::Move,
        }
    }

    /// Whether the sender's balance goes down.
    pub fn debits_sender(&self) -> bool {
        !matches!(self, Self::Deposit)
    }

    /// Stable code used in canonical bytes and on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdraw => "WITHDRAW",
            Self::Transfer => "TRANSFER",
            Self::Payment => "PAYMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for TransactionType {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(Self::Deposit),
            "WITHDRAW" => Ok(Self::Withdraw),
            "TRANSFER" => Ok(Self::Transfer),
            "PAYMENT" => Ok(Self::Payment),
            other => Err(UnknownCode {
                kind: "transaction type",
                code: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a ledger record.
///
/// `Pending` is the only non-terminal state. Records written by the ledger
/// engine are always `Completed`; rejected attempts are not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// The two balances every SmartPay account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Currency {
    /// The in-app SmartPay token balance.
    SmartPay,
    /// Local fiat currency held on the platform.
    LocalCurrency,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::SmartPay, Currency::LocalCurrency];

    pub fn code(&self) -> &'static str {
        match self {
            Self::SmartPay => "SMART_PAY",
            Self::LocalCurrency => "LOCAL_CURRENCY",
        }
    }

    /// Decimal places for display. Amounts are always integer minor units.
    pub fn decimals(&self) -> u32 {
        CURRENCY_DECIMALS
    }

    /// Render minor units as a decimal string, e.g. `12345` -> `"123.45"`.
    pub fn format_amount(&self, minor_units: u64) -> String {
        let scale = 10u64.pow(self.decimals());
        format!(
            "{}.{:0width$}",
            minor_units / scale,
            minor_units % scale,
            width = self.decimals() as usize
        )
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SMART_PAY" => Ok(Self::SmartPay),
            "LOCAL_CURRENCY" => Ok(Self::LocalCurrency),
            other => Err(UnknownCode {
                kind: "currency",
                code: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

/// What kind of account owns a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    User,
    Merchant,
}

impl AccountKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Merchant => "Merchant",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The kind attached to a record's receiver.
///
/// `SelfAccount` (`"Self"` on the wire) marks a WITHDRAW: the money leaves
/// the ledger, and the receiver id names the withdrawing account itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyKind {
    User,
    Merchant,
    #[serde(rename = "Self")]
    SelfAccount,
}

impl PartyKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Merchant => "Merchant",
            Self::SelfAccount => "Self",
        }
    }

    /// The account kind this party resolves to, if it names a real account
    /// kind. `SelfAccount` resolves through the sender instead.
    pub fn account_kind(&self) -> Option<AccountKind> {
        match self {
            Self::User => Some(AccountKind::User),
            Self::Merchant => Some(AccountKind::Merchant),
            Self::SelfAccount => None,
        }
    }
}

impl From<AccountKind> for PartyKind {
    fn from(kind: AccountKind) -> Self {
        match kind {
            AccountKind::User => Self::User,
            AccountKind::Merchant => Self::Merchant,
        }
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One side of a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub kind: PartyKind,
}

impl Party {
    pub fn new(id: Uuid, kind: PartyKind) -> Self {
        Self { id, kind }
    }

    pub fn user(id: Uuid) -> Self {
        Self::new(id, PartyKind::User)
    }

    pub fn merchant(id: Uuid) -> Self {
        Self::new(id, PartyKind::Merchant)
    }

    pub fn self_account(id: Uuid) -> Self {
        Self::new(id, PartyKind::SelfAccount)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Payment).unwrap(),
            "\"PAYMENT\""
        );
        assert_eq!(
            serde_json::to_string(&Currency::LocalCurrency).unwrap(),
            "\"LOCAL_CURRENCY\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(
            serde_json::to_string(&PartyKind::SelfAccount).unwrap(),
            "\"Self\""
        );
    }

    #[test]
    fn test_display_matches_serde() {
        for c in Currency::ALL {
            assert_eq!(serde_json::to_string(&c).unwrap(), format!("\"{}\"", c));
            assert_eq!(c.code().parse::<Currency>().unwrap(), c);
        }
        assert_eq!("WITHDRAW".parse::<TransactionType>().unwrap(), TransactionType::Withdraw);
        assert!("BITCOIN".parse::<Currency>().is_err());
    }

    #[test]
    fn test_balance_effects() {
        assert_eq!(TransactionType::Deposit.balance_effect(), BalanceEffect::Credit);
        assert_eq!(TransactionType::Withdraw.balance_effect(), BalanceEffect::Debit);
        assert_eq!(TransactionType::Transfer.balance_effect(), BalanceEffect::Move);
        assert_eq!(TransactionType::Payment.balance_effect(), BalanceEffect::Move);
        assert!(!TransactionType::Deposit.debits_sender());
        assert!(TransactionType::Withdraw.debits_sender());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(Currency::SmartPay.format_amount(0), "0.00");
        assert_eq!(Currency::SmartPay.format_amount(7), "0.07");
        assert_eq!(Currency::LocalCurrency.format_amount(12_345), "123.45");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }
}
