//! Ledger accounts and their two balances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::keys::WalletPublicKey;
use crate::identity::Address;
use crate::transaction::types::{AccountKind, Currency, Party};

/// Per-currency balances in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub smart_pay: u64,
    pub local_currency: u64,
}

impl Balances {
    pub fn get(&self, currency: Currency) -> u64 {
        match currency {
            Currency::SmartPay => self.smart_pay,
            Currency::LocalCurrency => self.local_currency,
        }
    }

    pub fn set(&mut self, currency: Currency, minor_units: u64) {
        match currency {
            Currency::SmartPay => self.smart_pay = minor_units,
            Currency::LocalCurrency => self.local_currency = minor_units,
        }
    }
}

/// A user or merchant account.
///
/// `version` increments on every committed balance change. Stores use the
/// balances themselves as compare-and-swap expectations; the version is
/// there so readers can tell two snapshots apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub kind: AccountKind,
    pub display_name: String,
    pub address: Address,
    /// Registered signing key. Records carrying a signature are checked
    /// against it.
    pub public_key: Option<WalletPublicKey>,
    pub balances: Balances,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account with zero balances.
    pub fn new(
        kind: AccountKind,
        display_name: impl Into<String>,
        public_key: &WalletPublicKey,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            display_name: display_name.into(),
            address: Address::derive(public_key),
            public_key: Some(*public_key),
            balances: Balances::default(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn party(&self) -> Party {
        Party::new(self.id, self.kind.into())
    }

    pub fn balance(&self, currency: Currency) -> u64 {
        self.balances.get(currency)
    }
}
