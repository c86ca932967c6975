//! # Ledger Transfer Engine
//!
//! Applies a transaction record to account balances. One attempt walks
//!
//! ```text
//! INITIATED -> VALIDATED -> APPLIED
//!           \-> REJECTED
//! ```
//!
//! - **VALIDATED**: the record's shape fits its type, both accounts exist
//!   and are the kinds the record claims, an attached signature verifies
//!   against the sender's registered key, and the sender can cover the
//!   amount.
//! - **APPLIED**: the debit, the credit and a `Completed` copy of the
//!   record go to the store as one compare-and-swap batch.
//! - **REJECTED**: nothing is written. The caller gets a typed error and a
//!   `warn!` line lands in the log.
//!
//! Losing a compare-and-swap race means someone else moved the balance
//! between our read and our commit. The whole attempt (read, validate,
//! commit) is repeated after a jittered exponential backoff, up to
//! `max_conflict_retries` times.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::account::{Account, Balances};
use super::error::LedgerError;
use super::store::{BalanceSwap, CommitBatch, ConsumedNonce, LedgerStore, StoreError};
use crate::authorization::AuthorizationCodec;
use crate::config::{now_millis, CoreConfig, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use crate::crypto::keys::{WalletKeypair, WalletPublicKey};
use crate::transaction::record::{RecordBuilder, TransactionRecord};
use crate::transaction::signing::{sign_record, verify_with_key};
use crate::transaction::types::{
    AccountKind, Currency, Party, PartyKind, TransactionStatus, TransactionType,
};

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// An account just registered with [`LedgerEngine::open_account`].
#[derive(Debug)]
pub struct OpenedAccount {
    pub account: Account,
    /// Present when the engine generated the key. Seal it before storing.
    pub keypair: Option<WalletKeypair>,
}

/// One page of an account's history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub records: Vec<TransactionRecord>,
    pub total: usize,
    /// 1-based.
    pub page: usize,
    pub pages: usize,
    pub limit: usize,
}

/// Completed merchant sales for one day in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub currency: Currency,
    pub total_amount: u64,
    pub count: u64,
}

// ---------------------------------------------------------------------------
// LedgerEngine
// ---------------------------------------------------------------------------

pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    codec: AuthorizationCodec,
    config: CoreConfig,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, config: CoreConfig) -> Self {
        Self {
            store,
            codec: AuthorizationCodec::new(&config),
            config,
        }
    }

    /// The codec this engine redeems authorizations with. Merchants issue
    /// through the same instance so keys always agree.
    pub fn codec(&self) -> &AuthorizationCodec {
        &self.codec
    }

    // -- Accounts -----------------------------------------------------------

    /// Register an account with zero balances. Without a public key, a
    /// fresh wallet key is generated and handed back.
    pub async fn open_account(
        &self,
        kind: AccountKind,
        display_name: &str,
        public_key: Option<WalletPublicKey>,
    ) -> Result<OpenedAccount, LedgerError> {
        let (public_key, keypair) = match public_key {
            Some(pk) => (pk, None),
            None => {
                let kp = WalletKeypair::generate()?;
                (kp.public_key(), Some(kp))
            }
        };

        let account = Account::new(kind, display_name, &public_key);
        self.bounded(self.store.put_account(account.clone()))
            .await
            .map_err(store_error)?;

        info!(
            account = %account.id,
            kind = %account.kind,
            address = %account.address,
            "opened account"
        );
        Ok(OpenedAccount { account, keypair })
    }

    pub async fn account(&self, id: Uuid) -> Result<Account, LedgerError> {
        self.bounded(self.store.get_account(id))
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    // -- Execution ----------------------------------------------------------

    /// Validate and apply a pending record. Returns the stored, `Completed`
    /// copy.
    pub async fn execute(&self, record: TransactionRecord) -> Result<TransactionRecord, LedgerError> {
        self.execute_with_nonce(record, None).await
    }

    async fn execute_with_nonce(
        &self,
        record: TransactionRecord,
        nonce: Option<ConsumedNonce>,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self.apply_with_retry(&record, nonce).await;
        match &result {
            Ok(done) => info!(
                record = %done.id,
                tx_type = %done.tx_type,
                sender = %done.sender,
                receiver = %done.receiver,
                amount = done.amount,
                currency = %done.currency,
                "ledger record committed"
            ),
            Err(e) => warn!(
                record = %record.id,
                tx_type = %record.tx_type,
                sender = %record.sender,
                error = %e,
                retryable = e.is_retryable(),
                "ledger record rejected"
            ),
        }
        result
    }

    async fn apply_with_retry(
        &self,
        record: &TransactionRecord,
        nonce: Option<ConsumedNonce>,
    ) -> Result<TransactionRecord, LedgerError> {
        validate_shape(record)?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.try_apply(record, nonce.clone()).await {
                Err(LedgerError::TransferConflict { .. })
                    if attempts <= self.config.max_conflict_retries =>
                {
                    let delay = self.backoff(attempts);
                    warn!(
                        record = %record.id,
                        attempt = attempts,
                        delay_us = delay.as_micros() as u64,
                        "balance changed during commit, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(LedgerError::TransferConflict { .. }) => {
                    return Err(LedgerError::TransferConflict { attempts })
                }
                other => return other,
            }
        }
    }

    async fn try_apply(
        &self,
        record: &TransactionRecord,
        nonce: Option<ConsumedNonce>,
    ) -> Result<TransactionRecord, LedgerError> {
        let sender = self.account(record.sender.id).await?;
        check_party(&sender, record.sender.kind)?;

        let receiver = if record.receiver.id == record.sender.id {
            None
        } else {
            let receiver = self.account(record.receiver.id).await?;
            check_party(&receiver, record.receiver.kind)?;
            Some(receiver)
        };

        self.check_signature(record, &sender)?;
        let swaps = plan_swaps(record, &sender, receiver.as_ref())?;

        let mut completed = record.clone();
        completed
            .complete()
            .map_err(|_| LedgerError::AlreadyFinalized(record.id))?;

        debug!(record = %record.id, swaps = swaps.len(), "committing batch");
        self.bounded(self.store.commit(CommitBatch {
            swaps,
            record: completed.clone(),
            nonce,
        }))
        .await
        .map_err(store_error)?;

        Ok(completed)
    }

    fn check_signature(&self, record: &TransactionRecord, sender: &Account) -> Result<(), LedgerError> {
        match &record.signature {
            Some(sig) => {
                let key = sender.public_key.as_ref().ok_or(LedgerError::SignatureInvalid)?;
                if verify_with_key(record, &sig.signature, key) {
                    Ok(())
                } else {
                    Err(LedgerError::SignatureInvalid)
                }
            }
            None if self.config.require_signed_debits && record.tx_type.debits_sender() => {
                Err(LedgerError::SignatureInvalid)
            }
            None => Ok(()),
        }
    }

    /// Full-jitter exponential backoff: uniform in `[0, base * 2^(attempt-1)]`.
    fn backoff(&self, attempt: u32) -> Duration {
        let cap = self
            .config
            .retry_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let cap_us = cap.as_micros().min(u64::MAX as u128) as u64;
        Duration::from_micros(rand::thread_rng().gen_range(0..=cap_us))
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.storage_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "store call exceeded {:?}",
                self.config.storage_timeout
            ))),
        }
    }

    // -- Convenience operations ---------------------------------------------

    /// Credit external funds to an account.
    pub async fn deposit(
        &self,
        account: Uuid,
        amount: u64,
        currency: Currency,
    ) -> Result<TransactionRecord, LedgerError> {
        let party = self.account(account).await?.party();
        let record = RecordBuilder::new(TransactionType::Deposit)
            .sender(party)
            .receiver(party)
            .amount(amount)
            .currency(currency)
            .build();
        self.execute(record).await
    }

    /// Debit an account for an external payout.
    pub async fn withdraw(
        &self,
        account: Uuid,
        amount: u64,
        currency: Currency,
        signer: Option<&WalletKeypair>,
    ) -> Result<TransactionRecord, LedgerError> {
        let party = self.account(account).await?.party();
        let record = RecordBuilder::new(TransactionType::Withdraw)
            .sender(party)
            .receiver(Party::self_account(account))
            .amount(amount)
            .currency(currency)
            .build();
        self.execute(signed(record, signer)).await
    }

    /// Move funds between two user accounts.
    pub async fn transfer(
        &self,
        from: Uuid,
        to: Uuid,
        amount: u64,
        currency: Currency,
        signer: Option<&WalletKeypair>,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = RecordBuilder::new(TransactionType::Transfer)
            .sender(Party::user(from))
            .receiver(Party::user(to))
            .amount(amount)
            .currency(currency)
            .build();
        self.execute(signed(record, signer)).await
    }

    /// Pay a merchant directly.
    pub async fn pay(
        &self,
        from: Uuid,
        merchant: Uuid,
        amount: u64,
        currency: Currency,
        signer: Option<&WalletKeypair>,
    ) -> Result<TransactionRecord, LedgerError> {
        let record = RecordBuilder::new(TransactionType::Payment)
            .sender(Party::user(from))
            .receiver(Party::merchant(merchant))
            .amount(amount)
            .currency(currency)
            .build();
        self.execute(signed(record, signer)).await
    }

    /// Redeem a scanned QR authorization: verify it, then pay the merchant
    /// the authorized amount. The authorization's nonce is consumed in the
    /// same commit, so a second redemption fails with `AuthorizationReplayed`.
    pub async fn redeem_payment(
        &self,
        payer: Uuid,
        raw: &str,
        signer: Option<&WalletKeypair>,
    ) -> Result<TransactionRecord, LedgerError> {
        self.redeem_payment_at(payer, raw, signer, now_millis()).await
    }

    /// [`redeem_payment`](Self::redeem_payment) as of `now` (Unix millis).
    pub async fn redeem_payment_at(
        &self,
        payer: Uuid,
        raw: &str,
        signer: Option<&WalletKeypair>,
        now: u64,
    ) -> Result<TransactionRecord, LedgerError> {
        let auth = match self.codec.redeem_at(raw, now) {
            Ok(auth) => auth,
            Err(e) => {
                warn!(payer = %payer, error = %e, "payment authorization refused");
                return Err(e.into());
            }
        };
        let merchant = Uuid::parse_str(auth.merchant_id()).map_err(|_| {
            LedgerError::InvalidCounterparty(format!("merchant id {:?}", auth.merchant_id()))
        })?;

        let record = RecordBuilder::new(TransactionType::Payment)
            .sender(Party::user(payer))
            .receiver(Party::merchant(merchant))
            .amount(auth.amount())
            .currency(auth.currency())
            .timestamp(now)
            .build();
        let nonce = ConsumedNonce {
            key: auth.nonce_key(),
            issued_at: auth.issued_at(),
        };
        self.execute_with_nonce(signed(record, signer), Some(nonce))
            .await
    }

    /// Drop consumed nonces whose authorizations can no longer be redeemed
    /// anyway.
    pub async fn prune_expired_nonces(&self, now: u64) -> Result<usize, LedgerError> {
        let cutoff = now.saturating_sub(self.codec.ttl_ms());
        let pruned = self
            .bounded(self.store.prune_nonces(cutoff))
            .await
            .map_err(store_error)?;
        debug!(pruned, cutoff, "pruned expired authorization nonces");
        Ok(pruned)
    }

    // -- Queries ------------------------------------------------------------

    pub async fn balances(&self, account: Uuid) -> Result<Balances, LedgerError> {
        Ok(self.account(account).await?.balances)
    }

    /// One page of `account`'s records, newest first. `page` is 1-based;
    /// `limit` 0 means the default page size.
    pub async fn history(
        &self,
        account: Uuid,
        page: usize,
        limit: usize,
    ) -> Result<HistoryPage, LedgerError> {
        self.account(account).await?;
        let records = self
            .bounded(self.store.records_for(account))
            .await
            .map_err(store_error)?;

        let limit = match limit {
            0 => DEFAULT_HISTORY_LIMIT,
            n => n.min(MAX_HISTORY_LIMIT),
        };
        let page = page.max(1);
        let total = records.len();
        let pages = (total + limit - 1) / limit;
        let records = records
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Ok(HistoryPage {
            records,
            total,
            page,
            pages,
            limit,
        })
    }

    /// Completed incoming payments to `merchant`, grouped by UTC day and
    /// currency, newest day first. Both bounds are inclusive.
    pub async fn daily_sales(
        &self,
        merchant: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailySales>, LedgerError> {
        let account = self.account(merchant).await?;
        if account.kind != AccountKind::Merchant {
            return Err(LedgerError::InvalidCounterparty(format!(
                "{} is not a merchant",
                merchant
            )));
        }

        let records = self
            .bounded(self.store.records_for(merchant))
            .await
            .map_err(store_error)?;

        let mut buckets: BTreeMap<(NaiveDate, Currency), (u64, u64)> = BTreeMap::new();
        for record in records.iter().filter(|r| {
            r.status == TransactionStatus::Completed
                && r.tx_type == TransactionType::Payment
                && r.receiver.id == merchant
        }) {
            let Some(at) = i64::try_from(record.timestamp)
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            else {
                continue;
            };
            let date = at.date_naive();
            if from.is_some_and(|d| date < d) || to.is_some_and(|d| date > d) {
                continue;
            }
            let entry = buckets.entry((date, record.currency)).or_insert((0, 0));
            entry.0 = entry.0.saturating_add(record.amount);
            entry.1 += 1;
        }

        Ok(buckets
            .into_iter()
            .rev()
            .map(|((date, currency), (total_amount, count))| DailySales {
                date,
                currency,
                total_amount,
                count,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn signed(mut record: TransactionRecord, signer: Option<&WalletKeypair>) -> TransactionRecord {
    if let Some(kp) = signer {
        sign_record(&mut record, kp);
    }
    record
}

/// Structural checks that need no storage access.
fn validate_shape(record: &TransactionRecord) -> Result<(), LedgerError> {
    if record.status != TransactionStatus::Pending {
        return Err(LedgerError::AlreadyFinalized(record.id));
    }
    if record.amount == 0 {
        return Err(LedgerError::InvalidAmount);
    }
    if record.sender.kind == PartyKind::SelfAccount {
        return Err(LedgerError::InvalidCounterparty(
            "sender cannot be Self".into(),
        ));
    }

    let (s, r) = (record.sender, record.receiver);
    let ok = match record.tx_type {
        TransactionType::Deposit => r == s,
        TransactionType::Withdraw => r.id == s.id && r.kind == PartyKind::SelfAccount,
        TransactionType::Transfer => {
            s.kind == PartyKind::User && r.kind == PartyKind::User && s.id != r.id
        }
        TransactionType::Payment => {
            s.kind == PartyKind::User && r.kind == PartyKind::Merchant && s.id != r.id
        }
    };
    if !ok {
        return Err(LedgerError::InvalidCounterparty(format!(
            "{} from {} to {}",
            record.tx_type, s, r
        )));
    }
    Ok(())
}

fn check_party(account: &Account, claimed: PartyKind) -> Result<(), LedgerError> {
    match claimed.account_kind() {
        Some(kind) if kind == account.kind => Ok(()),
        Some(kind) => Err(LedgerError::InvalidCounterparty(format!(
            "{} is a {}, not a {}",
            account.id, account.kind, kind
        ))),
        None => Err(LedgerError::InvalidCounterparty(format!(
            "{} referenced as Self",
            account.id
        ))),
    }
}

fn plan_swaps(
    record: &TransactionRecord,
    sender: &Account,
    receiver: Option<&Account>,
) -> Result<Vec<BalanceSwap>, LedgerError> {
    let currency = record.currency;
    let amount = record.amount;

    let debit = |account: &Account| -> Result<BalanceSwap, LedgerError> {
        let available = account.balance(currency);
        let new = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                account: account.id,
                currency,
                available,
                required: amount,
            })?;
        Ok(BalanceSwap {
            account: account.id,
            currency,
            expected: available,
            new,
        })
    };
    let credit = |account: &Account| -> Result<BalanceSwap, LedgerError> {
        let current = account.balance(currency);
        let new = current
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                account: account.id,
            })?;
        Ok(BalanceSwap {
            account: account.id,
            currency,
            expected: current,
            new,
        })
    };

    match record.tx_type {
        TransactionType::Deposit => Ok(vec![credit(sender)?]),
        TransactionType::Withdraw => Ok(vec![debit(sender)?]),
        TransactionType::Transfer | TransactionType::Payment => {
            let receiver = receiver.ok_or_else(|| {
                LedgerError::InvalidCounterparty("missing receiver account".into())
            })?;
            Ok(vec![debit(sender)?, credit(receiver)?])
        }
    }
}

fn store_error(e: StoreError) -> LedgerError {
    match e {
        StoreError::NotFound(id) => LedgerError::AccountNotFound(id),
        StoreError::Conflict { .. } => LedgerError::TransferConflict { attempts: 1 },
        StoreError::NonceConsumed(_) => LedgerError::AuthorizationReplayed,
        StoreError::RecordExists(id) => LedgerError::AlreadyFinalized(id),
        StoreError::AlreadyExists(id) => {
            LedgerError::InvalidCounterparty(format!("account {} already exists", id))
        }
        StoreError::Unavailable(msg) => LedgerError::StorageUnavailable(msg),
        StoreError::Serialization(msg) => LedgerError::StorageUnavailable(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryStore;

    fn engine() -> (LedgerEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = CoreConfig::new(b"qr-key", b"enc").unwrap();
        (LedgerEngine::new(store.clone(), config), store)
    }

    async fn user(engine: &LedgerEngine, name: &str) -> (Uuid, WalletKeypair) {
        let opened = engine
            .open_account(AccountKind::User, name, None)
            .await
            .unwrap();
        (opened.account.id, opened.keypair.unwrap())
    }

    async fn merchant(engine: &LedgerEngine) -> Uuid {
        let kp = WalletKeypair::generate().unwrap();
        engine
            .open_account(AccountKind::Merchant, "Corner Cafe", Some(kp.public_key()))
            .await
            .unwrap()
            .account
            .id
    }

    #[tokio::test]
    async fn open_account_generates_key_when_missing() {
        let (engine, _) = engine();
        let opened = engine
            .open_account(AccountKind::User, "alice", None)
            .await
            .unwrap();
        let kp = opened.keypair.unwrap();
        assert!(opened.account.address.matches(&kp.public_key()));
        assert_eq!(opened.account.public_key, Some(kp.public_key()));
    }

    #[tokio::test]
    async fn deposit_then_withdraw() {
        let (engine, _) = engine();
        let (alice, kp) = user(&engine, "alice").await;

        let rec = engine.deposit(alice, 500, Currency::LocalCurrency).await.unwrap();
        assert_eq!(rec.status, TransactionStatus::Completed);
        assert_eq!(engine.balances(alice).await.unwrap().local_currency, 500);

        let rec = engine
            .withdraw(alice, 200, Currency::LocalCurrency, Some(&kp))
            .await
            .unwrap();
        assert_eq!(rec.receiver.kind, PartyKind::SelfAccount);
        assert_eq!(rec.amount, 200);
        assert_eq!(engine.balances(alice).await.unwrap().local_currency, 300);
    }

    #[tokio::test]
    async fn payment_moves_funds() {
        let (engine, store) = engine();
        let (alice, kp) = user(&engine, "alice").await;
        let shop = merchant(&engine).await;
        engine.deposit(alice, 100, Currency::SmartPay).await.unwrap();

        let rec = engine
            .pay(alice, shop, 30, Currency::SmartPay, Some(&kp))
            .await
            .unwrap();
        assert_eq!(rec.tx_type, TransactionType::Payment);
        assert_eq!(engine.balances(alice).await.unwrap().smart_pay, 70);
        assert_eq!(engine.balances(shop).await.unwrap().smart_pay, 30);
        assert_eq!(store.record_count(), 2);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_state_untouched() {
        let (engine, store) = engine();
        let (alice, _) = user(&engine, "alice").await;
        let (bob, _) = user(&engine, "bob").await;
        engine.deposit(alice, 10, Currency::SmartPay).await.unwrap();

        let err = engine
            .transfer(alice, bob, 11, Currency::SmartPay, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                available: 10,
                required: 11,
                ..
            }
        ));
        assert_eq!(engine.balances(alice).await.unwrap().smart_pay, 10);
        assert_eq!(engine.balances(bob).await.unwrap().smart_pay, 0);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn shape_violations_rejected() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        let (bob, _) = user(&engine, "bob").await;
        let shop = merchant(&engine).await;

        assert!(matches!(
            engine.deposit(alice, 0, Currency::SmartPay).await.unwrap_err(),
            LedgerError::InvalidAmount
        ));
        // PAYMENT to a user account.
        let rec = RecordBuilder::new(TransactionType::Payment)
            .sender(Party::user(alice))
            .receiver(Party::user(bob))
            .amount(1)
            .build();
        assert!(matches!(
            engine.execute(rec).await.unwrap_err(),
            LedgerError::InvalidCounterparty(_)
        ));
        // A merchant id claimed as a user.
        assert!(matches!(
            engine
                .transfer(alice, shop, 1, Currency::SmartPay, None)
                .await
                .unwrap_err(),
            LedgerError::InvalidCounterparty(_)
        ));
        // Transfer to self.
        assert!(matches!(
            engine
                .transfer(alice, alice, 1, Currency::SmartPay, None)
                .await
                .unwrap_err(),
            LedgerError::InvalidCounterparty(_)
        ));
    }

    #[tokio::test]
    async fn unknown_account_rejected() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        engine.deposit(alice, 10, Currency::SmartPay).await.unwrap();
        let ghost = Uuid::new_v4();
        assert!(matches!(
            engine
                .transfer(alice, ghost, 1, Currency::SmartPay, None)
                .await
                .unwrap_err(),
            LedgerError::AccountNotFound(id) if id == ghost
        ));
    }

    #[tokio::test]
    async fn signature_checked_against_registered_key() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        let (bob, _) = user(&engine, "bob").await;
        engine.deposit(alice, 10, Currency::SmartPay).await.unwrap();

        let impostor = WalletKeypair::generate().unwrap();
        assert!(matches!(
            engine
                .transfer(alice, bob, 5, Currency::SmartPay, Some(&impostor))
                .await
                .unwrap_err(),
            LedgerError::SignatureInvalid
        ));
        assert_eq!(engine.balances(alice).await.unwrap().smart_pay, 10);
    }

    #[tokio::test]
    async fn signed_debits_can_be_required() {
        let store = Arc::new(MemoryStore::new());
        let config = CoreConfig::new(b"qr-key", b"enc")
            .unwrap()
            .with_signed_debits(true);
        let engine = LedgerEngine::new(store, config);
        let (alice, kp) = user(&engine, "alice").await;
        let (bob, _) = user(&engine, "bob").await;
        // Deposits never need a signature.
        engine.deposit(alice, 10, Currency::SmartPay).await.unwrap();

        assert!(matches!(
            engine
                .transfer(alice, bob, 5, Currency::SmartPay, None)
                .await
                .unwrap_err(),
            LedgerError::SignatureInvalid
        ));
        engine
            .transfer(alice, bob, 5, Currency::SmartPay, Some(&kp))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn completed_record_cannot_be_replayed_through_execute() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        let done = engine.deposit(alice, 10, Currency::SmartPay).await.unwrap();
        assert!(matches!(
            engine.execute(done).await.unwrap_err(),
            LedgerError::AlreadyFinalized(_)
        ));
    }

    #[tokio::test]
    async fn history_pages_newest_first() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        for amount in 1..=25 {
            engine.deposit(alice, amount, Currency::SmartPay).await.unwrap();
        }

        let first = engine.history(alice, 1, 0).await.unwrap();
        assert_eq!(first.total, 25);
        assert_eq!(first.pages, 3);
        assert_eq!(first.limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(first.records.len(), 10);
        assert_eq!(first.records[0].amount, 25);

        let last = engine.history(alice, 3, 10).await.unwrap();
        assert_eq!(last.records.len(), 5);
        assert_eq!(last.records[4].amount, 1);

        assert!(engine.history(alice, 9, 10).await.unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn daily_sales_groups_completed_payments() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        let shop = merchant(&engine).await;
        engine.deposit(alice, 1_000, Currency::SmartPay).await.unwrap();
        engine.deposit(alice, 1_000, Currency::LocalCurrency).await.unwrap();

        let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 2, 23, 59, 0).unwrap();
        for (at, amount, currency) in [
            (day1, 100, Currency::SmartPay),
            (day1, 50, Currency::SmartPay),
            (day2, 70, Currency::SmartPay),
            (day2, 5, Currency::LocalCurrency),
        ] {
            let rec = RecordBuilder::new(TransactionType::Payment)
                .sender(Party::user(alice))
                .receiver(Party::merchant(shop))
                .amount(amount)
                .currency(currency)
                .timestamp(at.timestamp_millis() as u64)
                .build();
            engine.execute(rec).await.unwrap();
        }

        let sales = engine.daily_sales(shop, None, None).await.unwrap();
        assert_eq!(sales.len(), 3);
        assert_eq!(sales[0].date, day2.date_naive());
        let day1_sp = sales
            .iter()
            .find(|s| s.date == day1.date_naive() && s.currency == Currency::SmartPay)
            .unwrap();
        assert_eq!(day1_sp.total_amount, 150);
        assert_eq!(day1_sp.count, 2);

        let only_day1 = engine
            .daily_sales(shop, Some(day1.date_naive()), Some(day1.date_naive()))
            .await
            .unwrap();
        assert_eq!(only_day1.len(), 1);

        assert!(matches!(
            engine.daily_sales(alice, None, None).await.unwrap_err(),
            LedgerError::InvalidCounterparty(_)
        ));
    }

    #[tokio::test]
    async fn daily_sales_skips_unrepresentable_timestamps() {
        let (engine, _) = engine();
        let (alice, _) = user(&engine, "alice").await;
        let shop = merchant(&engine).await;
        engine.deposit(alice, 1_000, Currency::SmartPay).await.unwrap();

        let day = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        for timestamp in [day.timestamp_millis() as u64, u64::MAX, i64::MAX as u64 + 1] {
            let rec = RecordBuilder::new(TransactionType::Payment)
                .sender(Party::user(alice))
                .receiver(Party::merchant(shop))
                .amount(10)
                .timestamp(timestamp)
                .build();
            engine.execute(rec).await.unwrap();
        }

        let sales = engine.daily_sales(shop, None, None).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].date, day.date_naive());
        assert_eq!(sales[0].count, 1);
    }

    #[test]
    fn backoff_is_bounded() {
        let (engine, _) = engine();
        for attempt in 1..=5 {
            let cap = engine.config.retry_backoff * (1 << (attempt - 1));
            assert!(engine.backoff(attempt) <= cap);
        }
    }
}
