//! In-memory [`LedgerStore`]. Every commit runs under one mutex, which makes
//! atomicity trivial. Used in tests and when embedding the engine without
//! persistence.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::account::Account;
use super::store::{CommitBatch, LedgerStore, StoreError};
use crate::transaction::record::TransactionRecord;

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    records: Vec<TransactionRecord>,
    record_ids: HashSet<Uuid>,
    nonces: HashMap<String, u64>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn nonce_count(&self) -> usize {
        self.inner.lock().nonces.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.inner.lock().accounts.get(&id).cloned())
    }

    async fn put_account(&self, account: Account) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists(account.id));
        }
        inner.accounts.insert(account.id, account);
        Ok(())
    }

    async fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        // Check everything first so a failed batch touches nothing.
        if inner.record_ids.contains(&batch.record.id) {
            return Err(StoreError::RecordExists(batch.record.id));
        }
        if let Some(nonce) = &batch.nonce {
            if inner.nonces.contains_key(&nonce.key) {
                return Err(StoreError::NonceConsumed(nonce.key.clone()));
            }
        }
        for swap in &batch.swaps {
            let account = inner
                .accounts
                .get(&swap.account)
                .ok_or(StoreError::NotFound(swap.account))?;
            if account.balance(swap.currency) != swap.expected {
                return Err(StoreError::Conflict {
                    account: swap.account,
                    currency: swap.currency,
                });
            }
        }

        let mut touched: Vec<Uuid> = Vec::with_capacity(batch.swaps.len());
        for swap in &batch.swaps {
            if let Some(account) = inner.accounts.get_mut(&swap.account) {
                account.balances.set(swap.currency, swap.new);
                if !touched.contains(&swap.account) {
                    account.version += 1;
                    touched.push(swap.account);
                }
            }
        }
        if let Some(nonce) = batch.nonce {
            inner.nonces.insert(nonce.key, nonce.issued_at);
        }
        inner.record_ids.insert(batch.record.id);
        inner.records.push(batch.record);
        Ok(())
    }

    async fn records_for(&self, account: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        let inner = self.inner.lock();
        // Appends happen in commit order; reverse for newest first.
        Ok(inner
            .records
            .iter()
            .rev()
            .filter(|r| r.involves(account))
            .cloned()
            .collect())
    }

    async fn prune_nonces(&self, issued_before: u64) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.nonces.len();
        inner.nonces.retain(|_, issued_at| *issued_at >= issued_before);
        Ok(before - inner.nonces.len())
    }
}
