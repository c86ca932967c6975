//! # LedgerDb — Persistent Ledger Storage
//!
//! A [`LedgerStore`] on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree            | Key                               | Value                      |
//! |-----------------|-----------------------------------|----------------------------|
//! | `accounts`      | account id (16B)                  | `bincode(Account)`         |
//! | `records`       | record id (16B)                   | `bincode(TransactionRecord)` |
//! | `account_index` | account id (16B) ‖ seq (8B BE)    | record id (16B)            |
//! | `nonces`        | `merchant:nonce` (UTF-8)          | issued_at (8B BE)          |
//!
//! `seq` comes from sled's monotonic id generator, so a reversed prefix
//! scan over `account_index` yields an account's records newest first.
//!
//! ## Atomicity
//!
//! A commit runs as one sled transaction over all four trees. The balance
//! expectations and the nonce are checked inside it; any mismatch aborts
//! the transaction and nothing is written.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional,
};
use sled::{Db, Tree};
use tracing::debug;
use uuid::Uuid;

use crate::ledger::account::Account;
use crate::ledger::store::{CommitBatch, LedgerStore, StoreError};
use crate::transaction::record::TransactionRecord;

pub type DbResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    accounts: Tree,
    records: Tree,
    /// account id ‖ seq -> record id.
    account_index: Tree,
    /// Consumed authorization nonces.
    nonces: Tree,
}

impl LedgerDb {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A database that is removed when dropped. For tests.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let records = db.open_tree("records")?;
        let account_index = db.open_tree("account_index")?;
        let nonces = db.open_tree("nonces")?;

        Ok(Self {
            db,
            accounts,
            records,
            account_index,
            nonces,
        })
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn nonce_count(&self) -> usize {
        self.nonces.len()
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn index_key(account: Uuid, seq: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(account.as_bytes());
    key[16..].copy_from_slice(&seq.to_be_bytes());
    key
}

fn decode_u64(bytes: &[u8]) -> DbResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("invalid u64 bytes".to_string()))?;
    Ok(u64::from_be_bytes(raw))
}

#[async_trait]
impl LedgerStore for LedgerDb {
    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        match self.accounts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_account(&self, account: Account) -> Result<(), StoreError> {
        let bytes = bincode::serialize(&account)?;
        self.accounts
            .compare_and_swap(account.id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| StoreError::AlreadyExists(account.id))
    }

    async fn commit(&self, batch: CommitBatch) -> Result<(), StoreError> {
        let seq = self.db.generate_id()?;
        let record_bytes = bincode::serialize(&batch.record)?;
        let record_id = batch.record.id;
        let parties = {
            let mut ids = vec![batch.record.sender.id];
            if batch.record.receiver.id != batch.record.sender.id {
                ids.push(batch.record.receiver.id);
            }
            ids
        };

        let result = (&self.accounts, &self.records, &self.account_index, &self.nonces).transaction(
            |(accounts, records, index, nonces)| -> ConflictableTransactionResult<(), StoreError> {
                let abort = |e: StoreError| ConflictableTransactionError::Abort(e);

                if records.get(&record_id.as_bytes()[..])?.is_some() {
                    return Err(abort(StoreError::RecordExists(record_id)));
                }

                if let Some(nonce) = &batch.nonce {
                    if nonces.get(nonce.key.as_bytes())?.is_some() {
                        return Err(abort(StoreError::NonceConsumed(nonce.key.clone())));
                    }
                    nonces.insert(nonce.key.as_bytes(), &nonce.issued_at.to_be_bytes()[..])?;
                }

                let mut touched: HashMap<Uuid, Account> = HashMap::new();
                for swap in &batch.swaps {
                    if !touched.contains_key(&swap.account) {
                        let bytes = accounts
                            .get(swap.account.as_bytes())?
                            .ok_or_else(|| abort(StoreError::NotFound(swap.account)))?;
                        let account: Account = bincode::deserialize(&bytes)
                            .map_err(|e| abort(StoreError::from(e)))?;
                        touched.insert(swap.account, account);
                    }
                    let Some(account) = touched.get_mut(&swap.account) else {
                        continue;
                    };
                    if account.balance(swap.currency) != swap.expected {
                        return Err(abort(StoreError::Conflict {
                            account: swap.account,
                            currency: swap.currency,
                        }));
                    }
                    account.balances.set(swap.currency, swap.new);
                }

                for (id, mut account) in touched {
                    account.version += 1;
                    let bytes =
                        bincode::serialize(&account).map_err(|e| abort(StoreError::from(e)))?;
                    accounts.insert(&id.as_bytes()[..], bytes)?;
                }

                records.insert(&record_id.as_bytes()[..], record_bytes.clone())?;
                for party in &parties {
                    index.insert(&index_key(*party, seq)[..], &record_id.as_bytes()[..])?;
                }
                Ok(())
            },
        );

        match result {
            Ok(()) => {
                debug!(record = %record_id, seq, "ledger batch committed");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    async fn records_for(&self, account: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut out = Vec::new();
        for entry in self.account_index.scan_prefix(account.as_bytes()).rev() {
            let (_key, record_id) = entry?;
            let bytes = self.records.get(&record_id)?.ok_or_else(|| {
                StoreError::Serialization("index points at a missing record".to_string())
            })?;
            out.push(bincode::deserialize(&bytes)?);
        }
        Ok(out)
    }

    async fn prune_nonces(&self, issued_before: u64) -> Result<usize, StoreError> {
        let mut pruned = 0;
        for entry in self.nonces.iter() {
            let (key, issued_at) = entry?;
            if decode_u64(&issued_at)? < issued_before {
                self.nonces.remove(key)?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
