//! In-Memory Ledger
//!
//! Implements the exclusive-lock-then-commit contract with explicit
//! per-row locks instead of database row locks. Used by the test suite
//! and for running the engine without external infrastructure.
//!
//! # Locking discipline
//!
//! - Every row (wallet or transaction) owns one `tokio::sync::Mutex` in
//!   a shared registry; a unit of work keeps the guards it acquired
//!   until it commits or is dropped.
//! - Committed state lives in a single map behind its own lock, so a
//!   commit publishes all staged writes in one critical section and
//!   readers never observe a half-applied transfer.
//! - Dropping a unit of work discards its staged writes: rollback is
//!   the default, commit is explicit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Ledger, LedgerError, LedgerUow};
use crate::model::{TransactionId, TransactionRecord, TransactionStatus, Wallet, WalletId};
use crate::money::{self, MoneyError};

/// Wallets and transactions share one lock registry, so the key carries
/// the row kind to keep the id spaces apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Wallet(WalletId),
    Transaction(TransactionId),
}

#[derive(Default)]
struct CommittedState {
    wallets: HashMap<WalletId, Wallet>,
    transactions: HashMap<TransactionId, TransactionRecord>,
}

struct Inner {
    row_locks: DashMap<RowKey, Arc<Mutex<()>>>,
    state: Mutex<CommittedState>,
}

/// In-memory ledger backend
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                row_locks: DashMap::new(),
                state: Mutex::new(CommittedState::default()),
            }),
        }
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerUow>, LedgerError> {
        Ok(Box::new(MemoryUow {
            inner: Arc::clone(&self.inner),
            guards: Vec::new(),
            staged_balances: Vec::new(),
            staged_statuses: Vec::new(),
            staged_inserts: Vec::new(),
        }))
    }

    async fn create_wallet(&self, initial_balance: Decimal) -> Result<Wallet, LedgerError> {
        balance_constraint(initial_balance)?;

        let wallet = Wallet::new(initial_balance);
        let mut state = self.inner.state.lock().await;
        state.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, LedgerError> {
        let state = self.inner.state.lock().await;
        Ok(state.wallets.get(&id).cloned())
    }

    async fn wallet_exists(&self, id: WalletId) -> Result<bool, LedgerError> {
        let state = self.inner.state.lock().await;
        Ok(state.wallets.contains_key(&id))
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        let state = self.inner.state.lock().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn transactions_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let state = self.inner.state.lock().await;
        let mut records: Vec<TransactionRecord> = state
            .transactions
            .values()
            .filter(|t| t.sender_id == wallet_id || t.receiver_id == wallet_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionId>, LedgerError> {
        let state = self.inner.state.lock().await;
        let mut due: Vec<(DateTime<Utc>, TransactionId)> = state
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending && t.scheduled_time <= now)
            .map(|t| (t.scheduled_time, t.id))
            .collect();
        due.sort();
        due.truncate(limit);
        Ok(due.into_iter().map(|(_, id)| id).collect())
    }
}

/// Unit of work over the in-memory ledger
struct MemoryUow {
    inner: Arc<Inner>,
    guards: Vec<OwnedMutexGuard<()>>,
    staged_balances: Vec<(WalletId, Decimal)>,
    staged_statuses: Vec<(TransactionId, TransactionStatus, Option<String>)>,
    staged_inserts: Vec<TransactionRecord>,
}

impl MemoryUow {
    /// Take the row lock and hold it for the life of this unit of work
    async fn acquire(&mut self, key: RowKey) {
        let cell = self.inner.row_locks.entry(key).or_default().clone();
        let guard = cell.lock_owned().await;
        self.guards.push(guard);
    }
}

#[async_trait]
impl LedgerUow for MemoryUow {
    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        self.acquire(RowKey::Transaction(id)).await;
        let state = self.inner.state.lock().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn lock_wallet(&mut self, id: WalletId) -> Result<Option<Wallet>, LedgerError> {
        self.acquire(RowKey::Wallet(id)).await;
        let state = self.inner.state.lock().await;
        Ok(state.wallets.get(&id).cloned())
    }

    async fn set_wallet_balance(
        &mut self,
        id: WalletId,
        balance: Decimal,
    ) -> Result<(), LedgerError> {
        self.staged_balances.push((id, balance));
        Ok(())
    }

    async fn set_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        error_message: Option<String>,
    ) -> Result<(), LedgerError> {
        self.staged_statuses.push((id, status, error_message));
        Ok(())
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), LedgerError> {
        self.staged_inserts.push(record.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let mut state = self.inner.state.lock().await;

        // Validate every staged write before applying any of them.
        for record in &self.staged_inserts {
            if record.amount <= Decimal::ZERO {
                return Err(LedgerError::ConstraintViolation(
                    "positive_amount".to_string(),
                ));
            }
            if record.sender_id == record.receiver_id {
                return Err(LedgerError::ConstraintViolation(
                    "sender_and_receiver_are_different".to_string(),
                ));
            }
            if !state.wallets.contains_key(&record.sender_id)
                || !state.wallets.contains_key(&record.receiver_id)
            {
                return Err(LedgerError::ConstraintViolation(format!(
                    "transaction {} references a missing wallet",
                    record.id
                )));
            }
            if state.transactions.contains_key(&record.id) {
                return Err(LedgerError::ConstraintViolation(format!(
                    "duplicate transaction id {}",
                    record.id
                )));
            }
        }

        for (id, balance) in &self.staged_balances {
            balance_constraint(*balance)?;
            if !state.wallets.contains_key(id) {
                return Err(LedgerError::WalletNotFound(*id));
            }
        }

        for (id, _, _) in &self.staged_statuses {
            if !state.transactions.contains_key(id) {
                return Err(LedgerError::TransactionNotFound(*id));
            }
        }

        let now = Utc::now();

        for (id, balance) in &self.staged_balances {
            if let Some(wallet) = state.wallets.get_mut(id) {
                wallet.balance = *balance;
                wallet.updated_at = now;
            }
        }

        for (id, status, error_message) in &self.staged_statuses {
            if let Some(txn) = state.transactions.get_mut(id) {
                txn.status = *status;
                txn.error_message = error_message.clone();
                txn.updated_at = now;
            }
        }

        for record in &self.staged_inserts {
            state.transactions.insert(record.id, record.clone());
        }

        Ok(())
    }
}

/// A staged balance must fit the same bounds the NUMERIC(10, 2) wallet
/// column enforces, so both backends refuse the same writes.
fn balance_constraint(balance: Decimal) -> Result<(), LedgerError> {
    money::validate_balance(balance).map_err(|e| match e {
        MoneyError::Negative => LedgerError::ConstraintViolation("positive_balance".to_string()),
        other => LedgerError::ConstraintViolation(format!("balance {}: {}", balance, other)),
    })
}
