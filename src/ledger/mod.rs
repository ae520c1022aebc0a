//! Ledger Store
//!
//! Narrow seam between the engine and whatever holds wallets and
//! transactions. The engine only ever needs two things from storage:
//!
//! 1. plain reads (lookups, the dispatcher's due scan)
//! 2. a unit of work: exclusively lock rows, stage writes, commit them
//!    as one atomic publication
//!
//! Two backends implement the contract:
//! - [`PgLedger`] - PostgreSQL, `SELECT ... FOR UPDATE` + transaction commit
//! - [`MemoryLedger`] - per-row async locks + a single committed-state map
//!
//! Both enforce the storage invariants (`balance >= 0`, `amount > 0`,
//! `sender <> receiver`, balances within the NUMERIC(10, 2) range) at
//! commit, so a buggy caller fails loudly instead of corrupting balances.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{TransactionId, TransactionRecord, TransactionStatus, Wallet, WalletId};

/// Ledger storage errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A storage-level invariant rejected the commit
    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Wallet {0} not found")]
    WalletNotFound(WalletId),

    #[error("Transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Handle to a ledger backend
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Open a unit of work. Nothing staged through it is visible to
    /// anyone else until `commit`; dropping it un-staged is a rollback.
    async fn begin(&self) -> Result<Box<dyn LedgerUow>, LedgerError>;

    /// Create a wallet with the given starting balance
    async fn create_wallet(&self, initial_balance: Decimal) -> Result<Wallet, LedgerError>;

    /// Read a wallet without locking it
    async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, LedgerError>;

    async fn wallet_exists(&self, id: WalletId) -> Result<bool, LedgerError>;

    /// Read a transaction without locking it
    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    /// All transactions a wallet participates in, newest first
    async fn transactions_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;

    /// Ids of PENDING transactions whose scheduled time has arrived,
    /// oldest schedule first. This is the dispatcher's outbox scan: a
    /// committed PENDING row is the only hand-off between admission and
    /// execution.
    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionId>, LedgerError>;
}

/// One atomic unit of work against the ledger
///
/// Locks are exclusive and held until the unit of work commits or drops.
/// Callers that lock more than one wallet must do so in ascending id
/// order; the store does not reorder for them.
#[async_trait]
pub trait LedgerUow: Send {
    /// Exclusively lock a transaction row and return its committed state.
    /// `None` means the row does not exist.
    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError>;

    /// Exclusively lock a wallet row and return its committed state
    async fn lock_wallet(&mut self, id: WalletId) -> Result<Option<Wallet>, LedgerError>;

    /// Stage a balance write for a wallet locked in this unit of work
    async fn set_wallet_balance(
        &mut self,
        id: WalletId,
        balance: Decimal,
    ) -> Result<(), LedgerError>;

    /// Stage the one-shot status transition for a locked transaction
    async fn set_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        error_message: Option<String>,
    ) -> Result<(), LedgerError>;

    /// Stage a new transaction row
    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), LedgerError>;

    /// Atomically publish every staged write and release all locks
    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;
}
