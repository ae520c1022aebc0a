//! Transfer Executor
//!
//! Executes one scheduled transaction end to end inside a single ledger
//! unit of work. Built for hostile delivery conditions: the scheduler
//! may call it late, twice, or twice at the same time, and the row lock
//! plus the status check make all of those safe.
//!
//! Business failures (premature delivery, insufficient funds, settlement
//! refusal) are ordinary outcomes: the transaction commits as FAILED
//! with a message saying why, and the caller gets an
//! [`ExecutionOutcome`]. The error channel is reserved for conditions
//! the executor cannot resolve locally: a missing row, storage faults,
//! and the one truly bad case, a ledger commit that fails after the
//! settlement service already said yes.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ledger::{Ledger, LedgerError, LedgerUow};
use crate::model::{TransactionId, TransactionRecord, TransactionStatus, clip_error_message};
use crate::money;
use crate::settlement::{SettlementClient, SettlementRequest};

/// Terminal result of one execution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Funds moved, transaction committed as SUCCESS
    Success,
    /// The transaction was already terminal; nothing was touched
    AlreadyFinal(TransactionStatus),
    /// Premature delivery or insufficient funds; committed as FAILED
    /// with the contained reason
    PreconditionFailed(String),
    /// The settlement service did not acknowledge; committed as FAILED
    SettlementFailed(String),
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The scheduler delivered an id the ledger has never seen
    #[error("Transaction {0} does not exist in the ledger")]
    TransactionNotFound(TransactionId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The ledger refused the write after settlement succeeded. The
    /// external leg happened, the internal one did not; this cannot be
    /// repaired automatically.
    #[error("Commit failed after settlement success for transaction {id}: {source}")]
    PostSettlementCommit {
        id: TransactionId,
        source: LedgerError,
    },
}

/// Executes scheduled transactions against the ledger, gated by the
/// injected settlement client
pub struct TransferExecutor {
    ledger: Arc<dyn Ledger>,
    settlement: Arc<dyn SettlementClient>,
}

impl TransferExecutor {
    pub fn new(ledger: Arc<dyn Ledger>, settlement: Arc<dyn SettlementClient>) -> Self {
        Self { ledger, settlement }
    }

    /// Execute one scheduled transaction.
    ///
    /// Safe to call any number of times for the same id, concurrently or
    /// not: at most one call moves funds.
    pub async fn execute(&self, id: TransactionId) -> Result<ExecutionOutcome, ExecutorError> {
        let mut uow = self.ledger.begin().await?;

        let Some(txn) = uow.lock_transaction(id).await? else {
            return Err(ExecutorError::TransactionNotFound(id));
        };

        if txn.status.is_terminal() {
            debug!(transaction_id = %id, status = %txn.status, "Transaction already final, skipping");
            return Ok(ExecutionOutcome::AlreadyFinal(txn.status));
        }

        // Deterministic lock order on the wallet pair
        let (first, second) = if txn.sender_id < txn.receiver_id {
            (txn.sender_id, txn.receiver_id)
        } else {
            (txn.receiver_id, txn.sender_id)
        };
        let first_wallet = uow
            .lock_wallet(first)
            .await?
            .ok_or(LedgerError::WalletNotFound(first))?;
        let second_wallet = uow
            .lock_wallet(second)
            .await?
            .ok_or(LedgerError::WalletNotFound(second))?;
        let (sender, receiver) = if first == txn.sender_id {
            (first_wallet, second_wallet)
        } else {
            (second_wallet, first_wallet)
        };

        // Conditions checked at admission must hold now, not then.
        let now = Utc::now();
        if now < txn.scheduled_time {
            let remaining = (txn.scheduled_time - now).num_seconds().max(1);
            let reason = format!(
                "Transaction cannot be processed before the scheduled time. Try after {} seconds.",
                remaining
            );
            let reason = Self::mark_failed(uow, &txn, reason).await?;
            return Ok(ExecutionOutcome::PreconditionFailed(reason));
        }

        if sender.balance < txn.amount {
            let reason = format!(
                "Insufficient funds. Available balance: {}. Required amount: {}.",
                money::format_amount(sender.balance),
                money::format_amount(txn.amount),
            );
            let reason = Self::mark_failed(uow, &txn, reason).await?;
            return Ok(ExecutionOutcome::PreconditionFailed(reason));
        }

        let request = SettlementRequest {
            sender: txn.sender_id,
            receiver: txn.receiver_id,
            amount: txn.amount,
            scheduled_time: txn.scheduled_time,
        };
        if let Err(e) = self.settlement.settle(&request).await {
            let reason = Self::mark_failed(uow, &txn, e.to_string()).await?;
            return Ok(ExecutionOutcome::SettlementFailed(reason));
        }

        // Settlement said yes. From here on a storage failure is not
        // recoverable locally: the external leg exists either way.
        let debit = sender.balance - txn.amount;
        let credit = receiver.balance + txn.amount;
        if let Err(e) = Self::apply_success(uow, &txn, debit, credit).await {
            error!(
                transaction_id = %id,
                error = %e,
                "Ledger commit failed after settlement success. Can't recover. This will probably lead to data loss."
            );
            return Err(ExecutorError::PostSettlementCommit { id, source: e });
        }

        info!(
            transaction_id = %id,
            sender = %txn.sender_id,
            receiver = %txn.receiver_id,
            amount = %txn.amount,
            "Transfer executed"
        );
        Ok(ExecutionOutcome::Success)
    }

    /// Commit the transaction as FAILED with the given reason
    async fn mark_failed(
        mut uow: Box<dyn LedgerUow>,
        txn: &TransactionRecord,
        reason: String,
    ) -> Result<String, LedgerError> {
        let reason = clip_error_message(&reason);
        uow.set_transaction_status(txn.id, TransactionStatus::Failed, Some(reason.clone()))
            .await?;
        uow.commit().await?;

        warn!(transaction_id = %txn.id, reason = %reason, "Transaction failed");
        Ok(reason)
    }

    /// Debit, credit and SUCCESS as one atomic publication
    async fn apply_success(
        mut uow: Box<dyn LedgerUow>,
        txn: &TransactionRecord,
        sender_balance: Decimal,
        receiver_balance: Decimal,
    ) -> Result<(), LedgerError> {
        uow.set_wallet_balance(txn.sender_id, sender_balance).await?;
        uow.set_wallet_balance(txn.receiver_id, receiver_balance)
            .await?;
        uow.set_transaction_status(txn.id, TransactionStatus::Success, None)
            .await?;
        uow.commit().await
    }
}
