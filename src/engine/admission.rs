//! Transaction Admission Gate
//!
//! The only entry point for new scheduled transactions. Validates the
//! request, persists the PENDING row atomically, and only then nudges
//! the dispatcher. The committed row itself is the scheduling hand-off;
//! the nudge is a latency optimization the engine never depends on.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::info;

use crate::ledger::{Ledger, LedgerError};
use crate::model::{TransactionRecord, WalletId};
use crate::money::{self, MoneyError};

/// Minimum scheduling lead the gate enforces by default
pub const DEFAULT_MIN_LEAD_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error(transparent)]
    InvalidAmount(#[from] MoneyError),

    #[error("Sender and receiver must be different wallets")]
    SameWallet,

    #[error("Scheduled time must be at least {min_secs} seconds in the future")]
    ScheduledTooSoon { min_secs: i64 },

    #[error("Wallet {0} not found")]
    UnknownWallet(WalletId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Admission gate for scheduled withdrawals
#[derive(Clone)]
pub struct AdmissionGate {
    ledger: Arc<dyn Ledger>,
    min_lead: Duration,
    dispatcher_wakeup: Arc<Notify>,
}

impl AdmissionGate {
    pub fn new(ledger: Arc<dyn Ledger>, min_lead: Duration, dispatcher_wakeup: Arc<Notify>) -> Self {
        Self {
            ledger,
            min_lead,
            dispatcher_wakeup,
        }
    }

    /// Validate and persist a scheduled withdrawal.
    ///
    /// On success the transaction exists as a committed PENDING row and
    /// the dispatcher has been nudged. Any error means nothing was
    /// persisted.
    pub async fn submit_withdrawal(
        &self,
        sender: WalletId,
        receiver: WalletId,
        amount: Decimal,
        scheduled_time: DateTime<Utc>,
    ) -> Result<TransactionRecord, AdmissionError> {
        money::validate_amount(amount)?;

        if sender == receiver {
            return Err(AdmissionError::SameWallet);
        }

        let earliest = Utc::now() + self.min_lead;
        if scheduled_time < earliest {
            return Err(AdmissionError::ScheduledTooSoon {
                min_secs: self.min_lead.num_seconds(),
            });
        }

        if !self.ledger.wallet_exists(sender).await? {
            return Err(AdmissionError::UnknownWallet(sender));
        }
        if !self.ledger.wallet_exists(receiver).await? {
            return Err(AdmissionError::UnknownWallet(receiver));
        }

        let record = TransactionRecord::new_pending(sender, receiver, amount, scheduled_time);

        let mut uow = self.ledger.begin().await?;
        uow.insert_transaction(&record).await?;
        uow.commit().await?;

        // The row is durable; wake the dispatcher so a near-term schedule
        // is not left waiting for the next poll tick.
        self.dispatcher_wakeup.notify_one();

        info!(
            transaction_id = %record.id,
            sender = %sender,
            receiver = %receiver,
            amount = %amount,
            scheduled_time = %scheduled_time,
            "Accepted scheduled withdrawal"
        );

        Ok(record)
    }
}
