//! Due-Transaction Dispatcher
//!
//! Background worker that scans the ledger for PENDING transactions
//! whose scheduled time has arrived and hands each one to the
//! [`TransferExecutor`]. The committed PENDING row is the outbox: a
//! transaction admitted in one process restart ago is picked up the
//! same way as one admitted a second ago.
//!
//! Delivery is at-least-once by construction. A crash between execute
//! and the next scan re-delivers the same id, and overlapping scans can
//! race on one row; the executor's lock-and-check makes both harmless.
//! The admission gate nudges the dispatcher through a [`Notify`] so a
//! transaction due right away does not wait out a full poll interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::engine::{ExecutionOutcome, TransferExecutor};
use crate::ledger::{Ledger, LedgerError};

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How often to scan for due transactions
    pub poll_interval: Duration,
    /// Maximum transactions to pick up per scan
    pub batch_size: usize,
    /// How many executions to run in flight at once
    pub concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            concurrency: 8,
        }
    }
}

/// Due-Transaction Dispatcher
///
/// Periodically scans for due PENDING transactions and executes them.
pub struct Dispatcher {
    ledger: Arc<dyn Ledger>,
    executor: Arc<TransferExecutor>,
    config: DispatcherConfig,
    wakeup: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        executor: Arc<TransferExecutor>,
        config: DispatcherConfig,
        wakeup: Arc<Notify>,
    ) -> Self {
        Self {
            ledger,
            executor,
            config,
            wakeup,
        }
    }

    /// Run the dispatch loop
    ///
    /// This method runs forever, scanning on every poll tick and on
    /// every admission nudge.
    pub async fn run(&self) -> ! {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency,
            "Starting dispatcher"
        );

        loop {
            if let Err(e) = self.scan_and_execute().await {
                error!(error = %e, "Due scan failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.wakeup.notified() => {
                    debug!("Woken by admission nudge");
                }
            }
        }
    }

    /// Run a single scan and execution cycle.
    ///
    /// Returns how many transactions reached a terminal status this
    /// scan. Per-transaction failures are logged, not propagated; only
    /// the scan itself can error.
    pub async fn scan_and_execute(&self) -> Result<usize, LedgerError> {
        let due = self
            .ledger
            .find_due(Utc::now(), self.config.batch_size)
            .await?;

        if due.is_empty() {
            return Ok(0);
        }

        debug!(count = due.len(), "Found due transactions");

        let results: Vec<_> = stream::iter(due)
            .map(|id| {
                let executor = self.executor.clone();
                async move { (id, executor.execute(id).await) }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut settled = 0;
        for (id, result) in results {
            match result {
                Ok(ExecutionOutcome::Success) => {
                    settled += 1;
                }
                Ok(ExecutionOutcome::AlreadyFinal(status)) => {
                    debug!(transaction_id = %id, status = %status, "Skipped re-delivered transaction");
                }
                Ok(ExecutionOutcome::PreconditionFailed(reason))
                | Ok(ExecutionOutcome::SettlementFailed(reason)) => {
                    warn!(transaction_id = %id, reason = %reason, "Transaction ended as FAILED");
                    settled += 1;
                }
                Err(e) => {
                    error!(transaction_id = %id, error = %e, "Execution attempt failed");
                }
            }
        }

        if settled > 0 {
            info!(count = settled, "Settled transactions this scan");
        }

        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_config_default() {
        let config = DispatcherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.concurrency, 8);
    }
}
