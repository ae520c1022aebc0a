//! Wallet Engine - Scheduled Transaction Execution
//!
//! Wallets hold money; transactions move it between them at a scheduled
//! time. Admission persists a validated transaction as PENDING, the
//! dispatcher picks it up once due, and the executor settles it
//! externally and moves the balances in one atomic commit.
//!
//! # Modules
//!
//! - [`model`] - Wallets, transactions and the status lifecycle
//! - [`money`] - Fixed two-decimal amount validation and formatting
//! - [`ledger`] - Storage seam: PostgreSQL and in-memory backends
//! - [`settlement`] - External settlement service client
//! - [`engine`] - Admission gate, transfer executor, deposits
//! - [`dispatch`] - Background scan of due PENDING transactions
//! - [`gateway`] - HTTP API over the engine
//! - [`config`] / [`logging`] - YAML config and tracing setup

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod money;
pub mod settlement;

// Convenient re-exports at crate root
pub use dispatch::{Dispatcher, DispatcherConfig};
pub use engine::{
    AdmissionError, AdmissionGate, DepositError, DepositService, ExecutionOutcome, ExecutorError,
    TransferExecutor,
};
pub use ledger::{Ledger, LedgerError, LedgerUow, MemoryLedger, PgLedger};
pub use model::{TransactionId, TransactionRecord, TransactionStatus, Wallet, WalletId};
pub use settlement::{
    HttpSettlementClient, MockSettlementClient, SettlementClient, SettlementError,
    SettlementRequest,
};
