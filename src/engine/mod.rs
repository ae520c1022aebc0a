//! Transfer Engine
//!
//! Admission, execution and deposits for scheduled wallet-to-wallet
//! transfers.
//!
//! # Lifecycle
//!
//! ```text
//! submit_withdrawal ──▶ PENDING row (durable outbox entry)
//!                             │  dispatcher scan, at-or-after schedule
//!                             ▼
//!                     execute(transaction_id)
//!                             │
//!          ┌──────────────────┼─────────────────────┐
//!          ▼                  ▼                     ▼
//!       SUCCESS            FAILED              already final
//!  (settled, debit      (premature, funds,    (committed no-op)
//!   + credit applied)    settlement error)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **One-shot transition**: only the executor moves a transaction out
//!    of PENDING, always under an exclusive row lock.
//! 2. **Ordered wallet locks**: sender and receiver are locked in
//!    ascending id order; that ordering is the only deadlock protection.
//! 3. **Atomic outcome**: debit, credit and status land in one commit,
//!    or none of them do.
//! 4. **Duplicate delivery is normal**: the dispatcher may hand the same
//!    id to several workers; the row lock plus the status check turn the
//!    losers into no-ops.

pub mod admission;
pub mod deposit;
pub mod executor;

pub use admission::{AdmissionError, AdmissionGate};
pub use deposit::{DepositError, DepositService};
pub use executor::{ExecutionOutcome, ExecutorError, TransferExecutor};
