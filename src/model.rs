//! Core domain records
//!
//! Wallets and scheduled transactions as they live in the ledger store.
//! Status strings match the stored representation so the Postgres and
//! in-memory backends agree byte for byte.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub type WalletId = Uuid;
pub type TransactionId = Uuid;

/// Longest error_message the ledger will store.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1023;

/// Transaction lifecycle status
///
/// A transaction is born PENDING and makes exactly one transition,
/// to SUCCESS or FAILED. Only the executor performs that transition,
/// always under an exclusive row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    /// Check if this is a terminal status (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
        }
    }

    /// Convert from the stored representation
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(TransactionStatus::Pending),
            "SUCCESS" => Some(TransactionStatus::Success),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A funds-holding wallet
///
/// `balance` is never negative; the ledger backends refuse commits
/// that would make it so.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub id: WalletId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            balance,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A scheduled wallet-to-wallet transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub sender_id: WalletId,
    pub receiver_id: WalletId,
    pub amount: Decimal,
    pub scheduled_time: DateTime<Utc>,
    pub status: TransactionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Build a fresh PENDING record for admission
    pub fn new_pending(
        sender_id: WalletId,
        receiver_id: WalletId,
        amount: Decimal,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            amount,
            scheduled_time,
            status: TransactionStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Clip an error message to the stored column width
pub fn clip_error_message(msg: &str) -> String {
    if msg.len() <= MAX_ERROR_MESSAGE_LEN {
        msg.to_string()
    } else {
        msg.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_db_roundtrip() {
        let statuses = [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
        ];

        for status in statuses {
            let stored = status.as_str();
            let recovered = TransactionStatus::from_db(stored).unwrap();
            assert_eq!(status, recovered);
        }
    }

    #[test]
    fn test_invalid_status_string() {
        assert!(TransactionStatus::from_db("RUNNING").is_none());
        assert!(TransactionStatus::from_db("pending").is_none());
        assert!(TransactionStatus::from_db("").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransactionStatus::Pending.to_string(), "PENDING");
        assert_eq!(TransactionStatus::Success.to_string(), "SUCCESS");
        assert_eq!(TransactionStatus::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_new_pending_record() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let amount: Decimal = "20.00".parse().unwrap();
        let when = Utc::now() + chrono::Duration::minutes(5);

        let rec = TransactionRecord::new_pending(sender, receiver, amount, when);
        assert_eq!(rec.sender_id, sender);
        assert_eq!(rec.receiver_id, receiver);
        assert_eq!(rec.amount, amount);
        assert_eq!(rec.scheduled_time, when);
        assert_eq!(rec.status, TransactionStatus::Pending);
        assert!(rec.error_message.is_none());
    }

    #[test]
    fn test_clip_error_message() {
        assert_eq!(clip_error_message("short"), "short");

        let long = "x".repeat(MAX_ERROR_MESSAGE_LEN + 100);
        let clipped = clip_error_message(&long);
        assert_eq!(clipped.len(), MAX_ERROR_MESSAGE_LEN);
    }
}
