//! PostgreSQL Ledger
//!
//! Maps the unit-of-work contract onto a database transaction:
//! `SELECT ... FOR UPDATE` takes the row locks, a single COMMIT publishes
//! the staged writes. The schema (see `migrations/`) carries the same
//! constraints the engine asserts, so a violating write fails loudly
//! instead of landing.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

use super::{Ledger, LedgerError, LedgerUow};
use crate::model::{TransactionId, TransactionRecord, TransactionStatus, Wallet, WalletId};

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            match db.kind() {
                sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::UniqueViolation => {
                    return LedgerError::ConstraintViolation(db.message().to_string());
                }
                _ => {}
            }
        }
        LedgerError::Storage(e.to_string())
    }
}

/// PostgreSQL ledger backend
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        info!("PostgreSQL ledger ready");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerUow>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUow { tx }))
    }

    async fn create_wallet(&self, initial_balance: Decimal) -> Result<Wallet, LedgerError> {
        let wallet = Wallet::new(initial_balance);
        sqlx::query(
            "INSERT INTO wallets_tb (id, balance, created_at, updated_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(wallet.id)
        .bind(wallet.balance)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(wallet)
    }

    async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, balance, created_at, updated_at
             FROM wallets_tb
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_wallet(&r)))
    }

    async fn wallet_exists(&self, id: WalletId) -> Result<bool, LedgerError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM wallets_tb WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, sender_id, receiver_id, amount, scheduled_time, status,
                    error_message, created_at, updated_at
             FROM transactions_tb
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn transactions_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, amount, scheduled_time, status,
                    error_message, created_at, updated_at
             FROM transactions_tb
             WHERE sender_id = $1 OR receiver_id = $1
             ORDER BY created_at DESC",
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn find_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionId>, LedgerError> {
        let ids: Vec<TransactionId> = sqlx::query_scalar(
            "SELECT id
             FROM transactions_tb
             WHERE status = 'PENDING' AND scheduled_time <= $1
             ORDER BY scheduled_time ASC
             LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Unit of work backed by a database transaction
struct PgUow {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerUow for PgUow {
    async fn lock_transaction(
        &mut self,
        id: TransactionId,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, sender_id, receiver_id, amount, scheduled_time, status,
                    error_message, created_at, updated_at
             FROM transactions_tb
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn lock_wallet(&mut self, id: WalletId) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query(
            "SELECT id, balance, created_at, updated_at
             FROM wallets_tb
             WHERE id = $1
             FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|r| row_to_wallet(&r)))
    }

    async fn set_wallet_balance(
        &mut self,
        id: WalletId,
        balance: Decimal,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE wallets_tb
             SET balance = $1, updated_at = NOW()
             WHERE id = $2",
        )
        .bind(balance)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::WalletNotFound(id));
        }
        Ok(())
    }

    async fn set_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
        error_message: Option<String>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE transactions_tb
             SET status = $1, error_message = $2, updated_at = NOW()
             WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::TransactionNotFound(id));
        }
        Ok(())
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO transactions_tb
                 (id, sender_id, receiver_id, amount, scheduled_time, status,
                  error_message, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(record.id)
        .bind(record.sender_id)
        .bind(record.receiver_id)
        .bind(record.amount)
        .bind(record.scheduled_time)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn row_to_wallet(row: &PgRow) -> Wallet {
    Wallet {
        id: row.get("id"),
        balance: row.get("balance"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_transaction(row: &PgRow) -> Result<TransactionRecord, LedgerError> {
    let status_str: String = row.get("status");
    let status = TransactionStatus::from_db(&status_str)
        .ok_or_else(|| LedgerError::Storage(format!("invalid stored status: {}", status_str)))?;

    Ok(TransactionRecord {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        amount: row.get("amount"),
        scheduled_time: row.get("scheduled_time"),
        status,
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
