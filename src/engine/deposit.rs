//! Wallet deposits
//!
//! A deposit races against in-flight transfers touching the same wallet,
//! so it runs under the same exclusive row lock the executor takes: lock
//! the wallet, add, commit.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::ledger::{Ledger, LedgerError};
use crate::model::{Wallet, WalletId};
use crate::money::{self, MoneyError};

#[derive(Debug, Error)]
pub enum DepositError {
    #[error(transparent)]
    InvalidAmount(#[from] MoneyError),

    #[error("Wallet {0} not found")]
    UnknownWallet(WalletId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Applies deposits to wallets under an exclusive lock
#[derive(Clone)]
pub struct DepositService {
    ledger: Arc<dyn Ledger>,
}

impl DepositService {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Add `amount` to the wallet's balance and return the updated wallet
    pub async fn deposit(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
    ) -> Result<Wallet, DepositError> {
        money::validate_amount(amount)?;

        let mut uow = self.ledger.begin().await?;
        let Some(wallet) = uow.lock_wallet(wallet_id).await? else {
            return Err(DepositError::UnknownWallet(wallet_id));
        };

        let new_balance = wallet.balance + amount;
        money::validate_balance(new_balance)?;

        uow.set_wallet_balance(wallet_id, new_balance).await?;
        uow.commit().await?;

        info!(wallet_id = %wallet_id, amount = %amount, balance = %new_balance, "Deposit applied");

        let mut updated = wallet;
        updated.balance = new_balance;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_deposit_adds_to_balance() {
        let ledger = MemoryLedger::new();
        let wallet = ledger.create_wallet(dec("10.50")).await.unwrap();

        let service = DepositService::new(Arc::new(ledger.clone()));
        let updated = service.deposit(wallet.id, dec("4.25")).await.unwrap();
        assert_eq!(updated.balance, dec("14.75"));

        let stored = ledger.get_wallet(wallet.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec("14.75"));
    }

    #[tokio::test]
    async fn test_deposit_rejects_non_positive_amount() {
        let ledger = MemoryLedger::new();
        let wallet = ledger.create_wallet(dec("10")).await.unwrap();

        let service = DepositService::new(Arc::new(ledger.clone()));
        let result = service.deposit(wallet.id, dec("0")).await;
        assert!(matches!(result, Err(DepositError::InvalidAmount(_))));

        let result = service.deposit(wallet.id, dec("-5")).await;
        assert!(matches!(result, Err(DepositError::InvalidAmount(_))));

        let stored = ledger.get_wallet(wallet.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec("10"));
    }

    #[tokio::test]
    async fn test_deposit_to_unknown_wallet() {
        let ledger = MemoryLedger::new();
        let service = DepositService::new(Arc::new(ledger));

        let ghost = uuid::Uuid::new_v4();
        let result = service.deposit(ghost, dec("1")).await;
        assert!(matches!(result, Err(DepositError::UnknownWallet(id)) if id == ghost));
    }

    #[tokio::test]
    async fn test_concurrent_deposits_all_land() {
        let ledger = MemoryLedger::new();
        let wallet = ledger.create_wallet(dec("0")).await.unwrap();
        let service = DepositService::new(Arc::new(ledger.clone()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            let id = wallet.id;
            handles.push(tokio::spawn(async move {
                service.deposit(id, dec("1.50")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = ledger.get_wallet(wallet.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, dec("15.00"));
    }
}
