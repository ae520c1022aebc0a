//! Dispatcher scan behavior over the in-memory ledger

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Notify;

use wallet_engine::dispatch::{Dispatcher, DispatcherConfig};
use wallet_engine::engine::{AdmissionGate, TransferExecutor};
use wallet_engine::ledger::{Ledger, MemoryLedger};
use wallet_engine::model::{TransactionId, TransactionRecord, TransactionStatus, WalletId};
use wallet_engine::settlement::MockSettlementClient;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

async fn insert_pending(
    ledger: &MemoryLedger,
    sender: WalletId,
    receiver: WalletId,
    amount: Decimal,
    scheduled_time: DateTime<Utc>,
) -> TransactionId {
    let record = TransactionRecord::new_pending(sender, receiver, amount, scheduled_time);
    let mut uow = ledger.begin().await.unwrap();
    uow.insert_transaction(&record).await.unwrap();
    uow.commit().await.unwrap();
    record.id
}

fn build_dispatcher(
    ledger: &MemoryLedger,
    settlement: &Arc<MockSettlementClient>,
    config: DispatcherConfig,
) -> Dispatcher {
    let executor = Arc::new(TransferExecutor::new(
        Arc::new(ledger.clone()),
        settlement.clone(),
    ));
    Dispatcher::new(
        Arc::new(ledger.clone()),
        executor,
        config,
        Arc::new(Notify::new()),
    )
}

#[tokio::test]
async fn test_scan_executes_due_and_leaves_future() {
    let ledger = MemoryLedger::new();
    let sender = ledger.create_wallet(dec("100")).await.unwrap();
    let receiver = ledger.create_wallet(dec("100")).await.unwrap();

    let due = insert_pending(
        &ledger,
        sender.id,
        receiver.id,
        dec("20"),
        Utc::now() - Duration::seconds(1),
    )
    .await;
    let future = insert_pending(
        &ledger,
        sender.id,
        receiver.id,
        dec("30"),
        Utc::now() + Duration::hours(1),
    )
    .await;

    let settlement = Arc::new(MockSettlementClient::new());
    let dispatcher = build_dispatcher(&ledger, &settlement, DispatcherConfig::default());

    let settled = dispatcher.scan_and_execute().await.unwrap();
    assert_eq!(settled, 1);

    let due_row = ledger.get_transaction(due).await.unwrap().unwrap();
    assert_eq!(due_row.status, TransactionStatus::Success);

    // Not yet due: untouched, not failed-as-premature.
    let future_row = ledger.get_transaction(future).await.unwrap().unwrap();
    assert_eq!(future_row.status, TransactionStatus::Pending);
    assert_eq!(settlement.calls(), 1);
}

#[tokio::test]
async fn test_scan_respects_batch_size() {
    let ledger = MemoryLedger::new();
    let sender = ledger.create_wallet(dec("1000")).await.unwrap();
    let receiver = ledger.create_wallet(dec("0")).await.unwrap();

    for i in 0..5 {
        insert_pending(
            &ledger,
            sender.id,
            receiver.id,
            dec("10"),
            Utc::now() - Duration::seconds(10 - i),
        )
        .await;
    }

    let settlement = Arc::new(MockSettlementClient::new());
    let config = DispatcherConfig {
        batch_size: 2,
        ..DispatcherConfig::default()
    };
    let dispatcher = build_dispatcher(&ledger, &settlement, config);

    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 2);
    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 2);
    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 1);
    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 0);

    let final_receiver = ledger.get_wallet(receiver.id).await.unwrap().unwrap();
    assert_eq!(final_receiver.balance, dec("50"));
}

/// A terminal transaction leaves the due scan for good, whether it
/// ended SUCCESS or FAILED.
#[tokio::test]
async fn test_rescan_skips_terminal_transactions() {
    let ledger = MemoryLedger::new();
    let sender = ledger.create_wallet(dec("25")).await.unwrap();
    let receiver = ledger.create_wallet(dec("0")).await.unwrap();

    let ok = insert_pending(
        &ledger,
        sender.id,
        receiver.id,
        dec("20"),
        Utc::now() - Duration::seconds(2),
    )
    .await;
    // 30 > remaining 5, fails at execution
    let broke = insert_pending(
        &ledger,
        sender.id,
        receiver.id,
        dec("30"),
        Utc::now() - Duration::seconds(1),
    )
    .await;

    let settlement = Arc::new(MockSettlementClient::new());
    let dispatcher = build_dispatcher(&ledger, &settlement, DispatcherConfig::default());

    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 2);
    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 0);

    let ok_row = ledger.get_transaction(ok).await.unwrap().unwrap();
    let broke_row = ledger.get_transaction(broke).await.unwrap().unwrap();
    assert_eq!(ok_row.status, TransactionStatus::Success);
    assert_eq!(broke_row.status, TransactionStatus::Failed);

    // Only the successful transfer reached settlement and the balances.
    assert_eq!(settlement.calls(), 1);
    let sender_row = ledger.get_wallet(sender.id).await.unwrap().unwrap();
    assert_eq!(sender_row.balance, dec("5"));
}

/// Full path from admission to settlement: the scan never picks a
/// transaction up early, then settles it once due.
#[tokio::test]
async fn test_admission_to_settlement_flow() {
    let ledger = MemoryLedger::new();
    let sender = ledger.create_wallet(dec("100")).await.unwrap();
    let receiver = ledger.create_wallet(dec("100")).await.unwrap();

    let gate = AdmissionGate::new(
        Arc::new(ledger.clone()),
        Duration::zero(),
        Arc::new(Notify::new()),
    );
    let record = gate
        .submit_withdrawal(
            sender.id,
            receiver.id,
            dec("40"),
            Utc::now() + Duration::milliseconds(150),
        )
        .await
        .unwrap();

    let settlement = Arc::new(MockSettlementClient::new());
    let dispatcher = build_dispatcher(&ledger, &settlement, DispatcherConfig::default());

    // Scheduled time has not arrived yet.
    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 0);
    assert_eq!(settlement.calls(), 0);

    tokio::time::sleep(StdDuration::from_millis(300)).await;

    assert_eq!(dispatcher.scan_and_execute().await.unwrap(), 1);
    let stored = ledger.get_transaction(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Success);

    let sender_row = ledger.get_wallet(sender.id).await.unwrap().unwrap();
    let receiver_row = ledger.get_wallet(receiver.id).await.unwrap().unwrap();
    assert_eq!(sender_row.balance, dec("60"));
    assert_eq!(receiver_row.balance, dec("140"));
}
