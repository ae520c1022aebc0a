//! Wallet Engine - service entry point
//!
//! Wires the pieces together and serves the HTTP gateway:
//!
//! ```text
//! ┌─────────┐    ┌───────────┐    ┌────────────┐    ┌────────────┐
//! │ Gateway │───▶│ Admission │───▶│ Dispatcher │───▶│  Executor  │
//! │ (axum)  │    │ (PENDING) │    │ (due scan) │    │ (settle +  │
//! └─────────┘    └───────────┘    └────────────┘    │  balances) │
//!                                                   └────────────┘
//! ```
//!
//! The ledger backend is PostgreSQL when `postgres_url` is configured,
//! otherwise an in-memory store meant for development and tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{info, warn};

use wallet_engine::config::AppConfig;
use wallet_engine::dispatch::{Dispatcher, DispatcherConfig};
use wallet_engine::engine::{AdmissionGate, DepositService, TransferExecutor};
use wallet_engine::gateway::{self, AppState};
use wallet_engine::ledger::{Ledger, MemoryLedger, PgLedger};
use wallet_engine::logging::init_logging;
use wallet_engine::settlement::HttpSettlementClient;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = init_logging(&config);

    info!("Starting wallet engine ({})", env);

    let ledger: Arc<dyn Ledger> = match config.postgres_url.as_deref() {
        Some(url) => {
            let pg = PgLedger::connect(url).await?;
            info!("Ledger backend: PostgreSQL");
            Arc::new(pg)
        }
        None => {
            warn!("No postgres_url configured; using in-memory ledger, state is lost on restart");
            Arc::new(MemoryLedger::new())
        }
    };

    let settlement = Arc::new(HttpSettlementClient::new(
        config.settlement.endpoint.clone(),
        Duration::from_secs(config.settlement.timeout_secs),
    )?);
    let executor = Arc::new(TransferExecutor::new(ledger.clone(), settlement));

    // The gate nudges the dispatcher through this when a new
    // transaction lands, so due work never waits out a full poll tick.
    let wakeup = Arc::new(Notify::new());

    let dispatcher = Dispatcher::new(
        ledger.clone(),
        executor,
        DispatcherConfig {
            poll_interval: Duration::from_millis(config.dispatcher.poll_interval_ms),
            batch_size: config.dispatcher.batch_size,
            concurrency: config.dispatcher.concurrency,
        },
        wakeup.clone(),
    );
    tokio::spawn(async move { dispatcher.run().await });

    let admission = AdmissionGate::new(
        ledger.clone(),
        chrono::Duration::seconds(config.admission.min_lead_secs),
        wakeup,
    );
    let deposits = DepositService::new(ledger.clone());

    let state = Arc::new(AppState {
        ledger,
        admission,
        deposits,
    });

    let port = get_port_override().unwrap_or(config.gateway.port);
    gateway::run_server(&config.gateway.host, port, state).await
}
