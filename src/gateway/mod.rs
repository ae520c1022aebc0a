//! HTTP Gateway
//!
//! Thin axum layer over the engine. Handlers parse and validate the
//! wire shapes, then call into [`AdmissionGate`], [`DepositService`] or
//! the ledger directly; no business rule lives here.
//!
//! All endpoints answer with the unified
//! [`ApiResponse`](types::ApiResponse) envelope.

pub mod handlers;
pub mod types;

use axum::{
    Router,
    routing::{get, patch, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::engine::{AdmissionGate, DepositService};
use crate::ledger::Ledger;

/// Shared state handed to every handler
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub admission: AdmissionGate,
    pub deposits: DepositService,
}

/// Build the full gateway router
pub fn routes(state: Arc<AppState>) -> Router {
    let wallet_routes = Router::new()
        .route("/wallets", post(handlers::create_wallet))
        .route("/wallets/{wallet_id}", get(handlers::get_wallet))
        .route("/wallets/{wallet_id}/deposit", patch(handlers::deposit))
        .route("/wallets/{wallet_id}/withdraw", post(handlers::withdraw));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1", wallet_routes)
        .with_state(state)
}

/// Start the HTTP gateway server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    info!(addr = %addr, "Gateway listening");

    axum::serve(listener, routes(state)).await?;
    Ok(())
}
