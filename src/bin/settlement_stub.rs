//! Settlement service stub
//!
//! Stands in for the external settlement provider during development.
//! Accepts any settlement request, waits a configurable delay, then
//! fails a configurable fraction of calls so the engine's failure
//! handling can be exercised end to end.
//!
//! Environment:
//! - `PORT`       listen port (default 9090)
//! - `DELAY_MS`   per-request processing delay (default 1000)
//! - `ERROR_RATE` fraction of requests answered 503 (default 0.1)

use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn settle(Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    let delay_ms: u64 = env_or("DELAY_MS", 1000);
    let error_rate: f64 = env_or("ERROR_RATE", 0.1);

    info!(request = %request, "Settlement request");
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    if rand::random::<f64>() < error_rate {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "failed" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "status": "success" })))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let port: u16 = env_or("PORT", 9090);
    let app = Router::new().route("/settlements", post(settle));

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Settlement stub listening");

    axum::serve(listener, app).await?;
    Ok(())
}
