//! Settlement Client
//!
//! The engine never moves funds without a synchronous go-ahead from the
//! external settlement service. The client is injected into the executor
//! so deployments (and tests) choose the implementation; there is no
//! process-wide settlement endpoint.
//!
//! Failure policy is deliberately blunt: anything other than a 2xx
//! acknowledgement within the timeout - rejection, transport error,
//! timeout - is a settlement failure and fails the transaction.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::model::WalletId;
use crate::money;

/// Default settlement call timeout
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("settlement service rejected the transfer (status {status})")]
    Rejected { status: u16 },

    #[error("settlement service unreachable: {0}")]
    Transport(String),
}

/// What the settlement service is told about a transfer
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub sender: WalletId,
    pub receiver: WalletId,
    pub amount: Decimal,
    pub scheduled_time: DateTime<Utc>,
}

#[async_trait]
pub trait SettlementClient: Send + Sync + Debug {
    /// Ask the settlement service to acknowledge the transfer.
    /// `Ok(())` is the only green light.
    async fn settle(&self, request: &SettlementRequest) -> Result<(), SettlementError>;
}

/// Wire shape of the settlement POST body. Amounts travel as strings
/// with exactly two fractional digits.
#[derive(Debug, Serialize)]
struct SettlementWireRequest {
    sender: WalletId,
    receiver: WalletId,
    amount: String,
    scheduled_time: DateTime<Utc>,
}

impl SettlementWireRequest {
    fn from_request(request: &SettlementRequest) -> Self {
        Self {
            sender: request.sender,
            receiver: request.receiver,
            amount: money::format_amount(request.amount),
            scheduled_time: request.scheduled_time,
        }
    }
}

/// HTTP settlement client
#[derive(Debug)]
pub struct HttpSettlementClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpSettlementClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SettlementError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SettlementClient for HttpSettlementClient {
    async fn settle(&self, request: &SettlementRequest) -> Result<(), SettlementError> {
        let body = SettlementWireRequest::from_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SettlementError::Transport(format!(
                        "timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    SettlementError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(sender = %request.sender, receiver = %request.receiver, "Settlement acknowledged");
            Ok(())
        } else {
            Err(SettlementError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

/// Scriptable settlement client for tests
///
/// Counts calls and fails on demand, either as an explicit rejection or
/// as a transport error. An optional artificial delay widens race
/// windows in concurrency tests.
#[derive(Debug, Default)]
pub struct MockSettlementClient {
    calls: AtomicUsize,
    reject: AtomicBool,
    transport_failure: AtomicBool,
    delay_ms: AtomicU64,
}

impl MockSettlementClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of settle calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next calls fail as an explicit rejection (HTTP 503)
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Make the next calls fail as a transport error
    pub fn set_transport_failure(&self, fail: bool) {
        self.transport_failure.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by the given number of milliseconds
    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettlementClient for MockSettlementClient {
    async fn settle(&self, _request: &SettlementRequest) -> Result<(), SettlementError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if self.transport_failure.load(Ordering::SeqCst) {
            return Err(SettlementError::Transport(
                "simulated connection failure".to_string(),
            ));
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(SettlementError::Rejected { status: 503 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use uuid::Uuid;

    fn request() -> SettlementRequest {
        SettlementRequest {
            sender: Uuid::new_v4(),
            receiver: Uuid::new_v4(),
            amount: "20".parse().unwrap(),
            scheduled_time: Utc::now(),
        }
    }

    #[test]
    fn test_wire_request_formats_amount_with_two_digits() {
        let req = request();
        let wire = SettlementWireRequest::from_request(&req);
        assert_eq!(wire.amount, "20.00");

        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["amount"], "20.00");
        assert_eq!(value["sender"], req.sender.to_string());
        assert_eq!(value["receiver"], req.receiver.to_string());
        assert!(value["scheduled_time"].is_string());
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let mock = MockSettlementClient::new();
        assert_eq!(mock.calls(), 0);

        mock.settle(&request()).await.unwrap();
        mock.settle(&request()).await.unwrap();
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_rejection_and_transport_failure_differ() {
        let mock = MockSettlementClient::new();

        mock.set_reject(true);
        let rejected = mock.settle(&request()).await.unwrap_err();
        assert!(matches!(rejected, SettlementError::Rejected { status: 503 }));

        mock.set_reject(false);
        mock.set_transport_failure(true);
        let unreachable = mock.settle(&request()).await.unwrap_err();
        assert!(matches!(unreachable, SettlementError::Transport(_)));

        assert_ne!(rejected.to_string(), unreachable.to_string());
    }

    async fn spawn_settlement_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/settlements", addr)
    }

    #[tokio::test]
    async fn test_http_client_maps_acknowledgement_and_rejection() {
        let ok_endpoint = spawn_settlement_server(Router::new().route(
            "/settlements",
            post(|| async {
                (
                    StatusCode::OK,
                    axum::Json(serde_json::json!({"status": "success"})),
                )
            }),
        ))
        .await;
        let client = HttpSettlementClient::new(ok_endpoint, Duration::from_secs(2)).unwrap();
        client.settle(&request()).await.unwrap();

        let reject_endpoint = spawn_settlement_server(Router::new().route(
            "/settlements",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    axum::Json(serde_json::json!({"status": "failed"})),
                )
            }),
        ))
        .await;
        let client = HttpSettlementClient::new(reject_endpoint, Duration::from_secs(2)).unwrap();
        let err = client.settle(&request()).await.unwrap_err();
        assert!(matches!(err, SettlementError::Rejected { status: 503 }));
    }

    #[tokio::test]
    async fn test_http_client_timeout_is_a_settlement_failure() {
        let endpoint = spawn_settlement_server(Router::new().route(
            "/settlements",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        ))
        .await;

        let client = HttpSettlementClient::new(endpoint, Duration::from_millis(200)).unwrap();
        let err = client.settle(&request()).await.unwrap_err();
        match err {
            SettlementError::Transport(msg) => {
                assert!(msg.contains("timed out"), "unexpected reason: {}", msg)
            }
            other => panic!("expected a transport failure, got {:?}", other),
        }
    }
}
