use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use crate::engine::{AdmissionError, DepositError};
use crate::ledger::LedgerError;
use crate::model::WalletId;
use crate::money;

use super::AppState;
use super::types::{ApiResponse, TransactionData, WalletData, WalletDetailData, error_codes};

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct CreateWalletRequest {
    /// Starting balance; omitted means zero
    pub initial_balance: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Receiving wallet
    pub target: WalletId,
    pub amount: String,
    pub scheduled_time: DateTime<Utc>,
}

// --- Error mapping ---

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

fn bad_request(msg: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            error_codes::INVALID_PARAMETER,
            msg,
        )),
    )
}

fn wallet_not_found(id: WalletId) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            error_codes::WALLET_NOT_FOUND,
            format!("Wallet {} not found", id),
        )),
    )
}

fn ledger_error(e: LedgerError) -> HandlerError {
    match e {
        LedgerError::ConstraintViolation(msg) => bad_request(msg),
        LedgerError::WalletNotFound(id) => wallet_not_found(id),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error(
                error_codes::INTERNAL_ERROR,
                other.to_string(),
            )),
        ),
    }
}

// --- Handlers ---

/// POST /api/v1/wallets
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWalletRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WalletData>>), HandlerError> {
    let initial_balance = match req.initial_balance.as_deref() {
        Some(raw) => money::parse_balance(raw).map_err(|e| bad_request(e.to_string()))?,
        None => Decimal::ZERO,
    };

    let wallet = state
        .ledger
        .create_wallet(initial_balance)
        .await
        .map_err(ledger_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(WalletData::from(&wallet))),
    ))
}

/// GET /api/v1/wallets/{wallet_id}
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<WalletId>,
) -> Result<Json<ApiResponse<WalletDetailData>>, HandlerError> {
    let wallet = state
        .ledger
        .get_wallet(wallet_id)
        .await
        .map_err(ledger_error)?
        .ok_or_else(|| wallet_not_found(wallet_id))?;

    let transactions = state
        .ledger
        .transactions_for_wallet(wallet_id)
        .await
        .map_err(ledger_error)?;

    let mut outgoing = Vec::new();
    let mut incoming = Vec::new();
    for record in &transactions {
        if record.sender_id == wallet_id {
            outgoing.push(TransactionData::from(record));
        } else {
            incoming.push(TransactionData::from(record));
        }
    }

    Ok(Json(ApiResponse::success(WalletDetailData {
        wallet: WalletData::from(&wallet),
        outgoing,
        incoming,
    })))
}

/// PATCH /api/v1/wallets/{wallet_id}/deposit
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<WalletId>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<ApiResponse<WalletData>>, HandlerError> {
    let amount = money::parse_amount(&req.amount).map_err(|e| bad_request(e.to_string()))?;

    match state.deposits.deposit(wallet_id, amount).await {
        Ok(wallet) => Ok(Json(ApiResponse::success(WalletData::from(&wallet)))),
        Err(DepositError::InvalidAmount(e)) => Err(bad_request(e.to_string())),
        Err(DepositError::UnknownWallet(id)) => Err(wallet_not_found(id)),
        Err(DepositError::Ledger(e)) => Err(ledger_error(e)),
    }
}

/// POST /api/v1/wallets/{wallet_id}/withdraw
///
/// Admits a scheduled transfer out of this wallet. Funds are checked at
/// execution time, not here; acceptance only means the transaction is
/// persisted as PENDING.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(wallet_id): Path<WalletId>,
    Json(req): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionData>>), HandlerError> {
    let amount = money::parse_amount(&req.amount).map_err(|e| bad_request(e.to_string()))?;

    match state
        .admission
        .submit_withdrawal(wallet_id, req.target, amount, req.scheduled_time)
        .await
    {
        Ok(record) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::success(TransactionData::from(&record))),
        )),
        Err(AdmissionError::UnknownWallet(id)) => Err(wallet_not_found(id)),
        Err(AdmissionError::Ledger(e)) => Err(ledger_error(e)),
        Err(e @ AdmissionError::InvalidAmount(_))
        | Err(e @ AdmissionError::SameWallet)
        | Err(e @ AdmissionError::ScheduledTooSoon { .. }) => Err(bad_request(e.to_string())),
    }
}

/// GET /api/v1/health
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("ok".to_string()))
}
