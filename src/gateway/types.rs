//! API response envelope, error codes and wallet DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{TransactionRecord, Wallet};
use crate::money;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    pub code: i32,
    /// Response message
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Wallet response data. Balances go out as fixed two-decimal strings.
#[derive(Debug, Serialize)]
pub struct WalletData {
    pub id: String,
    pub balance: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletData {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id.to_string(),
            balance: money::format_amount(wallet.balance),
            created_at: wallet.created_at,
            updated_at: wallet.updated_at,
        }
    }
}

/// Scheduled transaction response data
#[derive(Debug, Serialize)]
pub struct TransactionData {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for TransactionData {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            sender_id: record.sender_id.to_string(),
            receiver_id: record.receiver_id.to_string(),
            amount: money::format_amount(record.amount),
            scheduled_time: record.scheduled_time,
            status: record.status.as_str().to_string(),
            error_message: record.error_message.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Wallet detail: the wallet plus its transaction history, split by
/// direction, newest first
#[derive(Debug, Serialize)]
pub struct WalletDetailData {
    pub wallet: WalletData,
    pub outgoing: Vec<TransactionData>,
    pub incoming: Vec<TransactionData>,
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;

    // Resource errors (4xxx)
    pub const WALLET_NOT_FOUND: i32 = 4001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_success_envelope_shape() {
        let resp = ApiResponse::success("payload");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["msg"], "ok");
        assert_eq!(json["data"], "payload");
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let resp = ApiResponse::<()>::error(error_codes::WALLET_NOT_FOUND, "nope");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], 4001);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_wallet_data_formats_balance() {
        let wallet = Wallet::new("7.5".parse::<Decimal>().unwrap());
        let data = WalletData::from(&wallet);
        assert_eq!(data.balance, "7.50");
    }
}
