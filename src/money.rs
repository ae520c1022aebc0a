//! Money Validation Module
//!
//! Wallet amounts are `rust_decimal::Decimal` values constrained to the
//! precision of the ledger's NUMERIC(10, 2) columns: two fractional digits,
//! ten significant digits. All amount input MUST go through this module.
//!
//! ## Design Principles
//! 1. Explicit Error Handling: No silent truncation or rescaling
//! 2. One precision everywhere: what the API accepts is what the store holds

use rust_decimal::Decimal;
use thiserror::Error;

/// Fractional digits carried by every stored amount
pub const AMOUNT_SCALE: u32 = 2;

/// Total significant digits of the stored NUMERIC type
pub const AMOUNT_MAX_DIGITS: u32 = 10;

// ============================================================================
// Error Types
// ============================================================================

/// Money validation errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    NotPositive,

    #[error("Amount must not be negative")]
    Negative,

    #[error("Amount exceeds {max_digits} total digits")]
    TooLarge { max_digits: u32 },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a transaction or deposit amount: strictly positive, in range
pub fn validate_amount(amount: Decimal) -> Result<(), MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive);
    }
    check_precision(amount)
}

/// Validate a wallet balance: zero is allowed, negative is not
pub fn validate_balance(balance: Decimal) -> Result<(), MoneyError> {
    if balance < Decimal::ZERO {
        return Err(MoneyError::Negative);
    }
    check_precision(balance)
}

fn check_precision(value: Decimal) -> Result<(), MoneyError> {
    // Precision validation: REJECT if too many decimals (no silent truncation!)
    if value.scale() > AMOUNT_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided: value.scale(),
            max: AMOUNT_SCALE,
        });
    }

    // NUMERIC(10, 2) holds at most 8 integer digits
    let integer_limit = Decimal::from(10u64.pow(AMOUNT_MAX_DIGITS - AMOUNT_SCALE));
    if value.abs() >= integer_limit {
        return Err(MoneyError::TooLarge {
            max_digits: AMOUNT_MAX_DIGITS,
        });
    }

    Ok(())
}

// ============================================================================
// Parse: Client → Decimal
// ============================================================================

/// Parse a client-provided amount string and validate it as a positive amount
pub fn parse_amount(amount_str: &str) -> Result<Decimal, MoneyError> {
    let value = parse_decimal(amount_str)?;
    validate_amount(value)?;
    Ok(value)
}

/// Parse a client-provided balance string (zero allowed)
pub fn parse_balance(balance_str: &str) -> Result<Decimal, MoneyError> {
    let value = parse_decimal(balance_str)?;
    validate_balance(value)?;
    Ok(value)
}

fn parse_decimal(input: &str) -> Result<Decimal, MoneyError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    trimmed
        .parse::<Decimal>()
        .map_err(|_| MoneyError::InvalidFormat(format!("not a decimal number: {}", trimmed)))
}

// ============================================================================
// Format: Decimal → Client
// ============================================================================

/// Render an amount with the canonical two fractional digits
pub fn format_amount(value: Decimal) -> String {
    format!("{:.prec$}", value, prec = AMOUNT_SCALE as usize)
}

// ============================================================================
// Unit Tests
// ============================================================================
