//! Unified error codes for the print kiosk
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Verification code errors
//! - 7xxx: Pricing errors
//! - 9xxx: System errors

use super::category::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so that the kiosk UI can map
/// each outcome to its own remediation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Status transition not allowed from the current status
    InvalidTransition = 4002,

    // ==================== 5xxx: Payment ====================
    /// Payment reference already bound to another order
    PaymentRefConflict = 5001,

    // ==================== 6xxx: Verification Code ====================
    /// No code with this value
    CodeNotFound = 6001,
    /// Code has expired
    CodeExpired = 6002,
    /// Code was already redeemed
    CodeAlreadyUsed = 6003,
    /// Could not find a free code value
    CodeSpaceExhausted = 6004,

    // ==================== 7xxx: Pricing ====================
    /// No price entry for the requested configuration
    PricingUnavailable = 7001,
    /// Price table is malformed
    InvalidPriceTable = 7002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Persistence layer unavailable (retryable)
    StoreUnavailable = 9002,
    /// Stored data could not be decoded
    StorageCorrupted = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the error category
    #[inline]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    /// Check if this is a success code
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether a caller may retry the operation with backoff
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::StoreUnavailable)
    }

    /// Get the default message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Operation not allowed in the current order status",

            // Payment
            ErrorCode::PaymentRefConflict => "Payment reference belongs to another order",

            // Verification code
            ErrorCode::CodeNotFound => "Verification code not found",
            ErrorCode::CodeExpired => "Verification code has expired",
            ErrorCode::CodeAlreadyUsed => "Verification code has already been used",
            ErrorCode::CodeSpaceExhausted => "No verification code available, try again",

            // Pricing
            ErrorCode::PricingUnavailable => "No price configured for this print setting",
            ErrorCode::InvalidPriceTable => "Price table is invalid",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StoreUnavailable => "Storage is temporarily unavailable",
            ErrorCode::StorageCorrupted => "Stored data is corrupted",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),

            // Payment
            5001 => Ok(ErrorCode::PaymentRefConflict),

            // Verification code
            6001 => Ok(ErrorCode::CodeNotFound),
            6002 => Ok(ErrorCode::CodeExpired),
            6003 => Ok(ErrorCode::CodeAlreadyUsed),
            6004 => Ok(ErrorCode::CodeSpaceExhausted),

            // Pricing
            7001 => Ok(ErrorCode::PricingUnavailable),
            7002 => Ok(ErrorCode::InvalidPriceTable),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StoreUnavailable),
            9003 => Ok(ErrorCode::StorageCorrupted),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
