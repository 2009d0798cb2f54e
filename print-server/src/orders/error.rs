//! Order engine errors

use shared::error::{AppError, ErrorCode};
use shared::order::{OrderAction, OrderStatus};
use thiserror::Error;

use super::storage::StorageError;
use crate::pricing::PricingError;

/// Order engine errors
///
/// Only [`OrderError::StoreUnavailable`] is worth retrying; every other
/// variant is a definitive answer for the given input.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Cannot {action} order {order_id} in status {from}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        action: OrderAction,
    },

    #[error("Pricing unavailable: {0}")]
    PricingUnavailable(String),

    #[error("Payment reference {payment_ref} already confirmed order {order_id}")]
    PaymentRefConflict { payment_ref: String, order_id: String },

    #[error("Verification code not found: {0}")]
    CodeNotFound(String),

    #[error("Verification code expired: {0}")]
    CodeExpired(String),

    #[error("Verification code already used: {0}")]
    CodeAlreadyUsed(String),

    #[error("No free verification code after {0} attempts")]
    CodeSpaceExhausted(u32),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl OrderError {
    pub(crate) fn invalid_transition(
        order_id: impl Into<String>,
        from: OrderStatus,
        action: OrderAction,
    ) -> Self {
        OrderError::InvalidTransition {
            order_id: order_id.into(),
            from,
            action,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Validation(_) => ErrorCode::ValidationFailed,
            OrderError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            OrderError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            OrderError::PricingUnavailable(_) => ErrorCode::PricingUnavailable,
            OrderError::PaymentRefConflict { .. } => ErrorCode::PaymentRefConflict,
            OrderError::CodeNotFound(_) => ErrorCode::CodeNotFound,
            OrderError::CodeExpired(_) => ErrorCode::CodeExpired,
            OrderError::CodeAlreadyUsed(_) => ErrorCode::CodeAlreadyUsed,
            OrderError::CodeSpaceExhausted(_) => ErrorCode::CodeSpaceExhausted,
            OrderError::StoreUnavailable(StorageError::Serialization(_)) => {
                ErrorCode::StorageCorrupted
            }
            OrderError::StoreUnavailable(StorageError::OrderNoConflict { .. }) => {
                ErrorCode::InternalError
            }
            OrderError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            OrderError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<AppError> for OrderError {
    fn from(err: AppError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidRequest
            | ErrorCode::InvalidFormat
            | ErrorCode::ValueOutOfRange => OrderError::Validation(err.message),
            _ => OrderError::Internal(err.message),
        }
    }
}

impl From<PricingError> for OrderError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidQuantity { .. } => OrderError::Validation(err.to_string()),
            other => OrderError::PricingUnavailable(other.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let code = err.code();
        if let OrderError::StoreUnavailable(e) = &err {
            tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
        }
        let app = AppError::with_message(code, err.to_string());
        match err {
            OrderError::OrderNotFound(id) => app.with_detail("orderId", id),
            OrderError::InvalidTransition {
                order_id,
                from,
                action,
            } => app
                .with_detail("orderId", order_id)
                .with_detail("from", from.as_str())
                .with_detail("action", action.to_string()),
            OrderError::PaymentRefConflict {
                payment_ref,
                order_id,
            } => app
                .with_detail("paymentRef", payment_ref)
                .with_detail("orderId", order_id),
            _ => app,
        }
    }
}
