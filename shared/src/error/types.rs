//! Boundary error type

use super::category::ErrorCategory;
use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// Every engine failure is converted into this shape before it leaves the
/// process, so callers only ever match on [`ErrorCode`].
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    // ==================== Convenience constructors ====================

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        let r = resource.into();
        Self::with_message(ErrorCode::NotFound, format!("{} not found", r))
            .with_detail("resource", r)
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InvalidRequest, msg)
    }
}

impl From<ErrorCode> for AppError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_message() {
        let err = AppError::new(ErrorCode::CodeAlreadyUsed);
        assert_eq!(err.message, "Verification code has already been used");
        assert_eq!(err.category(), ErrorCategory::Verification);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_with_detail() {
        let err = AppError::validation("bad copies").with_detail("field", "copies");
        let details = err.details.unwrap();
        assert_eq!(details.get("field"), Some(&Value::from("copies")));
    }

    #[test]
    fn test_serialized_shape() {
        let err = AppError::new(ErrorCode::InvalidTransition);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], 4002);
        assert!(json.get("details").is_none());
    }
}
