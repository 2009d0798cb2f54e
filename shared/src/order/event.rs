//! Order events - broadcast after a transition has been committed

use super::status::OrderStatus;
use serde::{Deserialize, Serialize};

/// Order event - downstream consumers (print dispatch, notifications)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    /// Event unique ID
    pub event_id: String,
    pub order_id: String,
    pub order_no: String,
    pub event_type: OrderEventType,
    /// Order status after the event
    pub status: OrderStatus,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Actor label (`user:…`, `operator:…`, `system`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Free-form detail (reason, error message)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Event type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventType {
    // Lifecycle
    OrderCreated,
    OrderPaid,
    OrderPrinted,
    OrderCompleted,
    OrderCancelled,
    OrderRefunded,

    // Verification code
    CodeIssued,
    CodeRedeemed,
    CodeExpired,

    // Print submission
    PrintSubmitted,
    PrintSubmissionFailed,
}
