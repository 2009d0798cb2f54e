//! Print order record

use super::status::OrderStatus;
use super::types::PrintConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who asked for a mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    User(String),
    Operator(String),
    /// Background processes (sweeper)
    System,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Actor::User(id.into())
    }

    pub fn operator(id: impl Into<String>) -> Self {
        Actor::Operator(id.into())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User(id) => write!(f, "user:{}", id),
            Actor::Operator(id) => write!(f, "operator:{}", id),
            Actor::System => f.write_str("system"),
        }
    }
}

/// 取消原因
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    /// 用户主动取消
    UserRequested,
    /// 运营人员取消
    Operator,
    /// 支付超时
    PaymentTimeout,
}

/// 当前状态允许的操作 (前端按钮显隐)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderOperations {
    pub can_cancel: bool,
    pub can_pay: bool,
    pub can_pickup: bool,
    pub can_refund: bool,
}

/// Print order - one user, one file, one configuration, one price
///
/// Never deleted; terminal orders stay in storage for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrintOrder {
    /// Opaque immutable ID (UUID v4)
    pub order_id: String,
    /// Human-readable order number, e.g. `PRT20241207000001`
    pub order_no: String,
    pub user_id: String,
    pub file_ref: String,
    pub print_config: PrintConfig,
    pub page_count: u32,
    /// Unit price resolved at creation
    pub unit_price: Decimal,
    /// Charged amount; fixed at creation, never re-priced
    pub amount: Decimal,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<CancelReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_reason: Option<String>,

    // === Timestamps (Unix millis) ===
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    /// 核销进入打印的时间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<i64>,

    // === Print dispatch ===
    /// 打印任务已交给打印端（成功或失败都会记录），未记录的订单会被补投
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_dispatched_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_error: Option<String>,
}

impl PrintOrder {
    /// Move to `to` and stamp the matching timestamp.
    ///
    /// The caller has already validated the move against the transition table.
    pub fn enter(&mut self, to: OrderStatus, now: i64) {
        match to {
            OrderStatus::PendingPayment => {}
            OrderStatus::Paid => self.paid_at = Some(now),
            OrderStatus::Printing => self.print_started_at = Some(now),
            OrderStatus::ReadyPickup => {
                // 合并流程直接从 PAID 到 READY_PICKUP
                if self.print_started_at.is_none() {
                    self.print_started_at = Some(now);
                }
                self.printed_at = Some(now);
            }
            OrderStatus::Completed => self.completed_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            OrderStatus::Refunded => self.refunded_at = Some(now),
        }
        self.status = to;
        self.updated_at = now;
    }

    pub fn operations(&self) -> OrderOperations {
        use super::status::OrderAction;

        OrderOperations {
            can_cancel: self.status.can(OrderAction::Cancel),
            can_pay: self.status.can(OrderAction::ConfirmPayment),
            can_pickup: self.status.can(OrderAction::MarkPickedUp),
            can_refund: self.status.can(OrderAction::Refund),
        }
    }

    pub fn status_description(&self) -> &'static str {
        self.status.description()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
