//! Order status machine
//!
//! ```text
//! PENDING_PAYMENT ──pay──▶ PAID ──redeem──▶ PRINTING ──printed──▶ READY_PICKUP ──pickup──▶ COMPLETED
//!        │                  │  └──redeem (collapsed)──────────────────▶ │
//!        └─cancel─▶ CANCELLED  └────────────refund──────────────▶ REFUNDED ◀──┘
//! ```
//!
//! All legal moves live in [`OrderStatus::next`]; callers never compare
//! statuses directly to decide whether a move is allowed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Printing,
    ReadyPickup,
    Completed,
    Cancelled,
    Refunded,
}

/// Events that drive the order status machine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderAction {
    /// 支付回调确认
    ConfirmPayment,
    /// 用户/运营取消，或支付超时
    Cancel,
    /// 核销取件码，进入打印
    Redeem,
    /// 核销取件码，打印与取件合并为一步
    RedeemForPickup,
    /// 打印完成
    MarkPrinted,
    /// 用户取件
    MarkPickedUp,
    /// 退款
    Refund,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Printing,
        OrderStatus::ReadyPickup,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Transition table: `(current, action) → next`, `None` means rejected.
    pub fn next(self, action: OrderAction) -> Option<OrderStatus> {
        use OrderAction as A;
        use OrderStatus as S;

        match (self, action) {
            (S::PendingPayment, A::ConfirmPayment) => Some(S::Paid),
            (S::PendingPayment, A::Cancel) => Some(S::Cancelled),
            (S::Paid, A::Redeem) => Some(S::Printing),
            (S::Paid, A::RedeemForPickup) => Some(S::ReadyPickup),
            (S::Printing, A::MarkPrinted) => Some(S::ReadyPickup),
            (S::ReadyPickup, A::MarkPickedUp) => Some(S::Completed),
            (S::Paid | S::Printing | S::ReadyPickup, A::Refund) => Some(S::Refunded),
            _ => None,
        }
    }

    pub fn can(self, action: OrderAction) -> bool {
        self.next(action).is_some()
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "PENDING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::Printing => "PRINTING",
            OrderStatus::ReadyPickup => "READY_PICKUP",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }

    /// 状态描述 (展示用)
    pub fn description(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "待支付",
            OrderStatus::Paid => "已支付",
            OrderStatus::Printing => "打印中",
            OrderStatus::ReadyPickup => "可取件",
            OrderStatus::Completed => "已完成",
            OrderStatus::Cancelled => "已取消",
            OrderStatus::Refunded => "已退款",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderAction::ConfirmPayment => "CONFIRM_PAYMENT",
            OrderAction::Cancel => "CANCEL",
            OrderAction::Redeem => "REDEEM",
            OrderAction::RedeemForPickup => "REDEEM_FOR_PICKUP",
            OrderAction::MarkPrinted => "MARK_PRINTED",
            OrderAction::MarkPickedUp => "MARK_PICKED_UP",
            OrderAction::Refund => "REFUND",
        };
        f.write_str(s)
    }
}
