//! OrdersManager - 订单生命周期与取件码的唯一入口
//!
//! # Mutation Flow
//!
//! ```text
//! operation(order_id, ...)
//!     ├─ 1. Begin write transaction (redb serializes writers)
//!     ├─ 2. Load order, check ownership for user actors
//!     ├─ 3. Look up (status, action) in the transition table
//!     ├─ 4. Apply side effects (payment binding, code issue/consume/revoke)
//!     ├─ 5. Persist order + indexes
//!     ├─ 6. Commit
//!     └─ 7. Broadcast event(s)
//! ```
//!
//! Any error before step 6 drops the transaction, so the order and its codes
//! are never left half-updated.

use redb::WriteTransaction;
use serde::Serialize;
use shared::order::{
    Actor, CancelReason, CodeType, CreateOrderRequest, LegacyOrderRequest, OrderAction,
    OrderEvent, OrderEventType, OrderStatus, PrintOrder, VerificationCode,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use super::codes::{CodeCheck, CodeGenerator, CodeIssuer};
use super::error::{OrderError, OrderResult};
use super::storage::OrderStorage;
use crate::pricing::{self, PriceSource};
use crate::utils::Clock;

#[cfg(test)]
mod tests;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// Lifecycle tunables
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// 取件码有效期
    pub pickup_code_ttl: Duration,
    /// 核销后直接进入 READY_PICKUP（无独立打印步骤）
    pub collapse_print_step: bool,
    pub order_no_prefix: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            pickup_code_ttl: Duration::from_secs(24 * 60 * 60),
            collapse_print_step: false,
            order_no_prefix: "PRT".to_string(),
        }
    }
}

/// Outcome of a payment confirmation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub order: PrintOrder,
    /// The order's current ACTIVE code (`None` on a replay once it was redeemed)
    pub pickup_code: Option<VerificationCode>,
    /// Same payment reference was already applied to this order
    pub replayed: bool,
}

/// Listing filter for a user's orders
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub items: Vec<PrintOrder>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

/// OrdersManager
pub struct OrdersManager {
    storage: OrderStorage,
    codes: CodeIssuer,
    prices: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
    settings: LifecycleSettings,
    event_tx: broadcast::Sender<OrderEvent>,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &"<OrderStorage>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl OrdersManager {
    pub fn new(
        storage: OrderStorage,
        prices: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
        settings: LifecycleSettings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            codes: CodeIssuer::new(storage.clone()),
            storage,
            prices,
            clock,
            settings,
            event_tx,
        }
    }

    /// Replace the code generator (deterministic codes in tests)
    pub fn with_code_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.codes = CodeIssuer::with_generator(self.storage.clone(), generator);
        self
    }

    /// Subscribe to event broadcasts
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.event_tx.subscribe()
    }

    /// Get the underlying storage
    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    // ========== Creation ==========

    /// Create an order in PENDING_PAYMENT with a server-computed amount
    pub fn create_order(&self, request: CreateOrderRequest) -> OrderResult<PrintOrder> {
        request.validate()?;
        let quote = pricing::quote(self.prices.as_ref(), &request.print_config, request.page_count)?;

        let now = self.now();
        let txn = self.storage.begin_write()?;
        let date = shared::util::local_date_number(now);
        let seq = self.storage.next_daily_sequence(&txn, date)?;

        let order = PrintOrder {
            order_id: uuid::Uuid::new_v4().to_string(),
            order_no: format!("{}{}{:06}", self.settings.order_no_prefix, date, seq),
            user_id: request.user_id,
            file_ref: request.file_ref,
            print_config: request.print_config,
            page_count: request.page_count,
            unit_price: quote.unit_price,
            amount: quote.amount,
            status: OrderStatus::PendingPayment,
            payment_ref: None,
            remark: request.remark,
            cancel_reason: None,
            cancelled_by: None,
            refund_reason: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            print_started_at: None,
            printed_at: None,
            completed_at: None,
            cancelled_at: None,
            refunded_at: None,
            print_dispatched_at: None,
            print_error: None,
        };
        self.storage.put_order(&txn, &order)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order.order_id,
            order_no = %order.order_no,
            amount = %order.amount,
            "Order created"
        );
        let actor = Actor::user(order.user_id.clone());
        self.broadcast([self.event(&order, OrderEventType::OrderCreated, Some(&actor), None, now)]);
        Ok(order)
    }

    /// Create from the deprecated flat request shape
    pub fn create_legacy_order(&self, request: LegacyOrderRequest) -> OrderResult<PrintOrder> {
        tracing::debug!(user_id = %request.user_id, "Legacy create request adapted");
        let request = CreateOrderRequest::try_from(request)?;
        self.create_order(request)
    }

    // ========== Payment ==========

    /// Confirm payment and issue the pickup code in the same transaction
    ///
    /// Replaying the same `payment_ref` for the same order returns the current
    /// state without issuing another code. A reference already bound to a
    /// different order is rejected.
    pub fn confirm_payment(
        &self,
        order_id: &str,
        payment_ref: &str,
    ) -> OrderResult<PaymentConfirmation> {
        if payment_ref.trim().is_empty() {
            return Err(OrderError::Validation("paymentRef must not be empty".into()));
        }

        let now = self.now();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;

        if let Some(bound) = self.storage.get_payment_order_txn(&txn, payment_ref)? {
            if bound != order_id {
                return Err(OrderError::PaymentRefConflict {
                    payment_ref: payment_ref.to_string(),
                    order_id: bound,
                });
            }
            let pickup_code = self.storage.get_order_active_code_txn(&txn, order_id)?;
            tracing::debug!(order_id = %order_id, payment_ref = %payment_ref, "Payment confirmation replayed");
            return Ok(PaymentConfirmation {
                order,
                pickup_code,
                replayed: true,
            });
        }

        let from = order.status;
        let to = from
            .next(OrderAction::ConfirmPayment)
            .ok_or_else(|| OrderError::invalid_transition(order_id, from, OrderAction::ConfirmPayment))?;

        order.payment_ref = Some(payment_ref.to_string());
        order.enter(to, now);
        self.storage.put_order(&txn, &order)?;
        self.storage.record_payment(&txn, payment_ref, order_id)?;
        let code = self.codes.issue_in(
            &txn,
            order_id,
            CodeType::Pickup,
            self.settings.pickup_code_ttl,
            now,
        )?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order_id,
            payment_ref = %payment_ref,
            expires_at = code.expires_at,
            "Payment confirmed, pickup code issued"
        );
        self.broadcast([
            self.event(&order, OrderEventType::OrderPaid, Some(&Actor::System), None, now),
            self.event(&order, OrderEventType::CodeIssued, Some(&Actor::System), None, now),
        ]);

        Ok(PaymentConfirmation {
            order,
            pickup_code: Some(code),
            replayed: false,
        })
    }

    // ========== Lifecycle ==========

    /// Cancel an unpaid order
    pub fn cancel_order(&self, order_id: &str, actor: &Actor) -> OrderResult<PrintOrder> {
        let (order, now) = self.transition(order_id, OrderAction::Cancel, actor, |_, order, _| {
            order.cancel_reason = Some(match actor {
                Actor::User(_) => CancelReason::UserRequested,
                Actor::Operator(_) => CancelReason::Operator,
                Actor::System => CancelReason::PaymentTimeout,
            });
            order.cancelled_by = Some(actor.to_string());
            Ok(())
        })?;
        self.broadcast([self.event(&order, OrderEventType::OrderCancelled, Some(actor), None, now)]);
        Ok(order)
    }

    /// Redeem a pickup code: code becomes USED and the order leaves PAID
    ///
    /// Both changes commit together; if the order cannot move, the code stays
    /// ACTIVE.
    pub fn redeem_code(&self, code: &str, actor: &Actor) -> OrderResult<PrintOrder> {
        let normalized = shared::order::code::normalize_code(code)
            .ok_or_else(|| OrderError::CodeNotFound(code.to_string()))?;
        let action = if self.settings.collapse_print_step {
            OrderAction::RedeemForPickup
        } else {
            OrderAction::Redeem
        };

        let now = self.now();
        let txn = self.storage.begin_write()?;
        let consumed = self
            .codes
            .consume_in(&txn, &normalized, &actor.to_string(), now)?;
        let mut order = self
            .storage
            .get_order_txn(&txn, &consumed.order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(consumed.order_id.clone()))?;

        let from = order.status;
        let to = from
            .next(action)
            .ok_or_else(|| OrderError::invalid_transition(&order.order_id, from, action))?;
        order.enter(to, now);
        self.storage.put_order(&txn, &order)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order.order_id,
            code = %consumed.code,
            actor = %actor,
            to = %to,
            "Pickup code redeemed"
        );
        self.broadcast([self.event(
            &order,
            OrderEventType::CodeRedeemed,
            Some(actor),
            Some(consumed.code),
            now,
        )]);
        Ok(order)
    }

    /// PRINTING → READY_PICKUP
    pub fn mark_printed(&self, order_id: &str, actor: &Actor) -> OrderResult<PrintOrder> {
        let (order, now) =
            self.transition(order_id, OrderAction::MarkPrinted, actor, |_, _, _| Ok(()))?;
        self.broadcast([self.event(&order, OrderEventType::OrderPrinted, Some(actor), None, now)]);
        Ok(order)
    }

    /// READY_PICKUP → COMPLETED
    pub fn mark_picked_up(&self, order_id: &str, actor: &Actor) -> OrderResult<PrintOrder> {
        let (order, now) =
            self.transition(order_id, OrderAction::MarkPickedUp, actor, |_, _, _| Ok(()))?;
        self.broadcast([self.event(&order, OrderEventType::OrderCompleted, Some(actor), None, now)]);
        Ok(order)
    }

    /// Refund a paid order; its ACTIVE code (if any) is expired in the same commit
    pub fn refund(&self, order_id: &str, reason: &str, actor: &Actor) -> OrderResult<PrintOrder> {
        let mut revoked = None;
        let (order, now) = self.transition(order_id, OrderAction::Refund, actor, |txn, order, now| {
            revoked = self.codes.revoke_for_order_in(txn, &order.order_id, now)?;
            order.refund_reason = Some(reason.to_string()).filter(|r| !r.trim().is_empty());
            Ok(())
        })?;

        let mut events = vec![self.event(
            &order,
            OrderEventType::OrderRefunded,
            Some(actor),
            order.refund_reason.clone(),
            now,
        )];
        if let Some(code) = revoked {
            events.push(self.event(&order, OrderEventType::CodeExpired, Some(actor), Some(code.code), now));
        }
        self.broadcast(events);
        Ok(order)
    }

    // ========== Codes ==========

    /// Replace the ACTIVE code of a PAID order (lost code, or expired before pickup)
    pub fn reissue_code(&self, order_id: &str, actor: &Actor) -> OrderResult<VerificationCode> {
        let now = self.now();
        let txn = self.storage.begin_write()?;
        let order = self.load_for(&txn, order_id, actor)?;
        if !order.status.can(OrderAction::Redeem) {
            return Err(OrderError::invalid_transition(order_id, order.status, OrderAction::Redeem));
        }
        let code = self.codes.issue_in(
            &txn,
            order_id,
            CodeType::Pickup,
            self.settings.pickup_code_ttl,
            now,
        )?;
        self.storage.commit(txn)?;

        tracing::info!(order_id = %order_id, actor = %actor, "Pickup code reissued");
        self.broadcast([self.event(&order, OrderEventType::CodeIssued, Some(actor), None, now)]);
        Ok(code)
    }

    /// Read-only: would this code redeem right now?
    pub fn validate_code(&self, code: &str) -> OrderResult<CodeCheck> {
        self.codes.validate(code, self.now())
    }

    /// The order's ACTIVE pickup code (owner only for user actors)
    pub fn get_active_code(&self, order_id: &str, actor: &Actor) -> OrderResult<Option<VerificationCode>> {
        let order = self.get_order(order_id)?;
        if let Actor::User(user_id) = actor
            && !order.is_owned_by(user_id)
        {
            return Err(OrderError::OrderNotFound(order_id.to_string()));
        }
        Ok(self.storage.get_order_active_code(order_id)?)
    }

    // ========== Expiration (sweeper) ==========

    /// Cancel an unpaid order whose payment window has elapsed
    ///
    /// Re-checks status and age inside the transaction; returns `false` when
    /// the order was paid or cancelled in the meantime.
    pub fn expire_unpaid_order(&self, order_id: &str, payment_timeout: Duration) -> OrderResult<bool> {
        let now = self.now();
        let txn = self.storage.begin_write()?;
        let Some(mut order) = self.storage.get_order_txn(&txn, order_id)? else {
            return Ok(false);
        };
        let age = now.saturating_sub(order.created_at);
        if order.status != OrderStatus::PendingPayment || age < payment_timeout.as_millis() as i64 {
            return Ok(false);
        }
        let Some(to) = order.status.next(OrderAction::Cancel) else {
            return Ok(false);
        };

        order.cancel_reason = Some(CancelReason::PaymentTimeout);
        order.cancelled_by = Some(Actor::System.to_string());
        order.enter(to, now);
        self.storage.put_order(&txn, &order)?;
        self.storage.commit(txn)?;

        tracing::info!(order_id = %order_id, age_ms = age, "Unpaid order cancelled by timeout");
        self.broadcast([self.event(
            &order,
            OrderEventType::OrderCancelled,
            Some(&Actor::System),
            Some("payment timeout".to_string()),
            now,
        )]);
        Ok(true)
    }

    /// Expire an ACTIVE code past its expiry; `false` if it was redeemed or not due
    pub fn expire_code(&self, code: &str) -> OrderResult<bool> {
        let now = self.now();
        let txn = self.storage.begin_write()?;
        let Some(record) = self.codes.expire_in(&txn, code, now)? else {
            return Ok(false);
        };
        let order = self.storage.get_order_txn(&txn, &record.order_id)?;
        self.storage.commit(txn)?;

        tracing::info!(code = %record.code, order_id = %record.order_id, "Pickup code expired");
        if let Some(order) = order {
            self.broadcast([self.event(
                &order,
                OrderEventType::CodeExpired,
                Some(&Actor::System),
                Some(record.code),
                now,
            )]);
        }
        Ok(true)
    }

    // ========== Print Dispatch ==========

    /// Record the outcome of handing a redeemed order to the printer
    ///
    /// Status is not touched: a failed submission stays in PRINTING until an
    /// operator marks it printed or refunds it. The attempt itself is
    /// persisted so [`Self::orders_awaiting_print`] never hands it out again.
    pub fn record_print_submission(&self, order_id: &str, result: Result<(), String>) -> OrderResult<()> {
        let now = self.now();
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        order.print_dispatched_at = Some(now);
        order.print_error = result.as_ref().err().cloned();
        self.storage.put_order(&txn, &order)?;
        self.storage.commit(txn)?;

        let event = match result {
            Ok(()) => {
                tracing::info!(order_id = %order_id, "Print job submitted");
                self.event(&order, OrderEventType::PrintSubmitted, Some(&Actor::System), None, now)
            }
            Err(error) => {
                tracing::warn!(order_id = %order_id, error = %error, "Print submission failed");
                self.event(
                    &order,
                    OrderEventType::PrintSubmissionFailed,
                    Some(&Actor::System),
                    Some(error),
                    now,
                )
            }
        };
        self.broadcast([event]);
        Ok(())
    }

    /// Redeemed orders whose print submission was never recorded, oldest first
    ///
    /// Covers events the dispatch worker missed (lag, restart).
    pub fn orders_awaiting_print(&self) -> OrderResult<Vec<PrintOrder>> {
        let collapse = self.settings.collapse_print_step;
        let mut orders: Vec<PrintOrder> = self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|o| o.print_dispatched_at.is_none())
            .filter(|o| match o.status {
                OrderStatus::Printing => true,
                OrderStatus::ReadyPickup => collapse,
                _ => false,
            })
            .collect();
        orders.sort_by_key(|o| (o.print_started_at, o.created_at));
        Ok(orders)
    }

    // ========== Queries ==========

    pub fn get_order(&self, order_id: &str) -> OrderResult<PrintOrder> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    /// Same as [`Self::get_order`] but hides orders owned by someone else
    pub fn get_order_for_user(&self, order_id: &str, user_id: &str) -> OrderResult<PrintOrder> {
        let order = self.get_order(order_id)?;
        if !order.is_owned_by(user_id) {
            return Err(OrderError::OrderNotFound(order_id.to_string()));
        }
        Ok(order)
    }

    pub fn get_order_by_no(&self, order_no: &str) -> OrderResult<PrintOrder> {
        let order_id = self
            .storage
            .find_order_id_by_no(order_no)?
            .ok_or_else(|| OrderError::OrderNotFound(order_no.to_string()))?;
        self.get_order(&order_id)
    }

    /// A user's orders, newest first
    pub fn list_user_orders(&self, user_id: &str, query: &OrderQuery) -> OrderResult<OrderPage> {
        let page = query.page.max(1);
        let page_size = match query.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };

        let mut orders: Vec<PrintOrder> = self
            .storage
            .get_user_orders(user_id)?
            .into_iter()
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.order_no.cmp(&a.order_no)));

        let total = orders.len();
        let items = orders
            .into_iter()
            .skip(((page - 1) * page_size) as usize)
            .take(page_size as usize)
            .collect();
        Ok(OrderPage {
            items,
            total,
            page,
            page_size,
        })
    }

    /// All orders in a status, oldest first
    pub fn orders_by_status(&self, status: OrderStatus) -> OrderResult<Vec<PrintOrder>> {
        let mut orders: Vec<PrintOrder> = self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|o| o.status == status)
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    // ========== Internals ==========

    /// Load an order; user actors only see their own orders
    fn load_for(&self, txn: &WriteTransaction, order_id: &str, actor: &Actor) -> OrderResult<PrintOrder> {
        let order = self
            .storage
            .get_order_txn(txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        if let Actor::User(user_id) = actor
            && !order.is_owned_by(user_id)
        {
            return Err(OrderError::OrderNotFound(order_id.to_string()));
        }
        Ok(order)
    }

    /// Generic single-order transition inside one write transaction
    fn transition<F>(
        &self,
        order_id: &str,
        action: OrderAction,
        actor: &Actor,
        apply: F,
    ) -> OrderResult<(PrintOrder, i64)>
    where
        F: FnOnce(&WriteTransaction, &mut PrintOrder, i64) -> OrderResult<()>,
    {
        let now = self.now();
        let txn = self.storage.begin_write()?;
        let mut order = self.load_for(&txn, order_id, actor)?;

        let from = order.status;
        let to = from
            .next(action)
            .ok_or_else(|| OrderError::invalid_transition(order_id, from, action))?;
        apply(&txn, &mut order, now)?;
        order.enter(to, now);
        self.storage.put_order(&txn, &order)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %to,
            actor = %actor,
            "Order transition"
        );
        Ok((order, now))
    }

    fn event(
        &self,
        order: &PrintOrder,
        event_type: OrderEventType,
        actor: Option<&Actor>,
        detail: Option<String>,
        now: i64,
    ) -> OrderEvent {
        OrderEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            order_id: order.order_id.clone(),
            order_no: order.order_no.clone(),
            event_type,
            status: order.status,
            timestamp: now,
            actor: actor.map(Actor::to_string),
            detail,
        }
    }

    /// Broadcast after commit; no subscribers is not an error
    fn broadcast(&self, events: impl IntoIterator<Item = OrderEvent>) {
        for event in events {
            let _ = self.event_tx.send(event);
        }
    }
}
