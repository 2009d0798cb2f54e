use super::*;

#[test]
fn test_create_order_prices_on_server() {
    let ctx = create_test_context();
    let order = ctx
        .manager
        .create_order(create_test_request("u1", 10, 2))
        .unwrap();

    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.unit_price, rust_decimal::Decimal::new(50, 2));
    assert_eq!(order.amount, rust_decimal::Decimal::new(1000, 2));
    assert!(order.order_no.starts_with("PRT"));
    assert_eq!(order.order_no.len(), "PRT".len() + 8 + 6);
    assert!(order.order_no.ends_with("000001"));
}

#[test]
fn test_order_numbers_are_sequential() {
    let ctx = create_test_context();
    let first = ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap();
    let second = ctx.manager.create_order(create_test_request("u2", 1, 1)).unwrap();
    assert!(first.order_no.ends_with("000001"));
    assert!(second.order_no.ends_with("000002"));
    assert_ne!(first.order_id, second.order_id);
}

#[test]
fn test_order_numbers_survive_clock_stepping_back_a_day() {
    let ctx = create_test_context();
    let first = ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap();

    ctx.clock.set(START + 24 * 60 * 60 * 1000);
    let next_day = ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap();

    // NTP 回拨到前一天
    ctx.clock.set(START + 1000);
    let stepped_back = ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap();

    assert_ne!(first.order_no, next_day.order_no);
    assert_ne!(first.order_no, stepped_back.order_no);
    assert!(stepped_back.order_no.ends_with("000002"));
    assert_eq!(
        ctx.manager.get_order_by_no(&first.order_no).unwrap().order_id,
        first.order_id
    );
    assert_eq!(
        ctx.manager.get_order_by_no(&stepped_back.order_no).unwrap().order_id,
        stepped_back.order_id
    );
}

#[test]
fn test_create_order_rejects_invalid_input() {
    let ctx = create_test_context();
    let result = ctx.manager.create_order(create_test_request("u1", 0, 1));
    assert!(matches!(result, Err(OrderError::Validation(_))));

    let result = ctx.manager.create_order(create_test_request("", 1, 1));
    assert!(matches!(result, Err(OrderError::Validation(_))));
}

#[test]
fn test_create_order_missing_price_fails() {
    let ctx = create_test_context();
    let mut request = create_test_request("u1", 1, 1);
    request.print_config.paper_size = PaperSize::Letter;
    let result = ctx.manager.create_order(request);
    assert!(matches!(result, Err(OrderError::PricingUnavailable(_))));
    assert!(ctx.manager.storage().get_all_orders().unwrap().is_empty());
}

#[test]
fn test_price_change_does_not_touch_existing_orders() {
    let ctx = create_test_context();
    let order = ctx.manager.create_order(create_test_request("u1", 4, 1)).unwrap();

    let key = crate::pricing::PriceKey::new(PaperSize::A4, ColorMode::Bw, Duplex::Single);
    ctx.prices.set_price(key, rust_decimal::Decimal::new(90, 2)).unwrap();

    let stored = ctx.manager.get_order(&order.order_id).unwrap();
    assert_eq!(stored.amount, rust_decimal::Decimal::new(200, 2));
    let newer = ctx.manager.create_order(create_test_request("u1", 4, 1)).unwrap();
    assert_eq!(newer.amount, rust_decimal::Decimal::new(360, 2));
}

#[test]
fn test_create_legacy_order() {
    let ctx = create_test_context();
    let legacy = LegacyOrderRequest {
        user_id: "u1".to_string(),
        file_id: Some("file-9".to_string()),
        copies: None,
        actual_pages: Some(3),
        is_color: Some(true),
        is_double_side: Some(false),
        paper_size: None,
        remark: None,
    };
    let order = ctx.manager.create_legacy_order(legacy).unwrap();
    assert_eq!(order.print_config.color_mode, ColorMode::Color);
    assert_eq!(order.print_config.copies, 1);
    assert_eq!(order.amount, rust_decimal::Decimal::new(450, 2));
}

#[test]
fn test_full_happy_path() {
    let ctx = create_test_context();
    let mut rx = ctx.manager.subscribe();
    let (order, code) = create_paid_order(&ctx, "u1");
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.paid_at.is_some());
    assert_eq!(code.status, CodeStatus::Active);
    assert_eq!(code.expires_at, code.issued_at + 15 * 60 * 1000);

    let operator = Actor::operator("op1");
    ctx.clock.advance(Duration::from_secs(60));
    let printing = ctx.manager.redeem_code(&code.code, &operator).unwrap();
    assert_eq!(printing.status, OrderStatus::Printing);

    let ready = ctx.manager.mark_printed(&order.order_id, &operator).unwrap();
    assert_eq!(ready.status, OrderStatus::ReadyPickup);
    assert!(ready.printed_at.is_some());

    let done = ctx.manager.mark_picked_up(&order.order_id, &Actor::user("u1")).unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.status.is_terminal());

    assert_eq!(
        drain_events(&mut rx),
        vec![
            OrderEventType::OrderCreated,
            OrderEventType::OrderPaid,
            OrderEventType::CodeIssued,
            OrderEventType::CodeRedeemed,
            OrderEventType::OrderPrinted,
            OrderEventType::OrderCompleted,
        ]
    );
}

#[test]
fn test_collapsed_print_step() {
    let settings = LifecycleSettings {
        collapse_print_step: true,
        ..LifecycleSettings::default()
    };
    let ctx = create_test_context_with(settings, &[]);
    let (order, code) = create_paid_order(&ctx, "u1");

    let ready = ctx.manager.redeem_code(&code.code, &Actor::operator("op1")).unwrap();
    assert_eq!(ready.status, OrderStatus::ReadyPickup);
    assert!(ready.print_started_at.is_some());

    let result = ctx.manager.mark_printed(&order.order_id, &Actor::operator("op1"));
    assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
}

#[test]
fn test_payment_replay_is_idempotent() {
    let ctx = create_test_context();
    let mut rx = ctx.manager.subscribe();
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();

    let first = ctx.manager.confirm_payment(&order.order_id, "pay-1").unwrap();
    let second = ctx.manager.confirm_payment(&order.order_id, "pay-1").unwrap();
    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.order.status, OrderStatus::Paid);
    assert_eq!(
        first.pickup_code.unwrap().code,
        second.pickup_code.unwrap().code
    );
    assert_eq!(ctx.manager.storage().get_active_codes().unwrap().len(), 1);

    let events = drain_events(&mut rx);
    assert_eq!(events.iter().filter(|e| **e == OrderEventType::OrderPaid).count(), 1);
}

#[test]
fn test_payment_with_different_ref_on_paid_order_rejected() {
    let ctx = create_test_context();
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    ctx.manager.confirm_payment(&order.order_id, "pay-1").unwrap();

    let result = ctx.manager.confirm_payment(&order.order_id, "pay-2");
    assert!(matches!(
        result,
        Err(OrderError::InvalidTransition { from: OrderStatus::Paid, .. })
    ));
}

#[test]
fn test_payment_ref_bound_to_other_order_rejected() {
    let ctx = create_test_context();
    let a = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    let b = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    ctx.manager.confirm_payment(&a.order_id, "pay-1").unwrap();

    let result = ctx.manager.confirm_payment(&b.order_id, "pay-1");
    assert!(matches!(result, Err(OrderError::PaymentRefConflict { .. })));
    assert_eq!(
        ctx.manager.get_order(&b.order_id).unwrap().status,
        OrderStatus::PendingPayment
    );
}

#[test]
fn test_payment_on_cancelled_order_rejected() {
    let ctx = create_test_context();
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    ctx.manager.cancel_order(&order.order_id, &Actor::user("u1")).unwrap();

    let result = ctx.manager.confirm_payment(&order.order_id, "pay-1");
    assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
    assert!(ctx.manager.storage().get_active_codes().unwrap().is_empty());
}

#[test]
fn test_payment_for_unknown_order() {
    let ctx = create_test_context();
    let result = ctx.manager.confirm_payment("missing", "pay-1");
    assert!(matches!(result, Err(OrderError::OrderNotFound(_))));
    let result = ctx.manager.confirm_payment("missing", " ");
    assert!(matches!(result, Err(OrderError::Validation(_))));
}

#[test]
fn test_cancel_records_reason_and_actor() {
    let ctx = create_test_context();
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    let cancelled = ctx.manager.cancel_order(&order.order_id, &Actor::user("u1")).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason, Some(CancelReason::UserRequested));
    assert_eq!(cancelled.cancelled_by.as_deref(), Some("user:u1"));

    let again = ctx.manager.cancel_order(&order.order_id, &Actor::user("u1"));
    assert!(matches!(again, Err(OrderError::InvalidTransition { .. })));
}

#[test]
fn test_user_cannot_cancel_foreign_order() {
    let ctx = create_test_context();
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    let result = ctx.manager.cancel_order(&order.order_id, &Actor::user("u2"));
    assert!(matches!(result, Err(OrderError::OrderNotFound(_))));

    let cancelled = ctx.manager.cancel_order(&order.order_id, &Actor::operator("op1")).unwrap();
    assert_eq!(cancelled.cancel_reason, Some(CancelReason::Operator));
}

#[test]
fn test_cancel_paid_order_rejected() {
    let ctx = create_test_context();
    let (order, _) = create_paid_order(&ctx, "u1");
    let result = ctx.manager.cancel_order(&order.order_id, &Actor::user("u1"));
    assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
}

#[test]
fn test_refund_paid_order_expires_code() {
    let ctx = create_test_context();
    let mut rx = ctx.manager.subscribe();
    let (order, code) = create_paid_order(&ctx, "u1");
    drain_events(&mut rx);

    let refunded = ctx
        .manager
        .refund(&order.order_id, "printer jam", &Actor::operator("op1"))
        .unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.refund_reason.as_deref(), Some("printer jam"));
    assert!(refunded.refunded_at.is_some());

    let latest = ctx.manager.storage().get_latest_code(&code.code).unwrap().unwrap();
    assert_eq!(latest.status, CodeStatus::Expired);
    let redeem = ctx.manager.redeem_code(&code.code, &Actor::operator("op1"));
    assert!(matches!(redeem, Err(OrderError::CodeExpired(_))));

    assert_eq!(
        drain_events(&mut rx),
        vec![OrderEventType::OrderRefunded, OrderEventType::CodeExpired]
    );
}

#[test]
fn test_refund_during_printing_and_ready() {
    let ctx = create_test_context();
    let operator = Actor::operator("op1");

    let (printing, code) = create_paid_order(&ctx, "u1");
    ctx.manager.redeem_code(&code.code, &operator).unwrap();
    let refunded = ctx.manager.refund(&printing.order_id, "", &operator).unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.refund_reason, None);

    let (ready, code) = create_paid_order(&ctx, "u2");
    ctx.manager.redeem_code(&code.code, &operator).unwrap();
    ctx.manager.mark_printed(&ready.order_id, &operator).unwrap();
    let refunded = ctx.manager.refund(&ready.order_id, "quality", &operator).unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
}

#[test]
fn test_terminal_states_reject_everything() {
    let ctx = create_test_context();
    let operator = Actor::operator("op1");
    let (order, code) = create_paid_order(&ctx, "u1");
    ctx.manager.redeem_code(&code.code, &operator).unwrap();
    ctx.manager.mark_printed(&order.order_id, &operator).unwrap();
    ctx.manager.mark_picked_up(&order.order_id, &operator).unwrap();

    let id = order.order_id.as_str();
    assert!(matches!(
        ctx.manager.refund(id, "late", &operator),
        Err(OrderError::InvalidTransition { from: OrderStatus::Completed, .. })
    ));
    assert!(matches!(
        ctx.manager.cancel_order(id, &operator),
        Err(OrderError::InvalidTransition { .. })
    ));
    assert!(matches!(
        ctx.manager.mark_printed(id, &operator),
        Err(OrderError::InvalidTransition { .. })
    ));
    assert!(matches!(
        ctx.manager.confirm_payment(id, "pay-other"),
        Err(OrderError::InvalidTransition { .. })
    ));
}

#[test]
fn test_mark_picked_up_requires_ready() {
    let ctx = create_test_context();
    let (order, _) = create_paid_order(&ctx, "u1");
    let result = ctx.manager.mark_picked_up(&order.order_id, &Actor::user("u1"));
    assert!(matches!(
        result,
        Err(OrderError::InvalidTransition { from: OrderStatus::Paid, action: OrderAction::MarkPickedUp, .. })
    ));
}

#[test]
fn test_expire_unpaid_order_rechecks_state() {
    let ctx = create_test_context();
    let timeout = Duration::from_secs(30 * 60);
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();

    assert!(!ctx.manager.expire_unpaid_order(&order.order_id, timeout).unwrap());

    ctx.clock.advance(timeout);
    ctx.manager.confirm_payment(&order.order_id, "pay-1").unwrap();
    // 支付先于扫描提交
    assert!(!ctx.manager.expire_unpaid_order(&order.order_id, timeout).unwrap());
    assert_eq!(ctx.manager.get_order(&order.order_id).unwrap().status, OrderStatus::Paid);

    let other = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();
    ctx.clock.advance(timeout);
    assert!(ctx.manager.expire_unpaid_order(&other.order_id, timeout).unwrap());
    let cancelled = ctx.manager.get_order(&other.order_id).unwrap();
    assert_eq!(cancelled.cancel_reason, Some(CancelReason::PaymentTimeout));

    assert!(!ctx.manager.expire_unpaid_order("missing", timeout).unwrap());
}

#[test]
fn test_print_submission_events_do_not_change_status() {
    let ctx = create_test_context();
    let (order, code) = create_paid_order(&ctx, "u1");
    ctx.manager.redeem_code(&code.code, &Actor::operator("op1")).unwrap();

    let mut rx = ctx.manager.subscribe();
    ctx.manager
        .record_print_submission(&order.order_id, Err("printer offline".to_string()))
        .unwrap();
    let event = rx.try_recv().unwrap();
    assert_eq!(event.event_type, OrderEventType::PrintSubmissionFailed);
    assert_eq!(event.detail.as_deref(), Some("printer offline"));
    let stored = ctx.manager.get_order(&order.order_id).unwrap();
    assert_eq!(stored.status, OrderStatus::Printing);
    assert_eq!(stored.print_dispatched_at, Some(START));
    assert_eq!(stored.print_error.as_deref(), Some("printer offline"));
}

#[test]
fn test_orders_awaiting_print_skips_recorded_submissions() {
    let ctx = create_test_context();
    let (first, first_code) = create_paid_order(&ctx, "u1");
    let (second, second_code) = create_paid_order(&ctx, "u2");
    let (unredeemed, _) = create_paid_order(&ctx, "u3");
    ctx.manager.redeem_code(&first_code.code, &Actor::operator("op1")).unwrap();
    ctx.clock.advance(Duration::from_secs(1));
    ctx.manager.redeem_code(&second_code.code, &Actor::operator("op1")).unwrap();

    let pending: Vec<String> = ctx
        .manager
        .orders_awaiting_print()
        .unwrap()
        .into_iter()
        .map(|o| o.order_id)
        .collect();
    assert_eq!(pending, vec![first.order_id.clone(), second.order_id.clone()]);
    assert!(!pending.contains(&unredeemed.order_id));

    ctx.manager.record_print_submission(&first.order_id, Ok(())).unwrap();
    let pending = ctx.manager.orders_awaiting_print().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].order_id, second.order_id);
}
