use super::*;
use chrono::NaiveDate;

#[test]
fn test_get_order_variants() {
    let ctx = create_test_context();
    let order = ctx.manager.create_order(create_test_request("u1", 2, 1)).unwrap();

    assert_eq!(ctx.manager.get_order(&order.order_id).unwrap(), order);
    assert_eq!(ctx.manager.get_order_by_no(&order.order_no).unwrap().order_id, order.order_id);
    assert!(ctx.manager.get_order_for_user(&order.order_id, "u1").is_ok());
    assert!(matches!(
        ctx.manager.get_order_for_user(&order.order_id, "u2"),
        Err(OrderError::OrderNotFound(_))
    ));
    assert!(matches!(
        ctx.manager.get_order("nope"),
        Err(OrderError::OrderNotFound(_))
    ));
    assert!(matches!(
        ctx.manager.get_order_by_no("PRT0"),
        Err(OrderError::OrderNotFound(_))
    ));
}

#[test]
fn test_list_user_orders_newest_first_with_paging() {
    let ctx = create_test_context();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap().order_id);
        ctx.clock.advance(Duration::from_secs(1));
    }
    ctx.manager.create_order(create_test_request("u2", 1, 1)).unwrap();

    let query = OrderQuery {
        status: None,
        page: 1,
        page_size: 2,
    };
    let page = ctx.manager.list_user_orders("u1", &query).unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].order_id, ids[4]);
    assert_eq!(page.items[1].order_id, ids[3]);

    let last = ctx
        .manager
        .list_user_orders("u1", &OrderQuery { page: 3, ..query.clone() })
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].order_id, ids[0]);

    let beyond = ctx
        .manager
        .list_user_orders("u1", &OrderQuery { page: 9, ..query })
        .unwrap();
    assert!(beyond.items.is_empty());
}

#[test]
fn test_list_user_orders_status_filter_and_defaults() {
    let ctx = create_test_context();
    create_paid_order(&ctx, "u1");
    ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap();

    let paid = ctx
        .manager
        .list_user_orders(
            "u1",
            &OrderQuery {
                status: Some(OrderStatus::Paid),
                ..OrderQuery::default()
            },
        )
        .unwrap();
    assert_eq!(paid.total, 1);
    assert_eq!(paid.page, 1);
    assert_eq!(paid.page_size, 10);
    assert_eq!(paid.items[0].status, OrderStatus::Paid);
}

#[test]
fn test_orders_by_status() {
    let ctx = create_test_context();
    create_paid_order(&ctx, "u1");
    create_paid_order(&ctx, "u2");
    ctx.manager.create_order(create_test_request("u3", 1, 1)).unwrap();

    assert_eq!(ctx.manager.orders_by_status(OrderStatus::Paid).unwrap().len(), 2);
    assert_eq!(ctx.manager.orders_by_status(OrderStatus::PendingPayment).unwrap().len(), 1);
    assert!(ctx.manager.orders_by_status(OrderStatus::Refunded).unwrap().is_empty());
}

#[test]
fn test_statistics_overview() {
    let ctx = create_test_context();
    let (order, _) = create_paid_order(&ctx, "u1");
    create_paid_order(&ctx, "u2");
    ctx.manager.create_order(create_test_request("u3", 1, 1)).unwrap();
    ctx.manager.refund(&order.order_id, "test", &Actor::operator("op1")).unwrap();

    let overview = ctx.manager.statistics_overview().unwrap();
    assert_eq!(overview.total_orders, 3);
    assert_eq!(overview.today_orders, 3);
    // 只有未退款的已支付订单计入收入: 2 页 × 0.50
    assert_eq!(overview.total_revenue, rust_decimal::Decimal::new(100, 2));
    assert_eq!(overview.today_revenue, overview.total_revenue);
    assert_eq!(overview.status_counts.get(&OrderStatus::Refunded), Some(&1));
    assert_eq!(overview.active_codes, 1);
}

#[test]
fn test_daily_statistics_validates_range() {
    let ctx = create_test_context();
    let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    assert!(matches!(
        ctx.manager.daily_statistics(start, end),
        Err(OrderError::Validation(_))
    ));

    let far = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    assert!(matches!(
        ctx.manager.daily_statistics(end, far),
        Err(OrderError::Validation(_))
    ));

    let today = shared::util::local_date(ctx.manager.now());
    ctx.manager.create_order(create_test_request("u1", 1, 1)).unwrap();
    let days = ctx.manager.daily_statistics(today, today).unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].total_orders, 1);
}
