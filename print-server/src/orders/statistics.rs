//! Order statistics (daily breakdown + overview)

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::order::{OrderStatus, PrintOrder};
use std::collections::BTreeMap;

use super::error::{OrderError, OrderResult};
use super::manager::OrdersManager;

/// Longest range accepted by [`OrdersManager::daily_statistics`]
const MAX_RANGE_DAYS: i64 = 366;

/// Statuses whose amount counts as revenue
fn is_revenue(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Paid | OrderStatus::Printing | OrderStatus::ReadyPickup | OrderStatus::Completed
    )
}

/// Per-day counts, by order creation date (local time)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatistics {
    pub date: NaiveDate,
    pub total_orders: u64,
    pub status_counts: BTreeMap<OrderStatus, u64>,
    pub total_pages: u64,
    /// Paid and not refunded
    pub revenue: Decimal,
    pub refunded_amount: Decimal,
}

impl DailyStatistics {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_orders: 0,
            status_counts: BTreeMap::new(),
            total_pages: 0,
            revenue: Decimal::ZERO,
            refunded_amount: Decimal::ZERO,
        }
    }

    fn add(&mut self, order: &PrintOrder) {
        self.total_orders += 1;
        *self.status_counts.entry(order.status).or_default() += 1;
        self.total_pages += u64::from(order.page_count) * u64::from(order.print_config.copies);
        if is_revenue(order.status) {
            self.revenue += order.amount;
        }
        if order.status == OrderStatus::Refunded {
            self.refunded_amount += order.amount;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsOverview {
    pub total_orders: u64,
    pub today_orders: u64,
    pub total_revenue: Decimal,
    pub today_revenue: Decimal,
    pub status_counts: BTreeMap<OrderStatus, u64>,
    pub active_codes: u64,
}

/// One entry per day in `[start, end]`, days without orders included
pub fn daily_breakdown(orders: &[PrintOrder], start: NaiveDate, end: NaiveDate) -> Vec<DailyStatistics> {
    let mut days: BTreeMap<NaiveDate, DailyStatistics> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| (d, DailyStatistics::empty(d)))
        .collect();

    for order in orders {
        let date = shared::util::local_date(order.created_at);
        if let Some(day) = days.get_mut(&date) {
            day.add(order);
        }
    }
    days.into_values().collect()
}

impl OrdersManager {
    /// Daily statistics for an inclusive date range
    pub fn daily_statistics(&self, start: NaiveDate, end: NaiveDate) -> OrderResult<Vec<DailyStatistics>> {
        if start > end {
            return Err(OrderError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        if (end - start).num_days() >= MAX_RANGE_DAYS {
            return Err(OrderError::Validation(format!(
                "date range exceeds {MAX_RANGE_DAYS} days"
            )));
        }
        let orders = self.storage().get_all_orders()?;
        Ok(daily_breakdown(&orders, start, end))
    }

    pub fn statistics_overview(&self) -> OrderResult<StatisticsOverview> {
        let orders = self.storage().get_all_orders()?;
        let stats = self.storage().get_stats()?;
        let today = shared::util::local_date(self.now());

        let mut overview = StatisticsOverview {
            total_orders: 0,
            today_orders: 0,
            total_revenue: Decimal::ZERO,
            today_revenue: Decimal::ZERO,
            status_counts: BTreeMap::new(),
            active_codes: stats.active_code_count,
        };
        for order in &orders {
            let is_today = shared::util::local_date(order.created_at) == today;
            overview.total_orders += 1;
            *overview.status_counts.entry(order.status).or_default() += 1;
            if is_today {
                overview.today_orders += 1;
            }
            if is_revenue(order.status) {
                overview.total_revenue += order.amount;
                if is_today {
                    overview.today_revenue += order.amount;
                }
            }
        }
        Ok(overview)
    }
}
