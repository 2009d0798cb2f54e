//! Expiration Sweeper - 定时扫描
//!
//! 两个独立的扫描：
//! - 超时未支付的订单 → CANCELLED
//! - 已过期但仍 ACTIVE 的取件码 → EXPIRED
//!
//! 每个实体单独提交；单个失败只记日志并计数，不影响其它实体，也不影响另一个扫描。
//! 真正的状态判断在 [`OrdersManager`] 的事务内重新执行，与用户操作竞争时以先提交者为准。

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::manager::OrdersManager;

#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    pub interval: Duration,
    pub payment_timeout: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            payment_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cancelled_orders: usize,
    pub expired_codes: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn has_activity(&self) -> bool {
        self.cancelled_orders > 0 || self.expired_codes > 0 || self.failures > 0
    }
}

#[derive(Clone)]
pub struct ExpirationSweeper {
    manager: Arc<OrdersManager>,
    config: SweeperConfig,
    shutdown: CancellationToken,
}

impl ExpirationSweeper {
    pub fn new(manager: Arc<OrdersManager>, config: SweeperConfig, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            config,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            payment_timeout_secs = self.config.payment_timeout.as_secs(),
            "ExpirationSweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("ExpirationSweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    // redb 读写是同步的，不占用 runtime 工作线程
                    let sweeper = self.clone();
                    let report = match tokio::task::spawn_blocking(move || sweeper.sweep_once()).await {
                        Ok(report) => report,
                        Err(e) => {
                            tracing::error!(error = %e, "Sweep task failed");
                            continue;
                        }
                    };
                    if report.has_activity() {
                        tracing::info!(
                            cancelled_orders = report.cancelled_orders,
                            expired_codes = report.expired_codes,
                            failures = report.failures,
                            "Sweep completed"
                        );
                    }
                }
            }
        }
    }

    /// One full pass over both candidate sets
    pub fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        self.expire_unpaid_orders(&mut report);
        self.expire_stale_codes(&mut report);
        report
    }

    fn expire_unpaid_orders(&self, report: &mut SweepReport) {
        let candidates = match self.manager.storage().get_pending_payment_orders() {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load unpaid orders");
                report.failures += 1;
                return;
            }
        };

        let now = self.manager.now();
        let timeout_ms = self.config.payment_timeout.as_millis() as i64;
        for (order_id, created_at) in candidates {
            if now.saturating_sub(created_at) < timeout_ms {
                continue;
            }
            match self.manager.expire_unpaid_order(&order_id, self.config.payment_timeout) {
                Ok(true) => report.cancelled_orders += 1,
                Ok(false) => {
                    tracing::debug!(order_id = %order_id, "Order left pending state before sweep");
                }
                Err(e) => {
                    tracing::error!(order_id = %order_id, error = %e, "Failed to cancel unpaid order");
                    report.failures += 1;
                }
            }
        }
    }

    fn expire_stale_codes(&self, report: &mut SweepReport) {
        let codes = match self.manager.storage().get_active_codes() {
            Ok(codes) => codes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load active codes");
                report.failures += 1;
                return;
            }
        };

        let now = self.manager.now();
        for record in codes.into_iter().filter(|c| c.is_past_expiry(now)) {
            match self.manager.expire_code(&record.code) {
                Ok(true) => report.expired_codes += 1,
                Ok(false) => {
                    tracing::debug!(code = %record.code, "Code no longer active");
                }
                Err(e) => {
                    tracing::error!(code = %record.code, error = %e, "Failed to expire code");
                    report.failures += 1;
                }
            }
        }
    }
}
