//! Print Dispatch Worker - 监听核销事件并投递打印任务
//!
//! 每个 `CODE_REDEEMED` 事件对应一次投递，投递有超时上限。
//! 失败只记录事件（`PRINT_SUBMISSION_FAILED`），不重试，订单保持原状态。
//!
//! 广播通道会丢事件（`Lagged`、重启前未处理的事件），所以启动时和每次
//! `Lagged` 后都会从存储补投尚未记录投递结果的订单。

use shared::order::{OrderEvent, OrderEventType, PrintOrder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::sink::{PrintJob, PrintSink};
use crate::orders::{OrderError, OrderResult, OrdersManager};

pub struct PrintDispatchWorker {
    manager: Arc<OrdersManager>,
    sink: Arc<dyn PrintSink>,
    submit_timeout: Duration,
}

impl PrintDispatchWorker {
    pub fn new(manager: Arc<OrdersManager>, sink: Arc<dyn PrintSink>, submit_timeout: Duration) -> Self {
        Self {
            manager,
            sink,
            submit_timeout,
        }
    }

    /// Run until shutdown or until the event channel closes
    pub async fn run(self, mut event_rx: broadcast::Receiver<OrderEvent>, shutdown: CancellationToken) {
        tracing::info!(sink = self.sink.name(), "PrintDispatchWorker started");
        self.reconcile().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("PrintDispatchWorker received shutdown signal");
                    break;
                }
                received = event_rx.recv() => {
                    match received {
                        Ok(event) if event.event_type == OrderEventType::CodeRedeemed => {
                            self.dispatch(&event).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "PrintDispatchWorker lagged, reconciling from storage");
                            self.reconcile().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Event channel closed, shutting down PrintDispatchWorker");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Submit every redeemed order that has no recorded submission
    ///
    /// Returns the number of orders handed to the sink.
    pub async fn reconcile(&self) -> usize {
        let pending = match self.blocking(|m| m.orders_awaiting_print()).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load orders awaiting print");
                return 0;
            }
        };
        if pending.is_empty() {
            return 0;
        }

        tracing::info!(count = pending.len(), "Dispatching orders missed by the event stream");
        let count = pending.len();
        for order in pending {
            self.submit(order).await;
        }
        count
    }

    /// Submit one redeemed order and record the outcome
    pub async fn dispatch(&self, event: &OrderEvent) {
        let order_id = event.order_id.clone();
        let order = match self.blocking(move |m| m.get_order(&order_id)).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(order_id = %event.order_id, error = %e, "Cannot load redeemed order");
                return;
            }
        };
        // 补投已经处理过
        if order.print_dispatched_at.is_some() {
            tracing::debug!(order_id = %order.order_id, "Print submission already recorded");
            return;
        }
        self.submit(order).await;
    }

    async fn submit(&self, order: PrintOrder) {
        let job = PrintJob::from_order(&order, self.manager.now());
        let outcome = match tokio::time::timeout(self.submit_timeout, self.sink.submit(&job)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "print submission timed out after {}ms",
                self.submit_timeout.as_millis()
            )),
        };

        let order_id = order.order_id;
        let recorded = order_id.clone();
        if let Err(e) = self
            .blocking(move |m| m.record_print_submission(&recorded, outcome))
            .await
        {
            tracing::error!(order_id = %order_id, error = %e, "Failed to record print submission");
        }
    }

    /// redb 读写是同步的，放到 blocking 线程池执行
    async fn blocking<T, F>(&self, f: F) -> OrderResult<T>
    where
        F: FnOnce(&OrdersManager) -> OrderResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let manager = self.manager.clone();
        tokio::task::spawn_blocking(move || f(&manager))
            .await
            .map_err(|e| OrderError::Internal(format!("Task join failed: {e}")))?
    }
}
