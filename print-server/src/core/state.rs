//! 服务器状态 - 组装存储、价格表与订单管理器

use std::sync::Arc;
use thiserror::Error;

use super::config::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::orders::{ExpirationSweeper, OrderStorage, OrdersManager, StorageError};
use crate::pricing::{PriceBook, PricingError};
use crate::printing::{LogPrintSink, PrintDispatchWorker, PrintSink, SpoolDirSink};
use crate::utils::SystemClock;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to prepare work directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open order storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to load price table: {0}")]
    Pricing(#[from] PricingError),
}

/// Shared server state
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub prices: Arc<PriceBook>,
    pub orders: Arc<OrdersManager>,
}

impl ServerState {
    /// Open storage, load prices, build the manager
    pub fn initialize(config: &Config) -> Result<Self, StateError> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.db_path();
        let storage = OrderStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Order storage opened");

        let prices = match &config.price_table_path {
            Some(path) => {
                let book = PriceBook::load(path)?;
                tracing::info!(path = %path, entries = book.len(), "Price table loaded");
                book
            }
            None => {
                let book = PriceBook::with_defaults();
                tracing::info!(entries = book.len(), "Using built-in price table");
                book
            }
        };
        let prices = Arc::new(prices);

        let orders = Arc::new(OrdersManager::new(
            storage,
            prices.clone(),
            Arc::new(SystemClock),
            config.lifecycle_settings(),
        ));

        Ok(Self {
            config: config.clone(),
            prices,
            orders,
        })
    }

    /// Sink selected by configuration
    fn print_sink(&self) -> Arc<dyn PrintSink> {
        match &self.config.spool_dir {
            Some(dir) => Arc::new(SpoolDirSink::new(dir)),
            None => Arc::new(LogPrintSink),
        }
    }

    /// Start the expiration sweeper and the print dispatch worker
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let sweeper = ExpirationSweeper::new(
            self.orders.clone(),
            self.config.sweeper_config(),
            tasks.shutdown_token(),
        );
        tasks.spawn("expiration_sweeper", TaskKind::Periodic, sweeper.run());

        let sink = self.print_sink();
        tracing::info!(sink = sink.name(), "Print sink selected");
        let worker = PrintDispatchWorker::new(
            self.orders.clone(),
            sink,
            self.config.print_submit_timeout(),
        );
        let event_rx = self.orders.subscribe();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("print_dispatch", TaskKind::Worker, worker.run(event_rx, shutdown));

        tasks.log_summary();
        tasks
    }
}
