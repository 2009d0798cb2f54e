//! 打印订单模块
//!
//! - [`storage`] - redb 持久化（订单、取件码、索引）
//! - [`codes`] - 取件码签发 / 核销 / 过期
//! - [`manager`] - 订单状态机，所有变更的唯一入口
//! - [`sweeper`] - 支付超时与取件码过期扫描
//! - [`statistics`] - 统计

pub mod codes;
pub mod error;
pub mod manager;
pub mod statistics;
pub mod storage;
pub mod sweeper;

pub use codes::{CodeCheck, CodeGenerator, CodeIssuer, RandomCodeGenerator};
pub use error::{OrderError, OrderResult};
pub use manager::{LifecycleSettings, OrderPage, OrderQuery, OrdersManager, PaymentConfirmation};
pub use statistics::{DailyStatistics, StatisticsOverview};
pub use storage::{OrderStorage, StorageError, StorageResult, StorageStats};
pub use sweeper::{ExpirationSweeper, SweepReport, SweeperConfig};
