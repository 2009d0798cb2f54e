use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::orders::{LifecycleSettings, SweeperConfig};

/// 打印服务配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/print-kiosk | 工作目录 (数据库文件) |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录，设置后按天滚动写文件 |
/// | PAYMENT_TIMEOUT_SECS | 1800 | 未支付订单超时(秒) |
/// | SWEEP_INTERVAL_SECS | 60 | 过期扫描间隔(秒) |
/// | PICKUP_CODE_TTL_SECS | 86400 | 取件码有效期(秒) |
/// | COLLAPSE_PRINT_STEP | false | 核销后直接进入待取件 |
/// | ORDER_NO_PREFIX | PRT | 订单号前缀 |
/// | PRICE_TABLE_PATH | - | 价格表 JSON 文件，未设置使用内置价格 |
/// | SPOOL_DIR | - | 打印任务投递目录，未设置只记日志 |
/// | PRINT_SUBMIT_TIMEOUT_MS | 10000 | 单次打印投递超时(毫秒) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时(毫秒) |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/tmp/kiosk PAYMENT_TIMEOUT_SECS=600 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<String>,

    // === 订单生命周期 ===
    pub payment_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub pickup_code_ttl_secs: u64,
    /// 核销时跳过 PRINTING，直接 READY_PICKUP
    pub collapse_print_step: bool,
    pub order_no_prefix: String,

    // === 外部协作 ===
    pub price_table_path: Option<String>,
    pub spool_dir: Option<String>,
    pub print_submit_timeout_ms: u64,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的变量使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/print-kiosk".into()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
            payment_timeout_secs: env_or("PAYMENT_TIMEOUT_SECS", 1800),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 60),
            pickup_code_ttl_secs: env_or("PICKUP_CODE_TTL_SECS", 86_400),
            collapse_print_step: env_or("COLLAPSE_PRINT_STEP", false),
            order_no_prefix: std::env::var("ORDER_NO_PREFIX").unwrap_or_else(|_| "PRT".into()),
            price_table_path: env_opt("PRICE_TABLE_PATH"),
            spool_dir: env_opt("SPOOL_DIR"),
            print_submit_timeout_ms: env_or("PRINT_SUBMIT_TIMEOUT_MS", 10_000),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
        }
    }

    /// 使用自定义工作目录覆盖配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// 订单数据库路径
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_secs(self.payment_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // 0 会让 tokio interval panic
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn pickup_code_ttl(&self) -> Duration {
        Duration::from_secs(self.pickup_code_ttl_secs)
    }

    pub fn print_submit_timeout(&self) -> Duration {
        Duration::from_millis(self.print_submit_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            pickup_code_ttl: self.pickup_code_ttl(),
            collapse_print_step: self.collapse_print_step,
            order_no_prefix: self.order_no_prefix.clone(),
        }
    }

    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: self.sweep_interval(),
            payment_timeout: self.payment_timeout(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
