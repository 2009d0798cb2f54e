//! Print Kiosk Server - 自助打印订单引擎
//!
//! # 架构概述
//!
//! - **订单** (`orders`): 状态机、取件码、过期扫描，redb 持久化
//! - **价格** (`pricing`): 单价表 + Decimal 金额计算
//! - **打印** (`printing`): 核销后投递打印任务
//! - **核心** (`core`): 配置、后台任务、服务器状态
//!
//! # 模块结构
//!
//! ```text
//! print-server/src/
//! ├── core/          # 配置、状态、后台任务
//! ├── orders/        # 订单生命周期与取件码
//! ├── pricing/       # 价格表与计算
//! ├── printing/      # 打印投递
//! └── utils/         # 时钟、日志
//! ```

pub mod core;
pub mod orders;
pub mod pricing;
pub mod printing;
pub mod utils;

// Re-export 公共类型
pub use crate::core::{BackgroundTasks, Config, ServerState, TaskKind};
pub use orders::{OrderError, OrderStorage, OrdersManager};
pub use pricing::{PriceBook, PriceKey};
pub use utils::{Clock, ManualClock, SystemClock};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境: dotenv、工作目录、日志
pub fn setup_environment() -> std::io::Result<Config> {
    // .env 不存在时忽略
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    std::fs::create_dir_all(&config.work_dir)?;
    if let Some(dir) = &config.log_dir {
        std::fs::create_dir_all(dir)?;
    }
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
    ____       _       __
   / __ \_____(_)___  / /_
  / /_/ / ___/ / __ \/ __/
 / ____/ /  / / / / / /_
/_/   /_/  /_/_/ /_/\__/   kiosk order engine
"#
    );
}
