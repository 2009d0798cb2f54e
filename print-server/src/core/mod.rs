//! 核心模块 - 配置、后台任务与服务器状态

pub mod config;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use state::{ServerState, StateError};
pub use tasks::{BackgroundTasks, TaskKind};
