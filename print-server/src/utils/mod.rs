//! 工具模块 - 时钟与日志

pub mod clock;
pub mod logger;

pub use clock::{Clock, ManualClock, SystemClock};
