//! 打印投递
//!
//! 核销后的订单交给 [`PrintSink`]；投递结果只产生事件，不改变订单状态。

pub mod sink;
pub mod worker;

pub use sink::{LogPrintSink, PrintError, PrintJob, PrintSink, SpoolDirSink};
pub use worker::PrintDispatchWorker;
