//! Shared types for the print kiosk workspace
//!
//! Domain records, status machines and error codes used by the order engine
//! and by any outer surface (HTTP gateway, kiosk UI bridge, admin console).

pub mod error;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, ErrorCategory, ErrorCode};
