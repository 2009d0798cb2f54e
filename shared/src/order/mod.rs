//! Print order domain
//!
//! Types shared between the order engine and its consumers:
//! - Print configuration and create requests
//! - Order record with its status machine
//! - Verification (pickup) codes
//! - Events broadcast after every committed transition

pub mod code;
pub mod event;
pub mod record;
pub mod status;
pub mod types;

// Re-exports
pub use code::{CodeStatus, CodeType, VerificationCode};
pub use event::{OrderEvent, OrderEventType};
pub use record::{Actor, CancelReason, OrderOperations, PrintOrder};
pub use status::{OrderAction, OrderStatus};
pub use types::*;
