//! 价格模块
//!
//! - [`table`] - 单价表 (纸张 × 色彩 × 单双面)
//! - [`calculator`] - 订单金额计算 (Decimal, 两位小数, 四舍五入)

pub mod calculator;
pub mod table;

pub use calculator::{PriceQuote, compute_price, quote, round_money};
pub use table::{PriceBook, PriceEntry, PriceKey, PriceSource};

use rust_decimal::Decimal;
use thiserror::Error;

/// Pricing errors
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("No unit price configured for {0}")]
    MissingEntry(PriceKey),

    #[error("Invalid quantity: pages={pages}, copies={copies}")]
    InvalidQuantity { pages: u32, copies: u32 },

    #[error("Unit price for {key} must be in (0, 1000000], got {price}")]
    InvalidPrice { key: PriceKey, price: Decimal },

    #[error("Duplicate price entry for {0}")]
    DuplicateEntry(PriceKey),

    #[error("Amount for {key} overflows: pages={pages}, copies={copies}")]
    AmountOverflow { key: PriceKey, pages: u32, copies: u32 },

    #[error("Computed amount {0} is not positive")]
    NonPositiveAmount(Decimal),

    #[error("Failed to read price table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse price table: {0}")]
    Parse(#[from] serde_json::Error),
}
