//! Unit price table
//!
//! Keyed by `(paper size, color mode, duplex)`. A missing key is a
//! configuration error, never an implicit zero.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::{ColorMode, Duplex, PaperSize, PrintConfig};

use super::PricingError;

/// Price lookup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceKey {
    pub paper_size: PaperSize,
    pub color_mode: ColorMode,
    pub duplex: Duplex,
}

impl PriceKey {
    pub fn new(paper_size: PaperSize, color_mode: ColorMode, duplex: Duplex) -> Self {
        Self {
            paper_size,
            color_mode,
            duplex,
        }
    }

    pub fn for_config(config: &PrintConfig) -> Self {
        Self::new(config.paper_size, config.color_mode, config.duplex)
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.paper_size.as_str(),
            self.color_mode.as_str(),
            self.duplex.as_str()
        )
    }
}

/// One row of the price table file
///
/// ```json
/// [{ "paperSize": "A4", "colorMode": "BW", "duplex": "SINGLE", "unitPrice": "0.50" }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub paper_size: PaperSize,
    pub color_mode: ColorMode,
    pub duplex: Duplex,
    pub unit_price: Decimal,
}

impl PriceEntry {
    pub fn key(&self) -> PriceKey {
        PriceKey::new(self.paper_size, self.color_mode, self.duplex)
    }
}

/// Read-only price lookup used by order creation
pub trait PriceSource: Send + Sync {
    fn unit_price(&self, key: &PriceKey) -> Option<Decimal>;
}

/// In-memory price table, adjustable at runtime
#[derive(Debug, Default)]
pub struct PriceBook {
    prices: RwLock<BTreeMap<PriceKey, Decimal>>,
}

/// Upper bound for a per-page price; keeps `price × u32 × u32` inside Decimal range
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

fn check_price(key: PriceKey, price: Decimal) -> Result<(), PricingError> {
    if price <= Decimal::ZERO || price > MAX_UNIT_PRICE {
        return Err(PricingError::InvalidPrice { key, price });
    }
    Ok(())
}

impl PriceBook {
    /// Build from entries; duplicates and non-positive prices are rejected
    pub fn new(entries: impl IntoIterator<Item = PriceEntry>) -> Result<Self, PricingError> {
        let mut prices = BTreeMap::new();
        for entry in entries {
            let key = entry.key();
            check_price(key, entry.unit_price)?;
            if prices.insert(key, entry.unit_price).is_some() {
                return Err(PricingError::DuplicateEntry(key));
            }
        }
        Ok(Self {
            prices: RwLock::new(prices),
        })
    }

    /// 内置价格 (A3/A4 × 黑白/彩色 × 单/双面)
    pub fn with_defaults() -> Self {
        use ColorMode::*;
        use Duplex::*;
        use PaperSize::*;

        let defaults = [
            (A4, Bw, Single, Decimal::new(50, 2)),
            (A4, Bw, Double, Decimal::new(40, 2)),
            (A3, Bw, Single, Decimal::new(100, 2)),
            (A3, Bw, Double, Decimal::new(80, 2)),
            (A4, Color, Single, Decimal::new(150, 2)),
            (A4, Color, Double, Decimal::new(120, 2)),
            (A3, Color, Single, Decimal::new(300, 2)),
            (A3, Color, Double, Decimal::new(240, 2)),
        ];
        let prices = defaults
            .into_iter()
            .map(|(paper, color, duplex, price)| (PriceKey::new(paper, color, duplex), price))
            .collect();
        Self {
            prices: RwLock::new(prices),
        }
    }

    /// Load a JSON price table file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PricingError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let entries: Vec<PriceEntry> = serde_json::from_str(&content)?;
        Self::new(entries)
    }

    /// Set or replace a unit price
    pub fn set_price(&self, key: PriceKey, price: Decimal) -> Result<Option<Decimal>, PricingError> {
        check_price(key, price)?;
        let previous = self.prices.write().insert(key, price);
        tracing::info!(key = %key, price = %price, previous = ?previous, "Unit price updated");
        Ok(previous)
    }

    /// Remove a unit price; orders for that key fail until it is set again
    pub fn remove_price(&self, key: &PriceKey) -> Option<Decimal> {
        let removed = self.prices.write().remove(key);
        if removed.is_some() {
            tracing::info!(key = %key, "Unit price removed");
        }
        removed
    }

    pub fn entries(&self) -> Vec<PriceEntry> {
        self.prices
            .read()
            .iter()
            .map(|(key, price)| PriceEntry {
                paper_size: key.paper_size,
                color_mode: key.color_mode,
                duplex: key.duplex,
                unit_price: *price,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.prices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.read().is_empty()
    }
}

impl PriceSource for PriceBook {
    fn unit_price(&self, key: &PriceKey) -> Option<Decimal> {
        self.prices.read().get(key).copied()
    }
}
