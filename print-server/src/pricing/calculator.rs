//! Order amount calculation
//!
//! `amount = unit_price × page_count × copies`, computed in `Decimal` and
//! rounded to 2 places half-up.

use rust_decimal::prelude::*;
use serde::Serialize;
use shared::order::{ColorMode, Duplex, PaperSize, PrintConfig};

use super::PricingError;
use super::table::{PriceKey, PriceSource};

/// Monetary precision (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Round a monetary value to 2 decimal places, half-up
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Priced result, both values stored on the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Compute the order amount
///
/// Fails with [`PricingError::MissingEntry`] when the table has no price for
/// the combination; never falls back to a default.
pub fn compute_price(
    prices: &dyn PriceSource,
    page_count: u32,
    copies: u32,
    color_mode: ColorMode,
    duplex: Duplex,
    paper_size: PaperSize,
) -> Result<PriceQuote, PricingError> {
    if page_count == 0 || copies == 0 {
        return Err(PricingError::InvalidQuantity {
            pages: page_count,
            copies,
        });
    }

    let key = PriceKey::new(paper_size, color_mode, duplex);
    let unit_price = prices
        .unit_price(&key)
        .ok_or(PricingError::MissingEntry(key))?;
    if unit_price <= Decimal::ZERO {
        return Err(PricingError::InvalidPrice {
            key,
            price: unit_price,
        });
    }

    let amount = unit_price
        .checked_mul(Decimal::from(page_count))
        .and_then(|v| v.checked_mul(Decimal::from(copies)))
        .map(round_money)
        .ok_or(PricingError::AmountOverflow {
            key,
            pages: page_count,
            copies,
        })?;
    if amount <= Decimal::ZERO {
        return Err(PricingError::NonPositiveAmount(amount));
    }

    Ok(PriceQuote { unit_price, amount })
}

/// [`compute_price`] for a full print configuration
pub fn quote(
    prices: &dyn PriceSource,
    config: &PrintConfig,
    page_count: u32,
) -> Result<PriceQuote, PricingError> {
    compute_price(
        prices,
        page_count,
        config.copies,
        config.color_mode,
        config.duplex,
        config.paper_size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceBook;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_bw_single_a4() {
        let book = PriceBook::with_defaults();
        let quote = compute_price(&book, 10, 2, ColorMode::Bw, Duplex::Single, PaperSize::A4).unwrap();
        assert_eq!(quote.unit_price, dec("0.50"));
        assert_eq!(quote.amount, dec("10.00"));
    }

    #[test]
    fn test_color_double_a3() {
        let book = PriceBook::with_defaults();
        let quote = compute_price(&book, 3, 1, ColorMode::Color, Duplex::Double, PaperSize::A3).unwrap();
        assert_eq!(quote.amount, dec("7.20"));
    }

    #[test]
    fn test_missing_entry_fails_loudly() {
        let book = PriceBook::with_defaults();
        let result = compute_price(&book, 1, 1, ColorMode::Bw, Duplex::Single, PaperSize::Letter);
        assert!(matches!(result, Err(PricingError::MissingEntry(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let book = PriceBook::with_defaults();
        let result = compute_price(&book, 0, 1, ColorMode::Bw, Duplex::Single, PaperSize::A4);
        assert!(matches!(result, Err(PricingError::InvalidQuantity { .. })));
        let result = compute_price(&book, 1, 0, ColorMode::Bw, Duplex::Single, PaperSize::A4);
        assert!(matches!(result, Err(PricingError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_half_up_rounding() {
        let book = PriceBook::with_defaults();
        let key = PriceKey::new(PaperSize::A4, ColorMode::Bw, Duplex::Single);
        book.set_price(key, dec("0.125")).unwrap();

        // 0.125 × 1 × 1 = 0.125 → 0.13
        let quote = compute_price(&book, 1, 1, ColorMode::Bw, Duplex::Single, PaperSize::A4).unwrap();
        assert_eq!(quote.amount, dec("0.13"));

        // 0.125 × 3 = 0.375 → 0.38
        let quote = compute_price(&book, 3, 1, ColorMode::Bw, Duplex::Single, PaperSize::A4).unwrap();
        assert_eq!(quote.amount, dec("0.38"));
    }

    #[test]
    fn test_no_float_drift_on_large_orders() {
        let book = PriceBook::with_defaults();
        let key = PriceKey::new(PaperSize::A4, ColorMode::Bw, Duplex::Single);
        book.set_price(key, dec("0.10")).unwrap();
        let quote = compute_price(&book, 333, 3, ColorMode::Bw, Duplex::Single, PaperSize::A4).unwrap();
        assert_eq!(quote.amount, dec("99.90"));
    }

    #[test]
    fn test_rounding_to_zero_rejected() {
        let book = PriceBook::with_defaults();
        let key = PriceKey::new(PaperSize::A4, ColorMode::Bw, Duplex::Single);
        book.set_price(key, dec("0.001")).unwrap();
        let result = compute_price(&book, 1, 1, ColorMode::Bw, Duplex::Single, PaperSize::A4);
        assert!(matches!(result, Err(PricingError::NonPositiveAmount(_))));
    }

    #[test]
    fn test_quote_uses_print_config() {
        let book = PriceBook::with_defaults();
        let config = PrintConfig {
            copies: 2,
            color_mode: ColorMode::Color,
            duplex: Duplex::Single,
            paper_size: PaperSize::A4,
        };
        let result = quote(&book, &config, 5).unwrap();
        assert_eq!(result.amount, dec("15.00"));
    }

    /// Unit price beyond the table bound, e.g. from a custom [`PriceSource`]
    struct FixedPrice(Decimal);

    impl PriceSource for FixedPrice {
        fn unit_price(&self, _key: &PriceKey) -> Option<Decimal> {
            Some(self.0)
        }
    }

    #[test]
    fn test_overflow_is_an_error() {
        let prices = FixedPrice(dec("5000000000"));
        let result = compute_price(
            &prices,
            u32::MAX,
            u32::MAX,
            ColorMode::Color,
            Duplex::Single,
            PaperSize::A3,
        );
        assert!(matches!(
            result,
            Err(PricingError::AmountOverflow { pages: u32::MAX, copies: u32::MAX, .. })
        ));
    }

    #[test]
    fn test_largest_quantities_at_max_price_fit() {
        let book = PriceBook::with_defaults();
        let key = PriceKey::new(PaperSize::A4, ColorMode::Bw, Duplex::Single);
        book.set_price(key, crate::pricing::table::MAX_UNIT_PRICE).unwrap();
        let quote = compute_price(&book, u32::MAX, u32::MAX, ColorMode::Bw, Duplex::Single, PaperSize::A4).unwrap();
        assert!(quote.amount > Decimal::ZERO);
    }
}
