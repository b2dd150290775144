//! Money formatting using decimal arithmetic.
//!
//! All menu and cart amounts are [`Decimal`]s in the currency's standard unit
//! (dollars, not cents). Display formatting always uses two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

/// Symbol printed before every amount.
pub const CURRENCY_SYMBOL: &str = "$";

/// Format an amount for display (e.g., `"$10.25"`).
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{CURRENCY_SYMBOL}{rounded:.2}")
}
