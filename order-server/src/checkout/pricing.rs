//! Checkout pricing using rust_decimal
//!
//! Totals are computed from catalog prices only. Line totals stay exact;
//! only the cart total is rounded (half away from zero), once.

use super::{CheckoutError, CheckoutResult};
use crate::catalog::CatalogReader;
use rust_decimal::prelude::*;
use shared::order::CartLine;

const DECIMAL_PLACES: u32 = 2;

/// Minor units per major unit (cents)
const MINOR_UNIT_FACTOR: i64 = 100;

/// Priced cart ready for a payment session
#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
    pub amount_minor_units: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub food_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Round a monetary amount to 2 dp
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// `round(total × 100)` as an integer
pub fn to_minor_units(total: Decimal) -> CheckoutResult<i64> {
    (total * Decimal::from(MINOR_UNIT_FACTOR))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| CheckoutError::Validation(format!("total {total} is out of range")))
}

/// Price a cart against the catalog
///
/// Any unknown food rejects the whole cart.
pub fn price_cart(catalog: &dyn CatalogReader, lines: &[CartLine]) -> CheckoutResult<PricedCart> {
    let ids: Vec<String> = lines.iter().map(|l| l.food_id.clone()).collect();
    let lookup = catalog.get_prices_by_ids(&ids);
    if !lookup.missing.is_empty() {
        return Err(CheckoutError::UnknownFood(lookup.missing));
    }

    let mut priced = Vec::with_capacity(lines.len());
    let mut total = Decimal::ZERO;
    for line in lines {
        let unit_price = lookup
            .price_of(&line.food_id)
            .ok_or_else(|| CheckoutError::UnknownFood(vec![line.food_id.clone()]))?;
        let line_total = unit_price * Decimal::from(line.quantity);
        total += line_total;
        priced.push(PricedLine {
            food_id: line.food_id.clone(),
            quantity: line.quantity,
            unit_price,
            line_total,
        });
    }

    let amount_minor_units = to_minor_units(total)?;
    Ok(PricedCart {
        lines: priced,
        total: round_money(total),
        amount_minor_units,
    })
}
