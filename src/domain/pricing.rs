//! Pricing rules shared by the cart, product and checkout views.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::value_objects::DiscountPercent;

/// Price after an offer, rounded to a whole currency unit (half away from zero).
pub fn discounted_price(price: Decimal, discount: DiscountPercent) -> Decimal {
    if discount.is_zero() {
        return price;
    }
    (price * (Decimal::ONE - discount.fraction()))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit price used for totals: the line's captured final price, then the
/// current catalog price, then the price the line was created with.
///
/// Offer eligibility is never re-derived here.
pub fn effective_unit_price(
    final_price: Option<Decimal>,
    catalog_price: Option<Decimal>,
    line_price: Decimal,
) -> Decimal {
    final_price.or(catalog_price).unwrap_or(line_price)
}

pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}
