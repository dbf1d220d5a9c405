use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::domain::{Product, Unit};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("Unsupported conversion {from} -> {to}")]
    UnsupportedConversion { from: Unit, to: Unit },
    #[error("Total is out of range")]
    Overflow,
}

/// Converts `qty` expressed in `from` into `base`. Only mass (g/kg) and volume
/// (ml/ltr) pairs convert; pieces only match themselves.
pub fn to_base_quantity(qty: Decimal, from: Unit, base: Unit) -> Result<Decimal, PricingError> {
    let thousand = Decimal::from(1000);
    match (from, base) {
        (from, base) if from == base => Ok(qty),
        (Unit::G, Unit::Kg) | (Unit::Ml, Unit::Ltr) => {
            qty.checked_div(thousand).ok_or(PricingError::Overflow)
        }
        (Unit::Kg, Unit::G) | (Unit::Ltr, Unit::Ml) => {
            qty.checked_mul(thousand).ok_or(PricingError::Overflow)
        }
        (from, to) => Err(PricingError::UnsupportedConversion { from, to }),
    }
}

/// Total for `qty` of `unit`, rounded half away from zero to two places.
pub fn price_for(product: &Product, qty: Decimal, unit: Unit) -> Result<Decimal, PricingError> {
    if qty <= Decimal::ZERO {
        return Ok(Decimal::new(0, 2));
    }
    let qty_in_base = to_base_quantity(qty, unit, product.base_unit)?;
    let total = product
        .price_per_unit
        .checked_mul(qty_in_base)
        .ok_or(PricingError::Overflow)?;
    Ok(total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
#[path = "tests/pricing_tests.rs"]
mod tests;
