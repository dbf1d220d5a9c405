//! Price form validation and pricing, independent of the HTTP layer.

use std::{collections::HashMap, str::FromStr};

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    domain::{Product, ProductId, Unit},
    pricing::price_for,
    protocol::{PriceErrors, NON_FIELD_ERRORS},
};

const QUANTITY_MAX_DIGITS: u32 = 14;
const QUANTITY_DECIMAL_PLACES: u32 = 3;
const FIELD_REQUIRED: &str = "This field is required.";

/// Raw price form as posted. `product` is accepted as an alias of `product_id`.
#[derive(Debug, Default, Deserialize)]
pub struct PriceForm {
    pub product_id: Option<String>,
    pub product: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRejection {
    pub status: StatusCode,
    pub errors: PriceErrors,
}

impl QuoteRejection {
    fn new(status: StatusCode, errors: PriceErrors) -> Self {
        Self { status, errors }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<ProductId, Product>,
}

impl Catalog {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|product| (product.id.clone(), product))
                .collect(),
        }
    }

    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Validates `form` against the catalogue and prices it. Field errors are gathered
/// in form order (quantity, then unit) before any pricing is attempted.
pub fn quote(catalog: &Catalog, form: &PriceForm) -> Result<(ProductId, Decimal), QuoteRejection> {
    let product_id = form
        .product_id
        .as_deref()
        .or(form.product.as_deref())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ProductId::new)
        .ok_or_else(|| {
            QuoteRejection::new(
                StatusCode::BAD_REQUEST,
                PriceErrors::single("product_id", "Missing product_id"),
            )
        })?;

    let product = catalog.get(&product_id).ok_or_else(|| {
        QuoteRejection::new(
            StatusCode::NOT_FOUND,
            PriceErrors::single("product_id", "Product not found"),
        )
    })?;

    let mut errors = PriceErrors::default();
    let quantity = match clean_quantity(form.quantity.as_deref()) {
        Ok(quantity) => Some(quantity),
        Err(messages) => {
            for message in messages {
                errors.push("quantity", message);
            }
            None
        }
    };
    let unit = match clean_unit(form.unit.as_deref()) {
        Ok(unit) => Some(unit),
        Err(message) => {
            errors.push("unit", message);
            None
        }
    };

    let (Some(quantity), Some(unit)) = (quantity, unit) else {
        return Err(QuoteRejection::new(StatusCode::BAD_REQUEST, errors));
    };

    let total = price_for(product, quantity, unit).map_err(|err| {
        QuoteRejection::new(
            StatusCode::BAD_REQUEST,
            PriceErrors::single(NON_FIELD_ERRORS, format!("Cannot calculate price: {err}")),
        )
    })?;
    Ok((product_id, total))
}

fn clean_quantity(raw: Option<&str>) -> Result<Decimal, Vec<String>> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(vec![FIELD_REQUIRED.to_string()]);
    }
    let quantity = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| vec!["Enter a number.".to_string()])?;

    let mut messages = Vec::new();
    if quantity < Decimal::new(1, QUANTITY_DECIMAL_PLACES) {
        messages.push("Quantity must be greater than zero.".to_string());
    }
    if let Some(message) = digit_limit_violation(quantity) {
        messages.push(message);
    }
    if messages.is_empty() {
        Ok(quantity)
    } else {
        Err(messages)
    }
}

/// First violated limit of a DECIMAL(14, 3) column, if any.
fn digit_limit_violation(quantity: Decimal) -> Option<String> {
    let decimals = quantity.scale();
    let mantissa_digits = quantity.mantissa().unsigned_abs().to_string().len() as u32;
    let digits = mantissa_digits.max(decimals);
    let whole_digits = digits - decimals;
    let max_whole = QUANTITY_MAX_DIGITS - QUANTITY_DECIMAL_PLACES;

    if digits > QUANTITY_MAX_DIGITS {
        Some(format!(
            "Ensure that there are no more than {QUANTITY_MAX_DIGITS} digits in total."
        ))
    } else if decimals > QUANTITY_DECIMAL_PLACES {
        Some(format!(
            "Ensure that there are no more than {QUANTITY_DECIMAL_PLACES} decimal places."
        ))
    } else if whole_digits > max_whole {
        Some(format!(
            "Ensure that there are no more than {max_whole} digits before the decimal point."
        ))
    } else {
        None
    }
}

fn clean_unit(raw: Option<&str>) -> Result<Unit, String> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(FIELD_REQUIRED.to_string());
    }
    Unit::from_str(raw)
        .map_err(|_| format!("Select a valid choice. {raw} is not one of the available choices."))
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
