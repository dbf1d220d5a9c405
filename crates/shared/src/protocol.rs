use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Product, ProductId, Unit};

pub const DEFAULT_PRICE_ENDPOINT: &str = "/products/api/price/";
pub const CSRF_COOKIE_NAME: &str = "csrftoken";
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";
/// Error-map key for failures that do not belong to a single form field.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub fn product_page_route(product_id: &ProductId) -> String {
    format!("/products/{}/", product_id.as_str())
}

/// Form body posted to the price endpoint. Quantity and unit travel exactly as the
/// user entered them; the service owns their validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub product_id: ProductId,
    pub quantity: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceTotal {
    Number(serde_json::Number),
    Text(String),
}

impl PriceTotal {
    pub fn from_decimal(total: Decimal) -> Self {
        PriceTotal::Text(format!("{total:.2}"))
    }
}

impl fmt::Display for PriceTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceTotal::Text(text) => f.write_str(text),
            PriceTotal::Number(number) => {
                if let Some(v) = number.as_i64() {
                    write!(f, "{v}")
                } else if let Some(v) = number.as_u64() {
                    write!(f, "{v}")
                } else {
                    // Shortest float form, so 150.0 prints as 150.
                    match number.as_f64() {
                        Some(v) => write!(f, "{v}"),
                        None => write!(f, "{number}"),
                    }
                }
            }
        }
    }
}

/// Field name to message(s), in the order the service reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceErrors(pub Map<String, Value>);

impl PriceErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        let message = Value::String(message.into());
        match self.0.get_mut(field) {
            Some(Value::Array(messages)) => messages.push(message),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, message]);
            }
            None => {
                self.0.insert(field.to_string(), Value::Array(vec![message]));
            }
        }
    }

    /// First message of the first field. Sequences yield their first element,
    /// scalars yield themselves; empty or null entries yield nothing.
    pub fn first_message(&self) -> Option<String> {
        let (_, value) = self.0.iter().next()?;
        let value = match value {
            Value::Array(messages) => messages.first()?,
            other => other,
        };
        match value {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<PriceTotal>,
    #[serde(default, skip_serializing_if = "PriceErrors::is_empty")]
    pub errors: PriceErrors,
}

impl PriceResponse {
    pub fn priced(total: Decimal) -> Self {
        Self {
            ok: true,
            total: Some(PriceTotal::from_decimal(total)),
            errors: PriceErrors::default(),
        }
    }

    pub fn rejected(errors: PriceErrors) -> Self {
        Self {
            ok: false,
            total: None,
            errors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitChoice {
    pub value: Unit,
    pub label: String,
}

/// What a product page exposes to the price form: the hidden product id and the
/// initial quantity/unit selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub product_id: ProductId,
    pub name: String,
    pub base_unit: Unit,
    pub price_per_unit: Decimal,
    pub default_quantity: String,
    pub default_unit: Unit,
    pub units: Vec<UnitChoice>,
}

impl ProductPage {
    pub fn for_product(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            base_unit: product.base_unit,
            price_per_unit: product.price_per_unit,
            default_quantity: "1.000".to_string(),
            default_unit: product.base_unit,
            units: Unit::ALL
                .into_iter()
                .map(|unit| UnitChoice {
                    value: unit,
                    label: unit.label().to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
