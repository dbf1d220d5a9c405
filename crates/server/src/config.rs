use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    domain::{Product, ProductId, Unit},
    protocol::DEFAULT_PRICE_ENDPOINT,
};
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "server.toml";
const PRICE_MAX_DIGITS: u32 = 12;
const PRICE_DECIMAL_PLACES: u32 = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub price_endpoint: String,
    pub require_csrf: bool,
    pub products: Vec<Product>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8443".into(),
            price_endpoint: DEFAULT_PRICE_ENDPOINT.into(),
            require_csrf: true,
            products: Vec::new(),
        }
    }
}

/// Reads `server.toml` (or `SERVER_CONFIG`) when present, then `APP__*` variables,
/// then the legacy `SERVER_BIND`.
pub fn load_settings() -> anyhow::Result<Settings> {
    let explicit = env::var("SERVER_CONFIG").ok().map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut settings = load_settings_from(&path, explicit.is_some(), app_environment())?;

    if let Ok(v) = env::var("SERVER_BIND") {
        settings.bind_addr = v;
    }
    Ok(settings)
}

pub(crate) fn app_environment() -> Environment {
    Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
}

pub(crate) fn load_settings_from(
    path: &Path,
    required: bool,
    environment: Environment,
) -> anyhow::Result<Settings> {
    let mut settings: Settings = Config::builder()
        .add_source(File::from(path).required(required))
        .add_source(environment)
        .build()
        .with_context(|| format!("failed to read settings from '{}'", path.display()))?
        .try_deserialize()
        .context("invalid server settings")?;

    settings.price_endpoint = normalize_endpoint(&settings.price_endpoint);
    for product in &settings.products {
        check_price(product.price_per_unit)
            .with_context(|| format!("invalid price for product '{}'", product.id))?;
    }
    if settings.products.is_empty() {
        info!("no products configured; serving the demo catalogue");
        settings.products = demo_catalogue();
    }
    Ok(settings)
}

/// Catalogue prices are non-negative with at most 12 digits, 2 of them decimal.
fn check_price(price: Decimal) -> anyhow::Result<()> {
    if price.is_sign_negative() && !price.is_zero() {
        anyhow::bail!("price {price} is negative");
    }
    let price = price.normalize();
    let decimals = price.scale();
    let digits = (price.mantissa().unsigned_abs().to_string().len() as u32).max(decimals);
    if decimals > PRICE_DECIMAL_PLACES {
        anyhow::bail!("price {price} has more than {PRICE_DECIMAL_PLACES} decimal places");
    }
    if digits > PRICE_MAX_DIGITS {
        anyhow::bail!("price {price} has more than {PRICE_MAX_DIGITS} digits");
    }
    let max_whole = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
    if digits - decimals > max_whole {
        anyhow::bail!("price {price} has more than {max_whole} digits before the decimal point");
    }
    Ok(())
}

fn normalize_endpoint(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return DEFAULT_PRICE_ENDPOINT.to_string();
    }
    if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    }
}

pub fn demo_catalogue() -> Vec<Product> {
    [
        ("1", "Basmati rice", Unit::Kg, 9800),
        ("2", "Sunflower oil", Unit::Ltr, 16550),
        ("3", "Notebook", Unit::Pcs, 4500),
        ("4", "Saffron", Unit::G, 31000),
    ]
    .into_iter()
    .map(|(id, name, base_unit, paise)| Product {
        id: ProductId::new(id),
        name: name.to_string(),
        base_unit,
        price_per_unit: Decimal::new(paise, 2),
    })
    .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
