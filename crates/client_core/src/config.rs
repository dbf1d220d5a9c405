use std::time::Duration;

use shared::protocol::DEFAULT_PRICE_ENDPOINT;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLookupConfig {
    /// Replaces [`DEFAULT_PRICE_ENDPOINT`] for every request when set.
    pub endpoint_override: Option<String>,
    pub debounce: Duration,
    pub currency_symbol: String,
    /// Drop responses that arrive after a newer recalculation has started. When off,
    /// whichever response lands last owns the display.
    pub discard_stale_responses: bool,
}

impl Default for PriceLookupConfig {
    fn default() -> Self {
        Self {
            endpoint_override: None,
            debounce: DEFAULT_DEBOUNCE,
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            discard_stale_responses: true,
        }
    }
}

impl PriceLookupConfig {
    pub fn endpoint_path(&self) -> &str {
        self.endpoint_override
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_PRICE_ENDPOINT)
    }
}
