use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("price request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("price response was not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid price endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

/// Why a recalculation ended without a priced total. Each kind maps to one fixed
/// rendering on the form.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("quantity '{quantity}' is not a positive number")]
    Validation { quantity: String },
    #[error("price service rejected the request ({status}): {message}")]
    Service { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}
