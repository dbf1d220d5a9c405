use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{header::COOKIE, Client};
use shared::protocol::{PriceRequest, PriceResponse, CSRF_HEADER_NAME};
use tracing::debug;
use url::Url;

use crate::{config::PriceLookupConfig, credentials::CredentialProvider, error::TransportError};

/// A decoded answer from the price-computation service. The HTTP status decides
/// the variant; the body shape is the same either way.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceReply {
    Success(PriceResponse),
    Rejected { status: u16, body: PriceResponse },
}

#[async_trait]
pub trait PriceService: Send + Sync {
    async fn quote(&self, request: &PriceRequest) -> Result<ServiceReply, TransportError>;
}

#[async_trait]
impl<T: PriceService + ?Sized> PriceService for Arc<T> {
    async fn quote(&self, request: &PriceRequest) -> Result<ServiceReply, TransportError> {
        (**self).quote(request).await
    }
}

/// Posts the price form to the configured endpoint. No timeout is applied; the
/// request waits on the connection's own failure handling.
pub struct HttpPriceService<P> {
    http: Client,
    endpoint: Url,
    credentials: P,
}

impl<P: CredentialProvider> HttpPriceService<P> {
    pub fn new(
        server_url: &str,
        config: &PriceLookupConfig,
        credentials: P,
    ) -> Result<Self, TransportError> {
        Self::with_client(Client::new(), server_url, config, credentials)
    }

    pub fn with_client(
        http: Client,
        server_url: &str,
        config: &PriceLookupConfig,
        credentials: P,
    ) -> Result<Self, TransportError> {
        let endpoint = resolve_endpoint(server_url, config.endpoint_path())?;
        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub(crate) fn resolve_endpoint(server_url: &str, path: &str) -> Result<Url, TransportError> {
    let invalid = |source| TransportError::InvalidEndpoint {
        endpoint: format!("{server_url}{path}"),
        source,
    };
    Url::parse(server_url)
        .and_then(|base| base.join(path))
        .map_err(invalid)
}

#[async_trait]
impl<P: CredentialProvider> PriceService for HttpPriceService<P> {
    async fn quote(&self, request: &PriceRequest) -> Result<ServiceReply, TransportError> {
        let mut builder = self.http.post(self.endpoint.clone()).form(request);
        match self.credentials.csrf_token() {
            Some(token) => builder = builder.header(CSRF_HEADER_NAME, token),
            None => debug!(endpoint = %self.endpoint, "no csrf token available for price request"),
        }
        if let Some(cookies) = self.credentials.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body: PriceResponse = serde_json::from_slice(&bytes).map_err(TransportError::Decode)?;
        debug!(status = status.as_u16(), ok = body.ok, "price response received");

        if status.is_success() {
            Ok(ServiceReply::Success(body))
        } else {
            Ok(ServiceReply::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
