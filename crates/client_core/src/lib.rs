use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use shared::{domain::ProductId, protocol::PriceRequest};
use tracing::{debug, info, warn};

pub mod config;
pub mod credentials;
pub mod debounce;
pub mod error;
pub mod form;
pub mod transport;

pub use config::PriceLookupConfig;
pub use credentials::{CookieJarCredentials, CredentialProvider, NoCredentials, StaticToken};
pub use debounce::Debouncer;
pub use error::{LookupError, TransportError};
pub use form::PriceForm;
pub use transport::{HttpPriceService, PriceService, ServiceReply};

pub const CALCULATING_PLACEHOLDER: &str = "Calculating…";
pub const INVALID_QUANTITY_PLACEHOLDER: &str = "Enter valid quantity";
pub const NO_TOTAL: &str = "—";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";
pub const FALLBACK_ERROR_MESSAGE: &str = "Error";

/// How one recalculation cycle ended. The form has already been updated by the time
/// this is returned.
#[derive(Debug)]
pub enum Recalculation {
    Priced { total: String },
    Unpriced,
    Failed(LookupError),
    /// A newer recalculation started while this one waited on the service; its
    /// response was dropped without touching the form.
    Superseded,
}

/// Keeps a product page's displayed total in step with its quantity and unit
/// controls.
pub struct PriceLookupController<F, S> {
    inner: Arc<Recalculator<F, S>>,
    debouncer: Debouncer,
}

struct Recalculator<F, S> {
    form: F,
    service: S,
    product_id: ProductId,
    config: PriceLookupConfig,
    generation: AtomicU64,
}

impl<F, S> PriceLookupController<F, S>
where
    F: PriceForm + 'static,
    S: PriceService + 'static,
{
    /// Binds to `form` and schedules the initial recalculation. Returns `None`
    /// without touching the form any further when it carries no product id.
    /// Outside a tokio runtime the initial recalculation is skipped.
    pub fn bind(form: F, service: S, config: PriceLookupConfig) -> Option<Self> {
        let Some(product_id) = form.product_id() else {
            debug!("no product id on page; price lookup stays inert");
            return None;
        };
        info!(%product_id, endpoint = config.endpoint_path(), "price lookup bound");

        let controller = Self {
            debouncer: Debouncer::new(config.debounce),
            inner: Arc::new(Recalculator {
                form,
                service,
                product_id,
                config,
                generation: AtomicU64::new(0),
            }),
        };
        controller.schedule_recalculation();
        Some(controller)
    }

    pub fn product_id(&self) -> &ProductId {
        &self.inner.product_id
    }

    pub fn form(&self) -> &F {
        &self.inner.form
    }

    /// Quantity or unit changed. Restarts the quiet period; only the last call
    /// within it reaches the service.
    pub fn schedule_recalculation(&self) {
        let inner = Arc::clone(&self.inner);
        self.debouncer.schedule(async move {
            inner.recalculate().await;
        });
    }

    /// Explicit "calculate" action. Does not cancel a pending debounced run.
    pub async fn recalculate_now(&self) -> Recalculation {
        self.inner.recalculate().await
    }

    /// Drops any waiting run and recalculates with the current values. A debounced
    /// run already waiting on the service is superseded, so the form ends up showing
    /// the last edit once this returns.
    pub async fn settle(&self) -> Recalculation {
        self.cancel_pending();
        self.recalculate_now().await
    }

    pub fn cancel_pending(&self) {
        self.debouncer.cancel();
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl<F: PriceForm, S: PriceService> Recalculator<F, S> {
    async fn recalculate(&self) -> Recalculation {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.form.clear_error();
        self.form.show_total(CALCULATING_PLACEHOLDER);

        let quantity = self.form.quantity();
        let unit = self.form.unit();
        if !is_positive_quantity(&quantity) {
            debug!(%quantity, "quantity rejected before lookup");
            self.form.show_total(INVALID_QUANTITY_PLACEHOLDER);
            return Recalculation::Failed(LookupError::Validation { quantity });
        }

        let request = PriceRequest {
            product_id: self.product_id.clone(),
            quantity,
            unit,
        };
        debug!(
            generation,
            quantity = %request.quantity,
            unit = %request.unit,
            "requesting price"
        );
        let reply = self.service.quote(&request).await;

        if self.config.discard_stale_responses
            && self.generation.load(Ordering::SeqCst) != generation
        {
            debug!(generation, "discarding superseded price response");
            return Recalculation::Superseded;
        }

        match reply {
            Ok(ServiceReply::Success(body)) => match body.total.filter(|_| body.ok) {
                Some(total) => {
                    let total = format!("{}{total}", self.config.currency_symbol);
                    self.form.show_total(&total);
                    Recalculation::Priced { total }
                }
                None => {
                    self.form.show_total(NO_TOTAL);
                    Recalculation::Unpriced
                }
            },
            Ok(ServiceReply::Rejected { status, body }) => {
                let message = body
                    .errors
                    .first_message()
                    .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());
                warn!(status, %message, "price service rejected request");
                self.form.show_error(&message);
                self.form.show_total(NO_TOTAL);
                Recalculation::Failed(LookupError::Service { status, message })
            }
            Err(error) => {
                warn!(%error, "price request failed");
                self.form.show_error(NETWORK_ERROR_MESSAGE);
                self.form.show_total(NO_TOTAL);
                Recalculation::Failed(LookupError::Transport(error))
            }
        }
    }
}

/// Empty, unparseable, non-finite and non-positive quantities never reach the
/// service.
pub fn is_positive_quantity(raw: &str) -> bool {
    raw.trim()
        .parse::<f64>()
        .is_ok_and(|value| value.is_finite() && value > 0.0)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
