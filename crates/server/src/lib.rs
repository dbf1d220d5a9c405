use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use shared::{
    domain::ProductId,
    error::{ApiError, ErrorCode},
    protocol::{
        PriceErrors, PriceResponse, ProductPage, CSRF_COOKIE_NAME, CSRF_HEADER_NAME,
        NON_FIELD_ERRORS,
    },
};
use tracing::{debug, info, warn};

pub mod api;
pub mod config;

use api::{quote, Catalog, PriceForm};
use config::Settings;

pub struct AppState {
    pub catalog: Catalog,
    pub require_csrf: bool,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            catalog: Catalog::new(settings.products.iter().cloned()),
            require_csrf: settings.require_csrf,
        }
    }
}

pub fn build_router(state: Arc<AppState>, price_endpoint: &str) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/products/:product_id/", get(product_page))
        .route(price_endpoint, post(price_calculator))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Product page data for the price form. Hands out a fresh `csrftoken` cookie when
/// the caller does not already hold one.
async fn product_page(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let product_id = ProductId::new(product_id);
    let Some(product) = state.catalog.get(&product_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("product {product_id} not found"),
            )),
        )
            .into_response();
    };

    let mut response = Json(ProductPage::for_product(product)).into_response();
    if request_cookie(&headers, CSRF_COOKIE_NAME).is_none() {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let cookie = format!("{CSRF_COOKIE_NAME}={token}; Path=/; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().insert(SET_COOKIE, value);
            }
            Err(error) => warn!(%error, "failed to build csrf cookie header"),
        }
    }
    response
}

/// The CSRF check runs before the body is looked at, so a caller without a token
/// never reaches form validation.
async fn price_calculator(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    form: Result<Form<PriceForm>, FormRejection>,
) -> Response {
    if state.require_csrf && !csrf_token_matches(&headers) {
        debug!("price request rejected: csrf token missing or mismatched");
        return (
            StatusCode::FORBIDDEN,
            Json(PriceResponse::rejected(PriceErrors::single(
                NON_FIELD_ERRORS,
                "CSRF verification failed.",
            ))),
        )
            .into_response();
    }

    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            debug!(%rejection, "unreadable price form");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(ErrorCode::Validation, rejection.body_text())),
            )
                .into_response();
        }
    };

    match quote(&state.catalog, &form) {
        Ok((product_id, total)) => {
            info!(%product_id, %total, "price calculated");
            Json(PriceResponse::priced(total)).into_response()
        }
        Err(rejection) => {
            debug!(status = %rejection.status, errors = ?rejection.errors, "price request rejected");
            (
                rejection.status,
                Json(PriceResponse::rejected(rejection.errors)),
            )
                .into_response()
        }
    }
}

fn request_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn csrf_token_matches(headers: &HeaderMap) -> bool {
    let header = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    match (header, request_cookie(headers, CSRF_COOKIE_NAME)) {
        (Some(header), Some(cookie)) => header == cookie,
        _ => false,
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
