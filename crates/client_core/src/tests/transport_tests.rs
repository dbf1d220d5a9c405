use super::*;
use std::collections::HashMap;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Form, Router,
};
use serde_json::json;
use shared::domain::ProductId;
use tokio::{net::TcpListener, sync::Mutex};

use crate::credentials::{CookieJarCredentials, NoCredentials};

#[derive(Debug, Clone, Default)]
struct Captured {
    form: HashMap<String, String>,
    csrf: Option<String>,
    cookie: Option<String>,
    content_type: Option<String>,
}

#[derive(Clone)]
struct ServerState {
    captured: Arc<Mutex<Vec<Captured>>>,
    status: StatusCode,
    body: String,
}

async fn handle_price(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    state.captured.lock().await.push(Captured {
        form,
        csrf: header("x-csrftoken"),
        cookie: header("cookie"),
        content_type: header("content-type"),
    });
    (
        state.status,
        [("content-type", "application/json")],
        state.body.clone(),
    )
}

async fn spawn_price_server(
    path: &str,
    status: StatusCode,
    body: &str,
) -> (String, Arc<Mutex<Vec<Captured>>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = ServerState {
        captured: Arc::clone(&captured),
        status,
        body: body.to_string(),
    };
    let app = Router::new()
        .route(path, post(handle_price))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), captured)
}

fn request(quantity: &str, unit: &str) -> PriceRequest {
    PriceRequest {
        product_id: ProductId::new("9"),
        quantity: quantity.to_string(),
        unit: unit.to_string(),
    }
}

#[test]
fn endpoint_defaults_and_override() {
    let config = PriceLookupConfig::default();
    let url = resolve_endpoint("http://shop.local:8000/app/", config.endpoint_path())
        .expect("endpoint");
    assert_eq!(url.as_str(), "http://shop.local:8000/products/api/price/");

    let config = PriceLookupConfig {
        endpoint_override: Some("/pricing/quote".to_string()),
        ..PriceLookupConfig::default()
    };
    let url = resolve_endpoint("http://shop.local", config.endpoint_path()).expect("endpoint");
    assert_eq!(url.as_str(), "http://shop.local/pricing/quote");

    let blank = PriceLookupConfig {
        endpoint_override: Some("  ".to_string()),
        ..PriceLookupConfig::default()
    };
    assert_eq!(blank.endpoint_path(), "/products/api/price/");
}

#[test]
fn invalid_server_url_is_reported() {
    let err = HttpPriceService::new("not a url", &PriceLookupConfig::default(), NoCredentials)
        .err()
        .expect("invalid url");
    assert!(matches!(err, TransportError::InvalidEndpoint { .. }));
}

#[tokio::test]
async fn posts_form_with_csrf_header_and_cookie() {
    let (server_url, captured) = spawn_price_server(
        "/products/api/price/",
        StatusCode::OK,
        r#"{"ok":true,"total":"49.00"}"#,
    )
    .await;
    let service = HttpPriceService::new(
        &server_url,
        &PriceLookupConfig::default(),
        CookieJarCredentials::from_cookie_header("csrftoken=tok%2F1; sessionid=s"),
    )
    .expect("service");

    let reply = service.quote(&request("500", "g")).await.expect("reply");
    let body = match reply {
        ServiceReply::Success(body) => body,
        other => panic!("expected success, got {other:?}"),
    };
    assert!(body.ok);
    assert_eq!(body.total.expect("total").to_string(), "49.00");

    let captured = captured.lock().await;
    assert_eq!(captured.len(), 1);
    let seen = &captured[0];
    assert_eq!(seen.form.get("product_id").map(String::as_str), Some("9"));
    assert_eq!(seen.form.get("quantity").map(String::as_str), Some("500"));
    assert_eq!(seen.form.get("unit").map(String::as_str), Some("g"));
    assert_eq!(seen.csrf.as_deref(), Some("tok/1"));
    assert_eq!(
        seen.cookie.as_deref(),
        Some("csrftoken=tok%2F1; sessionid=s")
    );
    assert!(seen
        .content_type
        .as_deref()
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded")));
}

#[tokio::test]
async fn error_status_is_reported_as_rejected() {
    let (server_url, _captured) = spawn_price_server(
        "/products/api/price/",
        StatusCode::BAD_REQUEST,
        r#"{"ok":false,"errors":{"quantity":["Quantity must be greater than zero."]}}"#,
    )
    .await;
    let service =
        HttpPriceService::new(&server_url, &PriceLookupConfig::default(), NoCredentials)
            .expect("service");

    let reply = service.quote(&request("0.0001", "kg")).await.expect("reply");
    let (status, body) = match reply {
        ServiceReply::Rejected { status, body } => (status, body),
        other => panic!("expected rejection, got {other:?}"),
    };
    assert_eq!(status, 400);
    assert_eq!(
        body.errors.first_message().as_deref(),
        Some("Quantity must be greater than zero.")
    );
}

#[tokio::test]
async fn non_json_body_is_a_transport_error() {
    let (server_url, _captured) =
        spawn_price_server("/products/api/price/", StatusCode::NOT_FOUND, "<h1>Not Found</h1>")
            .await;
    let service =
        HttpPriceService::new(&server_url, &PriceLookupConfig::default(), NoCredentials)
            .expect("service");

    let err = service
        .quote(&request("1", "kg"))
        .await
        .expect_err("decode failure");
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let service = HttpPriceService::new(
        &format!("http://{addr}"),
        &PriceLookupConfig::default(),
        NoCredentials,
    )
    .expect("service");
    let err = service
        .quote(&request("1", "kg"))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, TransportError::Request(_)));
}

#[tokio::test]
async fn endpoint_override_is_used_for_requests() {
    let (server_url, captured) = spawn_price_server(
        "/custom/price",
        StatusCode::OK,
        r#"{"ok":true,"total":150}"#,
    )
    .await;
    let config = PriceLookupConfig {
        endpoint_override: Some("/custom/price".to_string()),
        ..PriceLookupConfig::default()
    };
    let service = HttpPriceService::new(&server_url, &config, NoCredentials).expect("service");

    let reply = service.quote(&request("1", "pcs")).await.expect("reply");
    assert!(matches!(reply, ServiceReply::Success(ref body) if body.ok));
    assert_eq!(captured.lock().await.len(), 1);
}
