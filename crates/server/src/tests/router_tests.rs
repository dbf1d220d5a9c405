use super::*;
use axum::{
    body::{self, Body},
    http::Request,
};
use serde_json::json;
use tower::ServiceExt;

use crate::config::{demo_catalogue, Settings};

fn test_app(require_csrf: bool) -> Router {
    let settings = Settings {
        require_csrf,
        products: demo_catalogue(),
        ..Settings::default()
    };
    build_router(
        Arc::new(AppState::from_settings(&settings)),
        &settings.price_endpoint,
    )
}

fn price_request(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/products/api/price/")
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder
            .header(CSRF_HEADER_NAME, token)
            .header(COOKIE, format!("sessionid=s; {CSRF_COOKIE_NAME}={token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let response = test_app(true)
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn priced_request_returns_two_decimal_total() {
    let response = test_app(true)
        .oneshot(price_request(
            "product_id=1&quantity=500&unit=g",
            Some("tok"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true, "total": "49.00" }));
}

#[tokio::test]
async fn invalid_fields_return_error_map() {
    let response = test_app(true)
        .oneshot(price_request(
            "product_id=1&quantity=0&unit=kg",
            Some("tok"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "ok": false, "errors": { "quantity": ["Quantity must be greater than zero."] } })
    );
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let response = test_app(true)
        .oneshot(price_request(
            "product_id=404&quantity=1&unit=kg",
            Some("tok"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await,
        json!({ "ok": false, "errors": { "product_id": ["Product not found"] } })
    );
}

#[tokio::test]
async fn missing_csrf_token_is_forbidden() {
    let response = test_app(true)
        .oneshot(price_request("product_id=1&quantity=1&unit=kg", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await,
        json!({ "ok": false, "errors": { "__all__": ["CSRF verification failed."] } })
    );
}

#[tokio::test]
async fn mismatched_csrf_token_is_forbidden() {
    let request = Request::post("/products/api/price/")
        .header("content-type", "application/x-www-form-urlencoded")
        .header(CSRF_HEADER_NAME, "one")
        .header(COOKIE, "csrftoken=two")
        .body(Body::from("product_id=1&quantity=1&unit=kg"))
        .expect("request");
    let response = test_app(true).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn csrf_check_can_be_disabled() {
    let response = test_app(false)
        .oneshot(price_request("product_id=3&quantity=2&unit=pcs", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "ok": true, "total": "90.00" }));
}

#[tokio::test]
async fn product_page_sets_csrf_cookie_once() {
    let app = test_app(true);
    let response = app
        .clone()
        .oneshot(Request::get("/products/2/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie")
        .to_string();
    assert!(cookie.starts_with("csrftoken="));
    let page: ProductPage = serde_json::from_value(json_body(response).await).expect("page");
    assert_eq!(page.product_id, ProductId::new("2"));
    assert_eq!(page.default_unit, shared::domain::Unit::Ltr);

    let response = app
        .oneshot(
            Request::get("/products/2/")
                .header(COOKIE, "csrftoken=already")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn unknown_product_page_is_not_found() {
    let response = test_app(true)
        .oneshot(Request::get("/products/99/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error: ApiError = serde_json::from_value(json_body(response).await).expect("error");
    assert_eq!(error.code, ErrorCode::NotFound);
}

#[test]
fn cookie_lookup_matches_exact_name() {
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_static("xcsrftoken=a; csrftoken=b"));
    assert_eq!(request_cookie(&headers, CSRF_COOKIE_NAME).as_deref(), Some("b"));
    assert_eq!(request_cookie(&headers, "missing"), None);
}

#[tokio::test]
async fn unreadable_form_is_a_json_validation_error() {
    let request = Request::post("/products/api/price/")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .expect("request");
    let response = test_app(false).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ApiError = serde_json::from_value(json_body(response).await).expect("error");
    assert_eq!(error.code, ErrorCode::Validation);
}

#[tokio::test]
async fn csrf_is_checked_before_the_form_is_read() {
    let request = Request::post("/products/api/price/")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .expect("request");
    let response = test_app(true).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await,
        json!({ "ok": false, "errors": { "__all__": ["CSRF verification failed."] } })
    );
}
