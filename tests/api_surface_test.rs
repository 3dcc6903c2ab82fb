mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use chrono::DateTime;
use serde_json::json;
use uuid::Uuid;

use common::{response_json, TestApp};

#[tokio::test]
async fn status_endpoint_reports_service_identity() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    assert_eq!(body["data"]["status"], json!("ok"));
    assert_eq!(body["data"]["service"], json!("shopkeeper-api"));
    assert!(body["data"]["version"].as_str().is_some());
}

#[tokio::test]
async fn health_endpoint_checks_the_database() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("healthy"));
    assert_eq!(body["data"]["checks"]["database"], json!("healthy"));
}

#[tokio::test]
async fn every_response_carries_a_request_id_header() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    let generated = response
        .headers()
        .get("x-request-id")
        .expect("generated request id header")
        .to_str()
        .expect("ascii request id")
        .to_string();
    assert!(!generated.is_empty());

    let body = response_json(response).await;
    assert_eq!(body["meta"]["request_id"], json!(generated));
}

#[tokio::test]
async fn caller_supplied_request_ids_are_echoed_everywhere() {
    let app = TestApp::new().await;

    let response = app
        .request_with_headers(
            Method::GET,
            &format!("/api/v1/categories/{}", Uuid::new_v4()),
            None,
            &[("x-request-id", "trace-me-123")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-me-123")
    );

    // Error envelopes carry the id too.
    let body = response_json(response).await;
    assert_eq!(body["request_id"], json!("trace-me-123"));
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn success_envelopes_have_a_parseable_timestamp() {
    let app = TestApp::new().await;
    app.seed_category("Envelope check").await;

    let response = app.request(Method::GET, "/api/v1/categories", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    let timestamp = body["meta"]["timestamp"].as_str().expect("meta timestamp");
    DateTime::parse_from_rfc3339(timestamp).expect("rfc3339 timestamp");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn malformed_json_bodies_are_bad_requests() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/categories")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("build request");

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_fall_through_to_404() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/warehouses", None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::DELETE, "/api/v1/reports/summary", None)
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
