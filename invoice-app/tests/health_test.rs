//! Health, readiness and metrics endpoint tests for invoice-app.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestApp;
use invoice_app::services::providers::MockEmailProvider;

#[tokio::test]
async fn health_reports_service() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "invoice-app");
}

#[tokio::test]
async fn readiness_follows_store() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    app.memory().set_unavailable(true);
    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn readiness_follows_email_provider() {
    let app = TestApp::with_email(MockEmailProvider::new(false));

    let (status, body) = app.get("/ready", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn metrics_are_plain_text() {
    let app = TestApp::spawn();
    invoice_app::services::init_metrics();

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("Failed to build request");
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).is_ok());
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .expect("Failed to build request");
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .expect("router is infallible");

    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    assert_eq!(
        response
            .headers()
            .get("x-content-type-options")
            .and_then(|v| v.to_str().ok()),
        Some("nosniff")
    );
}
