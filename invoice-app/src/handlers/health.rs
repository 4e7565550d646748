use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::get_metrics;
use crate::startup::AppState;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "invoice-app",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: the store must answer and the email provider must be usable.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let unavailable = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "status": "unavailable" })),
    );

    if let Err(e) = state.store.health_check().await {
        tracing::warn!(error = %e, "Readiness check failed - store unavailable");
        return unavailable;
    }

    if let Err(e) = state.email.health_check().await {
        tracing::warn!(error = %e, "Readiness check failed - email provider unavailable");
        return unavailable;
    }

    tracing::debug!("Readiness check passed");
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}

/// Metrics endpoint for Prometheus scraping.
pub async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
