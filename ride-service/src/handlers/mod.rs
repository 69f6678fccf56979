//! HTTP handlers.

pub mod drivers;
pub mod rides;
pub mod wallet;
pub mod webhook;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics::get_metrics;
use crate::AppState;

/// Liveness probe. Reports the database as a dependency.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = match state.db.health_check().await {
        Ok(()) => "ok",
        Err(_) => "unavailable",
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "ride-service",
            "version": env!("CARGO_PKG_VERSION"),
            "database": db_status
        })),
    )
}

/// Prometheus metrics endpoint.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
