//! Payment gateway webhook endpoint.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde_json::json;

use crate::services::metrics::WEBHOOK_EVENTS_TOTAL;
use crate::services::ReconcileOutcome;
use crate::AppState;

/// Squad payment webhook.
///
/// Always acknowledged with 200 so the gateway does not retry indefinitely:
/// signature failures, unknown references, and even internal errors are
/// logged and counted but never surfaced to the caller. Correctness rests on
/// idempotent reference matching, not on the gateway re-delivering. The raw
/// body is consumed as a string because the signature covers the exact bytes
/// we received.
pub async fn squad_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    let signature = headers
        .get("squad-signature")
        .and_then(|v| v.to_str().ok());

    let received = match state.reconciler.process(signature, &body).await {
        Ok(outcome) => !matches!(
            outcome,
            ReconcileOutcome::MissingSignature | ReconcileOutcome::InvalidSignature
        ),
        Err(e) => {
            WEBHOOK_EVENTS_TOTAL.with_label_values(&["error"]).inc();
            tracing::error!(error = %e, "Webhook reconciliation failed");
            false
        }
    };

    (StatusCode::OK, Json(json!({ "received": received })))
}
