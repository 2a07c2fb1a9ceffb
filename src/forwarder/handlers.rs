use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::model::{AlertBatch, AlertEvent};
use super::setup::{OneTimeSetup, SetupScripts};
use crate::engine::Engine;

/// Acknowledgement returned for every accepted batch
pub const ACK_BODY: &str = "Request received";

/// Application state shared across handlers
pub struct AppState {
    pub engine: Arc<dyn Engine>,
    pub alerts_table: String,
    pub setup: OneTimeSetup,
    pub setup_scripts: SetupScripts,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Alert Webhook
// ============================================================================

/// Forward an Alertmanager batch to the alert sink, in payload order.
///
/// Processing stops at the first bad entry; entries before it stay appended.
pub async fn receive_alert(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AlertBatch>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    let Json(batch) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let total = batch.alerts.len();

    for (index, entry) in batch.alerts.iter().enumerate() {
        let event = AlertEvent::from_json(entry, Utc::now()).map_err(|e| {
            tracing::warn!(index, total, error = %e, "Rejecting alert batch");
            ApiError::BadRequest(format!("alert {}: {}", index, e))
        })?;

        state
            .engine
            .append_row(&state.alerts_table, event.to_row())
            .await
            .map_err(|e| {
                tracing::error!(index, total, error = %e, "Failed to append alert");
                ApiError::Upstream(format!("alert {}: {}", index, e))
            })?;

        tracing::debug!(
            alert = %event.alert_identifier,
            job = %event.job,
            instance = %event.instance,
            status = %event.status,
            "Alert forwarded"
        );
    }

    match state
        .setup
        .ensure(state.engine.as_ref(), &state.setup_scripts)
        .await
    {
        Ok(true) => tracing::info!("Alert/metric join and plots created"),
        Ok(false) => {}
        Err(e) => tracing::error!(error = %e, "One-time setup failed, will retry on next batch"),
    }

    tracing::info!(alerts = total, "Alert batch forwarded");
    Ok(ACK_BODY)
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
