//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Store connectivity as seen by the health check.
#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseStatus {
    /// Whether the store answered the liveness check.
    pub connected: bool,
    /// Failure summary when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    database: DatabaseStatus,
}

/// `GET /health` — Service and store health.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service status, version, current timestamp and store connectivity.",
    responses(
        (status = 200, description = "Service and store are healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label, database) = match state.aggregation.ping().await {
        Ok(()) => (
            StatusCode::OK,
            "OK",
            DatabaseStatus {
                connected: true,
                error: None,
            },
        ),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "ERROR",
                DatabaseStatus {
                    connected: false,
                    error: Some(err.public_message()),
                },
            )
        }
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
        }),
    )
}

/// System routes, nested under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
