//! REST API layer: route handlers, DTOs, OpenAPI, and router composition.
//!
//! All endpoints are mounted under `/api`.

pub mod dto;
pub mod handlers;
pub mod openapi;
pub mod rate_limit;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints, plus Swagger UI
/// at `/swagger-ui` when the `swagger-ui` feature is enabled. Upload limits
/// and the upload throttle are taken from `state`.
pub fn build_router(state: &AppState) -> Router<AppState> {
    let router = Router::new().nest("/api", handlers::routes(state));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router
}

/// Builds the API router with request tracing, permissive CORS and a
/// per-request timeout (408), bound to `state`.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// upload throttling can tell clients apart.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    build_router(&state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
