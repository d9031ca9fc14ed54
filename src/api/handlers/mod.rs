//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod auth;
pub mod reports;
pub mod system;

use std::sync::Arc;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes; mounted under `/api`.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest(
            "/reports",
            reports::routes(state.max_upload_bytes, Arc::clone(&state.upload_limiter)),
        )
        .nest("/admin", admin::routes())
        .merge(system::routes())
}
