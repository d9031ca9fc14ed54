//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::api::rate_limit::{RateLimitConfig, RateLimiter};
use crate::auth::TokenService;
use crate::persistence::{ReportStore, UserStore};
use crate::service::{AggregationEngine, AuthService, IngestionPipeline};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Report write path.
    pub ingestion: Arc<IngestionPipeline>,
    /// Report read path.
    pub aggregation: Arc<AggregationEngine>,
    /// Accounts and token resolution.
    pub auth: Arc<AuthService>,
    /// Largest accepted report file, in bytes.
    pub max_upload_bytes: usize,
    /// Per-client throttle on report uploads.
    pub upload_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires the three services over the given stores.
    #[must_use]
    pub fn new(
        reports: Arc<dyn ReportStore>,
        users: Arc<dyn UserStore>,
        tokens: TokenService,
        store_timeout: Duration,
        max_upload_bytes: usize,
        upload_limit: RateLimitConfig,
    ) -> Self {
        Self {
            ingestion: Arc::new(IngestionPipeline::new(Arc::clone(&reports), store_timeout)),
            aggregation: Arc::new(AggregationEngine::new(reports, store_timeout)),
            auth: Arc::new(AuthService::new(users, tokens, store_timeout)),
            max_upload_bytes,
            upload_limiter: Arc::new(RateLimiter::new(upload_limit)),
        }
    }
}
