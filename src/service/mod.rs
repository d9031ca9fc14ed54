//! Service layer: business logic orchestration.
//!
//! [`IngestionPipeline`] owns the write path for reports,
//! [`AggregationEngine`] the read path, and [`AuthService`] accounts and
//! tokens. Each holds an injected store handle; every store call goes
//! through [`bounded`] so a stalled database surfaces as
//! [`ApiError::StoreUnavailable`] instead of hanging the request.

pub mod aggregation;
pub mod auth_service;
pub mod ingestion;

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;

pub use aggregation::AggregationEngine;
pub use auth_service::{AuthService, Session};
pub use ingestion::IngestionPipeline;

/// Runs a store call with a deadline.
///
/// # Errors
///
/// Returns the call's own error, or [`ApiError::StoreUnavailable`] when
/// `limit` elapses first.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        tracing::warn!(timeout_ms = limit.as_millis(), "store call timed out");
        Err(ApiError::StoreUnavailable)
    })
}
