//! Report handlers: upload, listing, KPIs, filter options, get, delete.

use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    KpiQuery, MessageResponse, UploadResponse, ViolationListResponse, ViolationQuery,
};
use crate::api::rate_limit::{RateLimitLayer, RateLimiter};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{FilterOptions, KpiSummary, ReportDetail, ReportId, Role};
use crate::error::{ApiError, ErrorResponse};

/// Multipart field carrying the report document.
pub const REPORT_FIELD: &str = "report";

/// Slack above the file limit for multipart boundaries and part headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::Validation(err.body_text())
    }
}

fn is_json_part(field: &Field<'_>) -> bool {
    field
        .content_type()
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Reads the `report` part, enforcing its media type and size.
async fn read_report_part(multipart: &mut Multipart, limit: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(REPORT_FIELD) {
            continue;
        }
        if !is_json_part(&field) {
            return Err(ApiError::UnsupportedMediaType);
        }
        let mut raw = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            if raw.len().saturating_add(chunk.len()) > limit {
                return Err(ApiError::PayloadTooLarge);
            }
            raw.extend_from_slice(&chunk);
        }
        return Ok(raw);
    }
    Err(ApiError::MissingFile)
}

fn parse_report_id(raw: &str) -> Result<ReportId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation("Invalid report ID".to_string()))
}

/// `POST /reports/upload` — Ingest a report document.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for viewers, a 400/413/415 variant for
/// a rejected upload, and store errors from the insert.
#[utoipa::path(
    post,
    path = "/api/reports/upload",
    tag = "Reports",
    summary = "Upload a report",
    description = "Accepts a multipart form whose `report` part is a JSON document (`application/json`, at most 10 MiB by default). The report and all of its violations are stored atomically.",
    security(("bearer_auth" = [])),
    request_body(content_type = "multipart/form-data", description = "Form with a `report` file part"),
    responses(
        (status = 200, description = "Report stored", body = UploadResponse),
        (status = 400, description = "Missing, empty, malformed or invalid document", body = ErrorResponse),
        (status = 403, description = "Role may not upload", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "Part is not JSON", body = ErrorResponse),
        (status = 429, description = "Too many uploads from this client", body = ErrorResponse),
    )
)]
pub async fn upload_report(
    State(state): State<AppState>,
    caller: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    caller.require(&[Role::User, Role::Admin])?;
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "upload is not a multipart form");
        ApiError::MissingFile
    })?;
    let raw = read_report_part(&mut multipart, state.max_upload_bytes).await?;
    let outcome = state.ingestion.ingest(&raw, caller.id).await?;
    Ok(Json(UploadResponse::from(outcome)))
}

/// `GET /reports/violations` — Filtered, paginated violations.
///
/// # Errors
///
/// Returns [`ApiError::InvalidFilter`] for bad query values.
#[utoipa::path(
    get,
    path = "/api/reports/violations",
    tag = "Reports",
    summary = "List violations",
    description = "Violations ordered by report date, then time of day, newest first.",
    security(("bearer_auth" = [])),
    params(ViolationQuery),
    responses(
        (status = 200, description = "One page of violations", body = ViolationListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn list_violations(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(query): Query<ViolationQuery>,
) -> Result<Json<ViolationListResponse>, ApiError> {
    let filter = query.to_filter()?;
    let violations = state.aggregation.list_violations(&filter).await?;
    Ok(Json(ViolationListResponse {
        total: violations.len(),
        violations,
        filters: filter,
    }))
}

/// `GET /reports/kpis` — Aggregates for the dashboard.
///
/// # Errors
///
/// Returns [`ApiError::InvalidFilter`] for a malformed date.
#[utoipa::path(
    get,
    path = "/api/reports/kpis",
    tag = "Reports",
    summary = "KPI summary",
    description = "Total, per-type, per-drone, per-location and per-date violation counts under one shared filter.",
    security(("bearer_auth" = [])),
    params(KpiQuery),
    responses(
        (status = 200, description = "KPI summary", body = KpiSummary),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn get_kpis(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(query): Query<KpiQuery>,
) -> Result<Json<KpiSummary>, ApiError> {
    let scope = query.to_scope()?;
    Ok(Json(state.aggregation.compute_kpis(&scope).await?))
}

/// `GET /reports/filters` — Values available for the dashboard filters.
///
/// # Errors
///
/// Propagates store failures.
#[utoipa::path(
    get,
    path = "/api/reports/filters",
    tag = "Reports",
    summary = "Filter options",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Distinct drone ids, dates and types", body = FilterOptions),
    )
)]
pub async fn get_filter_options(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<FilterOptions>, ApiError> {
    Ok(Json(state.aggregation.filter_options().await?))
}

/// `GET /reports/{id}` — One report with its violations.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] for a non-numeric id and
/// [`ApiError::NotFound`] for an unknown one.
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    tag = "Reports",
    summary = "Get report",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report with violations", body = ReportDetail),
        (status = 400, description = "Invalid report ID", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse),
    )
)]
pub async fn get_report(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ReportDetail>, ApiError> {
    let id = parse_report_id(&id)?;
    Ok(Json(state.aggregation.find_report(id).await?))
}

/// `DELETE /reports/{id}` — Remove a report and its violations.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins,
/// [`ApiError::Validation`] for a non-numeric id and
/// [`ApiError::NotFound`] for an unknown one.
#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    tag = "Reports",
    summary = "Delete report",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Report id")),
    responses(
        (status = 200, description = "Report deleted", body = MessageResponse),
        (status = 400, description = "Invalid report ID", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse),
    )
)]
pub async fn delete_report(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let id = parse_report_id(&id)?;
    state.ingestion.delete_report(id).await?;
    Ok(Json(MessageResponse::new("Report deleted successfully")))
}

/// Report routes, nested under `/api/reports`. The upload route accepts
/// bodies up to `max_upload_bytes` plus multipart framing and is throttled
/// per client by `upload_limiter` before anything else runs.
pub fn routes(max_upload_bytes: usize, upload_limiter: Arc<RateLimiter>) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(upload_report)
                .layer::<_, std::convert::Infallible>(DefaultBodyLimit::max(
                    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
                ))
                .layer(RateLimitLayer::new(upload_limiter)),
        )
        .route("/violations", get(list_violations))
        .route("/kpis", get(get_kpis))
        .route("/filters", get(get_filter_options))
        .route("/{id}", get(get_report).delete(delete_report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_ids_must_be_numeric() {
        assert_eq!(parse_report_id("42").ok(), Some(ReportId::new(42)));
        assert!(matches!(
            parse_report_id("abc"),
            Err(ApiError::Validation(msg)) if msg == "Invalid report ID"
        ));
        assert!(parse_report_id("4.2").is_err());
    }
}
