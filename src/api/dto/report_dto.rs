//! Query parameters and responses for `/api/reports`.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{IngestOutcome, KpiScope, ReportId, ViolationFilter, ViolationView};
use crate::error::ApiError;

/// `GET /api/reports/violations` query. Values arrive as raw strings so
/// that bounds and type errors can be reported per field.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ViolationQuery {
    /// Exact drone id.
    pub drone_id: Option<String>,
    /// Report date, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Exact violation type.
    #[serde(rename = "type")]
    pub violation_type: Option<String>,
    /// Page size, 1 to 1000. Defaults to 1000.
    pub limit: Option<String>,
    /// Rows to skip. Defaults to 0.
    pub offset: Option<String>,
}

impl ViolationQuery {
    /// Parses into a typed filter.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidFilter`] for out-of-range or mistyped values.
    pub fn to_filter(&self) -> Result<ViolationFilter, ApiError> {
        ViolationFilter::parse(
            self.drone_id.as_deref(),
            self.date.as_deref(),
            self.violation_type.as_deref(),
            self.limit.as_deref(),
            self.offset.as_deref(),
        )
    }
}

/// `GET /api/reports/kpis` query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct KpiQuery {
    /// Exact drone id.
    pub drone_id: Option<String>,
    /// Report date, `YYYY-MM-DD`.
    pub date: Option<String>,
}

impl KpiQuery {
    /// Parses into a typed scope.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidFilter`] for a malformed date.
    pub fn to_scope(&self) -> Result<KpiScope, ApiError> {
        KpiScope::parse(self.drone_id.as_deref(), self.date.as_deref())
    }
}

/// `POST /api/reports/upload` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Outcome message.
    pub message: String,
    /// Id of the new report.
    pub report_id: ReportId,
    /// Number of violations stored with it.
    pub violations_count: usize,
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            message: "Report uploaded successfully".to_string(),
            report_id: outcome.report_id,
            violations_count: outcome.violations_count,
        }
    }
}

/// `GET /api/reports/violations` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ViolationListResponse {
    /// One page of violations.
    pub violations: Vec<ViolationView>,
    /// Rows in this page.
    pub total: usize,
    /// The filter as applied, defaults included.
    pub filters: ViolationFilter,
}
