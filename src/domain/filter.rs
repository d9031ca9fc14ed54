//! Query filters for the violation listing and the KPI summary.
//!
//! Both endpoints receive their parameters as raw query strings; the
//! parsers here turn them into typed filters or an
//! [`ApiError::InvalidFilter`] naming the offending parameter.

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;

/// Largest page the listing will return.
pub const MAX_LIMIT: u32 = 1000;

/// Page size when `limit` is omitted.
pub const DEFAULT_LIMIT: u32 = MAX_LIMIT;

/// Calendar date format accepted in filters and uploads.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Drone / date scope shared by every KPI aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct KpiScope {
    /// Exact drone id match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drone_id: Option<String>,
    /// Exact report date match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl KpiScope {
    /// Builds a scope from raw query values. Empty strings are treated as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidFilter`] when `date` is not `YYYY-MM-DD`.
    pub fn parse(drone_id: Option<&str>, date: Option<&str>) -> Result<Self, ApiError> {
        Ok(Self {
            drone_id: non_empty(drone_id),
            date: parse_date("date", date)?,
        })
    }

    /// Returns `true` when a report with the given drone and date is in scope.
    #[must_use]
    pub fn matches(&self, drone_id: &str, date: NaiveDate) -> bool {
        self.drone_id.as_deref().is_none_or(|d| d == drone_id)
            && self.date.is_none_or(|d| d == date)
    }
}

/// Filter and page for the flat violation listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ViolationFilter {
    /// Drone / date scope.
    #[serde(flatten)]
    pub scope: KpiScope,
    /// Exact violation type match.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub violation_type: Option<String>,
    /// Page size, 1..=1000.
    pub limit: u32,
    /// Rows to skip.
    pub offset: u64,
}

impl Default for ViolationFilter {
    fn default() -> Self {
        Self {
            scope: KpiScope::default(),
            violation_type: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl ViolationFilter {
    /// Builds a listing filter from raw query values.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidFilter`] when `limit` is not an integer
    /// in `1..=1000`, `offset` is not a non-negative integer, or `date` is
    /// not `YYYY-MM-DD`.
    pub fn parse(
        drone_id: Option<&str>,
        date: Option<&str>,
        violation_type: Option<&str>,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Result<Self, ApiError> {
        let scope = KpiScope::parse(drone_id, date)?;
        let limit = match parse_integer("limit", limit)? {
            None => DEFAULT_LIMIT,
            Some(n) if n < 1 => {
                return Err(ApiError::InvalidFilter(
                    "\"limit\" must be greater than or equal to 1".to_string(),
                ));
            }
            Some(n) if n > i64::from(MAX_LIMIT) => {
                return Err(ApiError::InvalidFilter(format!(
                    "\"limit\" must be less than or equal to {MAX_LIMIT}"
                )));
            }
            Some(n) => u32::try_from(n).unwrap_or(MAX_LIMIT),
        };
        let offset = match parse_integer("offset", offset)? {
            None => 0,
            Some(n) => u64::try_from(n).map_err(|_| {
                ApiError::InvalidFilter(
                    "\"offset\" must be greater than or equal to 0".to_string(),
                )
            })?,
        };
        Ok(Self {
            scope,
            violation_type: non_empty(violation_type),
            limit,
            offset,
        })
    }

    /// Returns `true` when a violation of `violation_type` on the given
    /// report is selected by this filter (pagination aside).
    #[must_use]
    pub fn matches(&self, drone_id: &str, date: NaiveDate, violation_type: &str) -> bool {
        self.scope.matches(drone_id, date)
            && self
                .violation_type
                .as_deref()
                .is_none_or(|t| t == violation_type)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Parses an optional `YYYY-MM-DD` date parameter.
///
/// # Errors
///
/// Returns [`ApiError::InvalidFilter`] naming `field` on a malformed date.
pub fn parse_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .map_err(|_| {
                ApiError::InvalidFilter(format!("\"{field}\" must be a valid date (YYYY-MM-DD)"))
            }),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn parse_integer(field: &str, value: Option<&str>) -> Result<Option<i64>, ApiError> {
    let Some(raw) = value.map(str::trim) else {
        return Ok(None);
    };
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(Some(n));
    }
    // Integer-valued numbers in other notations ("10.0", "1e2") count as
    // integers; out-of-range magnitudes saturate and fail the bound checks.
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(Some(f as i64)),
        Ok(f) if f.is_finite() => Err(ApiError::InvalidFilter(format!(
            "\"{field}\" must be an integer"
        ))),
        _ => Err(ApiError::InvalidFilter(format!(
            "\"{field}\" must be a number"
        ))),
    }
}
