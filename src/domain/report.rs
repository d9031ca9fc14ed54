//! Reports, their violations, and the read views built from them.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ReportId, UserId};

/// Fractional digits kept for latitude / longitude.
pub const COORDINATE_SCALE: i32 = 8;

/// Width of the `VARCHAR` columns holding drone ids, locations, violation
/// ids and violation types.
pub const TEXT_COLUMN_MAX: usize = 255;

/// Rounds a coordinate to [`COORDINATE_SCALE`] fractional digits, matching
/// the `NUMERIC(_, 8)` columns.
#[must_use]
pub fn round_coordinate(value: f64) -> f64 {
    let factor = 10f64.powi(COORDINATE_SCALE);
    (value * factor).round() / factor
}

/// One violation as it arrives in an upload, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewViolation {
    /// Identifier assigned by the drone software. Not unique.
    pub violation_id: String,
    /// Free-form category (e.g. `"speed"`).
    pub violation_type: String,
    /// Time of day the violation was captured.
    pub timestamp: NaiveTime,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Link to the evidence image.
    pub image_url: String,
}

/// A validated report ready to be written in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    /// Drone that produced the report.
    pub drone_id: String,
    /// Calendar date of the flight.
    pub date: NaiveDate,
    /// Free-form location name.
    pub location: String,
    /// Authenticated uploader.
    pub uploaded_by: UserId,
    /// Child violations in document order.
    pub violations: Vec<NewViolation>,
}

/// A persisted violation row.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StoredViolation {
    /// Row id.
    pub id: i64,
    /// Owning report.
    pub report_id: ReportId,
    /// Identifier assigned by the drone software.
    pub violation_id: String,
    /// Violation category.
    #[serde(rename = "type")]
    pub violation_type: String,
    /// Time of day.
    pub timestamp: NaiveTime,
    /// Latitude, 8 fractional digits.
    pub latitude: f64,
    /// Longitude, 8 fractional digits.
    pub longitude: f64,
    /// Evidence image link.
    pub image_url: String,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
}

/// A report with its uploader's username and all of its violations,
/// ordered by time of day.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportDetail {
    /// Report id.
    pub id: ReportId,
    /// Drone that produced the report.
    pub drone_id: String,
    /// Calendar date of the flight.
    pub date: NaiveDate,
    /// Location name.
    pub location: String,
    /// Uploader's username; `null` once the uploader row is gone.
    pub uploaded_by: Option<String>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Child violations, earliest first.
    pub violations: Vec<StoredViolation>,
}

/// A violation joined with its report and uploader, as returned by the
/// filtered listing.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ViolationView {
    /// Identifier assigned by the drone software.
    pub violation_id: String,
    /// Violation category.
    #[serde(rename = "type")]
    pub violation_type: String,
    /// Time of day.
    pub timestamp: NaiveTime,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Evidence image link.
    pub image_url: String,
    /// Owning report's drone.
    pub drone_id: String,
    /// Owning report's date.
    pub date: NaiveDate,
    /// Owning report's location.
    pub location: String,
    /// Violation row creation time.
    pub created_at: DateTime<Utc>,
    /// Uploader's username, if the account still exists.
    pub uploaded_by: Option<String>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Generated report id.
    pub report_id: ReportId,
    /// Number of violation rows written.
    pub violations_count: usize,
}
