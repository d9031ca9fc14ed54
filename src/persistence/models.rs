//! Database row shapes and their conversion into domain types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::domain::{ReportId, Role, StoredViolation, User, UserId, ViolationView};
use crate::error::ApiError;

/// Column list matching [`UserRow`].
pub const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, created_at, updated_at, last_login, is_active";

/// A row from the `users` table.
pub type UserRow = (
    i64,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    bool,
);

/// A row from the `violations` table with coordinates cast to `float8`.
pub type ViolationRow = (
    i64,
    i64,
    String,
    String,
    NaiveTime,
    f64,
    f64,
    String,
    DateTime<Utc>,
);

/// A violation joined with its report and uploader.
pub type ViolationViewRow = (
    String,
    String,
    NaiveTime,
    f64,
    f64,
    String,
    String,
    NaiveDate,
    String,
    DateTime<Utc>,
    Option<String>,
);

/// A report joined with its uploader's username.
pub type ReportRow = (i64, String, NaiveDate, String, Option<String>, DateTime<Utc>);

/// Converts a [`UserRow`] into a [`User`].
///
/// # Errors
///
/// Returns [`ApiError::Store`] if the role column holds an unknown value.
pub fn user_from_row(row: UserRow) -> Result<User, ApiError> {
    let (id, username, email, password_hash, role, created_at, updated_at, last_login, is_active) =
        row;
    let role = role.parse::<Role>().map_err(ApiError::Store)?;
    Ok(User {
        id: UserId::new(id),
        username,
        email,
        password_hash,
        role,
        created_at,
        updated_at,
        last_login,
        is_active,
    })
}

/// Converts a [`ViolationRow`] into a [`StoredViolation`].
#[must_use]
pub fn violation_from_row(row: ViolationRow) -> StoredViolation {
    let (
        id,
        report_id,
        violation_id,
        violation_type,
        timestamp,
        latitude,
        longitude,
        image_url,
        created_at,
    ) = row;
    StoredViolation {
        id,
        report_id: ReportId::new(report_id),
        violation_id,
        violation_type,
        timestamp,
        latitude,
        longitude,
        image_url,
        created_at,
    }
}

/// Converts a [`ViolationViewRow`] into a [`ViolationView`].
#[must_use]
pub fn view_from_row(row: ViolationViewRow) -> ViolationView {
    let (
        violation_id,
        violation_type,
        timestamp,
        latitude,
        longitude,
        image_url,
        drone_id,
        date,
        location,
        created_at,
        uploaded_by,
    ) = row;
    ViolationView {
        violation_id,
        violation_type,
        timestamp,
        latitude,
        longitude,
        image_url,
        drone_id,
        date,
        location,
        created_at,
        uploaded_by,
    }
}
