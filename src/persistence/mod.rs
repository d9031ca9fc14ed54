//! Persistence layer: report and credential stores.
//!
//! Services depend on the [`ReportStore`] and [`UserStore`] capability
//! traits rather than a database handle. [`postgres::PgStore`] implements
//! both against PostgreSQL with `sqlx`; [`memory::MemoryStore`] keeps the
//! same tables in process for tests and demos and emulates the schema's
//! unique, precision, and cascade constraints.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::kpi::DateCount;
use crate::domain::{
    GroupCount, KpiDimension, KpiScope, NewReport, NewUser, ProfileUpdate, ReportDetail,
    ReportId, User, UserId, ViolationFilter, ViolationView,
};
use crate::error::ApiError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage for reports and their violations.
///
/// Every method is a single statement except
/// [`ReportStore::create_report_with_violations`], which must write the
/// report and all of its violations atomically.
#[async_trait]
pub trait ReportStore: Send + Sync + Debug {
    /// Inserts one report and its violations in one transaction. On any
    /// failure nothing is persisted.
    ///
    /// # Errors
    ///
    /// [`ApiError::Conflict`] on a unique violation, [`ApiError::Store`]
    /// on any other failure.
    async fn create_report_with_violations(&self, report: &NewReport)
    -> Result<ReportId, ApiError>;

    /// Loads a report with its uploader name and violations ordered by
    /// time of day.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn find_report_by_id(&self, id: ReportId) -> Result<Option<ReportDetail>, ApiError>;

    /// Deletes a report and, by cascade, its violations. Returns whether a
    /// row existed.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn delete_report(&self, id: ReportId) -> Result<bool, ApiError>;

    /// Filtered, paginated listing ordered by report date then time of day,
    /// newest first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn list_violations(&self, filter: &ViolationFilter)
    -> Result<Vec<ViolationView>, ApiError>;

    /// Counts violations in scope.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn count_violations(&self, scope: &KpiScope) -> Result<i64, ApiError>;

    /// Counts violations in scope grouped by `dimension`, in frequency order.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn count_grouped(
        &self,
        scope: &KpiScope,
        dimension: KpiDimension,
    ) -> Result<Vec<GroupCount>, ApiError>;

    /// Counts violations in scope per report date, oldest first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn count_over_time(&self, scope: &KpiScope) -> Result<Vec<DateCount>, ApiError>;

    /// Distinct drone ids across all reports, ascending.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn distinct_drone_ids(&self) -> Result<Vec<String>, ApiError>;

    /// Distinct report dates, newest first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn distinct_dates(&self) -> Result<Vec<NaiveDate>, ApiError>;

    /// Distinct violation types, ascending.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn distinct_types(&self) -> Result<Vec<String>, ApiError>;

    /// Cheap liveness check.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] when the store cannot be reached.
    async fn ping(&self) -> Result<(), ApiError>;
}

/// Storage for user accounts.
///
/// Username and email uniqueness covers deactivated accounts too.
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Inserts a user and returns the stored row.
    ///
    /// # Errors
    ///
    /// [`ApiError::Conflict`] when the username or email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError>;

    /// Looks up an active user by email.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    /// Looks up an active user by id.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn find_active_by_id(&self, id: UserId) -> Result<Option<User>, ApiError>;

    /// Stamps the current time as the user's last login.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn update_last_login(&self, id: UserId) -> Result<(), ApiError>;

    /// Applies a partial profile update to an active user and returns the
    /// updated row, or `None` when the user does not exist.
    ///
    /// # Errors
    ///
    /// [`ApiError::Conflict`] when the new username or email is taken.
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, ApiError>;

    /// Replaces the stored password hash.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), ApiError>;

    /// Lists users (active or not), newest first.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn list_users(&self, limit: u32, offset: u64) -> Result<Vec<User>, ApiError>;

    /// Clears the active flag. Returns whether an active user was found.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn deactivate_user(&self, id: UserId) -> Result<bool, ApiError>;

    /// Counts all user rows.
    ///
    /// # Errors
    ///
    /// [`ApiError::Store`] on database failure.
    async fn count_users(&self) -> Result<i64, ApiError>;
}
