//! In-process implementation of the persistence layer.
//!
//! [`MemoryStore`] keeps the `users`, `reports`, and `violations` tables in
//! a single [`tokio::sync::RwLock`]. Reads take the shared lock and writes
//! the exclusive one, so a report and its violations become visible
//! together. The schema's constraints are emulated: unique usernames and
//! emails (across deactivated accounts too), the `VARCHAR(255)` widths,
//! the `NUMERIC(10, 8)` / `NUMERIC(11, 8)` coordinate precision, and
//! cascade delete.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::{ReportStore, UserStore};
use crate::domain::kpi::DateCount;
use crate::domain::report::{TEXT_COLUMN_MAX, round_coordinate};
use crate::domain::{
    GroupCount, KpiDimension, KpiScope, NewReport, NewUser, ProfileUpdate, ReportDetail,
    ReportId, StoredViolation, User, UserId, ViolationFilter, ViolationView,
};
use crate::error::ApiError;

#[derive(Debug, Clone)]
struct ReportRecord {
    drone_id: String,
    date: NaiveDate,
    location: String,
    uploaded_by: Option<UserId>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    reports: BTreeMap<ReportId, ReportRecord>,
    violations: BTreeMap<i64, StoredViolation>,
    last_user_id: i64,
    last_report_id: i64,
    last_violation_id: i64,
}

impl Tables {
    fn username_of(&self, id: Option<UserId>) -> Option<String> {
        id.and_then(|id| self.users.get(&id))
            .map(|u| u.username.clone())
    }

    /// Violations joined with their report, restricted to `scope`.
    fn scoped<'a>(
        &'a self,
        scope: &'a KpiScope,
    ) -> impl Iterator<Item = (&'a StoredViolation, &'a ReportRecord)> + 'a {
        self.violations.values().filter_map(move |v| {
            self.reports
                .get(&v.report_id)
                .filter(|r| scope.matches(&r.drone_id, r.date))
                .map(|r| (v, r))
        })
    }

    fn taken(&self, username: Option<&str>, email: Option<&str>, except: Option<UserId>) -> bool {
        self.users.values().any(|u| {
            Some(u.id) != except
                && (username == Some(u.username.as_str()) || email == Some(u.email.as_str()))
        })
    }
}

/// Checks a coordinate against a `NUMERIC(p, 8)` column with
/// `integer_digits = p - 8`, returning the rounded value.
fn fit_numeric(value: f64, integer_digits: i32, column: &str) -> Result<f64, ApiError> {
    let rounded = round_coordinate(value);
    if rounded.abs() >= 10f64.powi(integer_digits) {
        return Err(ApiError::Store(format!(
            "numeric field overflow in column \"{column}\""
        )));
    }
    Ok(rounded)
}

/// Checks a value against a `VARCHAR(255)` column.
fn fit_varchar(value: &str, column: &str) -> Result<String, ApiError> {
    if value.chars().count() > TEXT_COLUMN_MAX {
        return Err(ApiError::Store(format!(
            "value too long for type character varying({TEXT_COLUMN_MAX}) in column \"{column}\""
        )));
    }
    Ok(value.to_string())
}

fn user_conflict() -> ApiError {
    ApiError::Conflict("Username or email already exists".to_string())
}

/// Process-local store for tests and the `STORE_BACKEND=memory` mode.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn create_report_with_violations(
        &self,
        report: &NewReport,
    ) -> Result<ReportId, ApiError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&report.uploaded_by) {
            return Err(ApiError::Store(
                "insert on table \"reports\" violates foreign key constraint".to_string(),
            ));
        }

        let report_id = ReportId::new(tables.last_report_id + 1);
        let now = Utc::now();
        let record = ReportRecord {
            drone_id: fit_varchar(&report.drone_id, "drone_id")?,
            date: report.date,
            location: fit_varchar(&report.location, "location")?,
            uploaded_by: Some(report.uploaded_by),
            created_at: now,
        };

        // Build every row before touching the tables so a failure leaves
        // nothing behind.
        let mut rows = Vec::with_capacity(report.violations.len());
        for (offset, violation) in (1_i64..).zip(&report.violations) {
            rows.push(StoredViolation {
                id: tables.last_violation_id + offset,
                report_id,
                violation_id: fit_varchar(&violation.violation_id, "violation_id")?,
                violation_type: fit_varchar(&violation.violation_type, "type")?,
                timestamp: violation.timestamp,
                latitude: fit_numeric(violation.latitude, 2, "latitude")?,
                longitude: fit_numeric(violation.longitude, 3, "longitude")?,
                image_url: violation.image_url.clone(),
                created_at: now,
            });
        }

        tables.last_report_id = report_id.get();
        tables.reports.insert(report_id, record);
        for row in rows {
            tables.last_violation_id = row.id;
            tables.violations.insert(row.id, row);
        }
        Ok(report_id)
    }

    async fn find_report_by_id(&self, id: ReportId) -> Result<Option<ReportDetail>, ApiError> {
        let tables = self.tables.read().await;
        let Some(report) = tables.reports.get(&id) else {
            return Ok(None);
        };
        let mut violations: Vec<StoredViolation> = tables
            .violations
            .values()
            .filter(|v| v.report_id == id)
            .cloned()
            .collect();
        violations.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        Ok(Some(ReportDetail {
            id,
            drone_id: report.drone_id.clone(),
            date: report.date,
            location: report.location.clone(),
            uploaded_by: tables.username_of(report.uploaded_by),
            created_at: report.created_at,
            violations,
        }))
    }

    async fn delete_report(&self, id: ReportId) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        if tables.reports.remove(&id).is_none() {
            return Ok(false);
        }
        tables.violations.retain(|_, v| v.report_id != id);
        Ok(true)
    }

    async fn list_violations(
        &self,
        filter: &ViolationFilter,
    ) -> Result<Vec<ViolationView>, ApiError> {
        let tables = self.tables.read().await;
        let mut matched: Vec<(&StoredViolation, &ReportRecord)> = tables
            .scoped(&filter.scope)
            .filter(|(v, r)| filter.matches(&r.drone_id, r.date, &v.violation_type))
            .collect();
        matched.sort_by(|(va, ra), (vb, rb)| {
            rb.date
                .cmp(&ra.date)
                .then(vb.timestamp.cmp(&va.timestamp))
                .then(vb.id.cmp(&va.id))
        });

        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(v, r)| ViolationView {
                violation_id: v.violation_id.clone(),
                violation_type: v.violation_type.clone(),
                timestamp: v.timestamp,
                latitude: v.latitude,
                longitude: v.longitude,
                image_url: v.image_url.clone(),
                drone_id: r.drone_id.clone(),
                date: r.date,
                location: r.location.clone(),
                created_at: v.created_at,
                uploaded_by: tables.username_of(r.uploaded_by),
            })
            .collect())
    }

    async fn count_violations(&self, scope: &KpiScope) -> Result<i64, ApiError> {
        let tables = self.tables.read().await;
        let total = tables.scoped(scope).count();
        Ok(i64::try_from(total).unwrap_or(i64::MAX))
    }

    async fn count_grouped(
        &self,
        scope: &KpiScope,
        dimension: KpiDimension,
    ) -> Result<Vec<GroupCount>, ApiError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for (violation, report) in tables.scoped(scope) {
            let key = match dimension {
                KpiDimension::ViolationType => violation.violation_type.as_str(),
                KpiDimension::Drone => report.drone_id.as_str(),
                KpiDimension::Location => report.location.as_str(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        let mut buckets: Vec<GroupCount> = counts
            .into_iter()
            .map(|(key, count)| GroupCount {
                key: key.to_string(),
                count,
            })
            .collect();
        buckets.sort_by(GroupCount::frequency_order);
        Ok(buckets)
    }

    async fn count_over_time(&self, scope: &KpiScope) -> Result<Vec<DateCount>, ApiError> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for (_, report) in tables.scoped(scope) {
            *counts.entry(report.date).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(date, count)| DateCount { date, count })
            .collect())
    }

    async fn distinct_drone_ids(&self) -> Result<Vec<String>, ApiError> {
        let tables = self.tables.read().await;
        let ids: BTreeSet<&str> = tables.reports.values().map(|r| r.drone_id.as_str()).collect();
        Ok(ids.into_iter().map(str::to_string).collect())
    }

    async fn distinct_dates(&self) -> Result<Vec<NaiveDate>, ApiError> {
        let tables = self.tables.read().await;
        let dates: BTreeSet<NaiveDate> = tables.reports.values().map(|r| r.date).collect();
        Ok(dates.into_iter().rev().collect())
    }

    async fn distinct_types(&self) -> Result<Vec<String>, ApiError> {
        let tables = self.tables.read().await;
        let types: BTreeSet<&str> = tables
            .violations
            .values()
            .map(|v| v.violation_type.as_str())
            .collect();
        Ok(types.into_iter().map(str::to_string).collect())
    }

    async fn ping(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let mut tables = self.tables.write().await;
        if tables.taken(Some(&user.username), Some(&user.email), None) {
            return Err(user_conflict());
        }
        let id = UserId::new(tables.last_user_id + 1);
        let now = Utc::now();
        let row = User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        };
        tables.last_user_id = id.get();
        tables.users.insert(id, row.clone());
        Ok(row)
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.is_active && u.email == email)
            .cloned())
    }

    async fn find_active_by_id(&self, id: UserId) -> Result<Option<User>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).filter(|u| u.is_active).cloned())
    }

    async fn update_last_login(&self, id: UserId) -> Result<(), ApiError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, ApiError> {
        let mut tables = self.tables.write().await;
        if !tables.users.get(&id).is_some_and(|u| u.is_active) {
            return Ok(None);
        }
        if tables.taken(update.username.as_deref(), update.email.as_deref(), Some(id)) {
            return Err(user_conflict());
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(username) = &update.username {
            user.username.clone_from(username);
        }
        if let Some(email) = &update.email {
            user.email.clone_from(email);
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), ApiError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            password_hash.clone_into(&mut user.password_hash);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_users(&self, limit: u32, offset: u64) -> Result<Vec<User>, ApiError> {
        let tables = self.tables.read().await;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        // Ids grow with creation time, so reverse id order is newest first.
        Ok(tables
            .users
            .values()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn deactivate_user(&self, id: UserId) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) if user.is_active => {
                user.is_active = false;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_users(&self) -> Result<i64, ApiError> {
        let tables = self.tables.read().await;
        Ok(i64::try_from(tables.users.len()).unwrap_or(i64::MAX))
    }
}
