//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::models::{
    ReportRow, USER_COLUMNS, UserRow, ViolationRow, ViolationViewRow, user_from_row,
    view_from_row, violation_from_row,
};
use super::{ReportStore, UserStore};
use crate::config::AppConfig;
use crate::domain::kpi::DateCount;
use crate::domain::{
    GroupCount, KpiDimension, KpiScope, NewReport, NewUser, ProfileUpdate, ReportDetail,
    ReportId, User, UserId, ViolationFilter, ViolationView,
};
use crate::error::ApiError;

const VIOLATIONS_JOIN: &str = " FROM violations v JOIN reports r ON v.report_id = r.id";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized from configuration.
    ///
    /// # Errors
    ///
    /// Returns the underlying `sqlx` error if the database is unreachable.
    pub async fn connect(config: &AppConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded migrations in `migrations/`.
    ///
    /// # Errors
    ///
    /// Returns the migration error if any script fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Appends the drone / date predicates shared by the listing and all KPI
/// aggregates.
fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &KpiScope) {
    qb.push(" WHERE 1=1");
    if let Some(drone_id) = &scope.drone_id {
        qb.push(" AND r.drone_id = ").push_bind(drone_id.clone());
    }
    if let Some(date) = scope.date {
        qb.push(" AND r.date = ").push_bind(date);
    }
}

const fn dimension_column(dimension: KpiDimension) -> &'static str {
    match dimension {
        KpiDimension::ViolationType => "v.type",
        KpiDimension::Drone => "r.drone_id",
        KpiDimension::Location => "r.location",
    }
}

async fn insert_report_rows(
    tx: &mut Transaction<'_, Postgres>,
    report: &NewReport,
) -> Result<i64, sqlx::Error> {
    let report_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO reports (drone_id, date, location, uploaded_by) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&report.drone_id)
    .bind(report.date)
    .bind(&report.location)
    .bind(report.uploaded_by.get())
    .fetch_one(&mut **tx)
    .await?;

    for violation in &report.violations {
        sqlx::query(
            "INSERT INTO violations \
             (report_id, violation_id, type, timestamp, latitude, longitude, image_url) \
             VALUES ($1, $2, $3, $4, CAST($5 AS NUMERIC(10, 8)), CAST($6 AS NUMERIC(11, 8)), $7)",
        )
        .bind(report_id)
        .bind(&violation.violation_id)
        .bind(&violation.violation_type)
        .bind(violation.timestamp)
        .bind(violation.latitude)
        .bind(violation.longitude)
        .bind(&violation.image_url)
        .execute(&mut **tx)
        .await?;
    }

    Ok(report_id)
}

#[async_trait]
impl ReportStore for PgStore {
    async fn create_report_with_violations(
        &self,
        report: &NewReport,
    ) -> Result<ReportId, ApiError> {
        let mut tx = self.pool.begin().await?;
        match insert_report_rows(&mut tx, report).await {
            Ok(id) => {
                tx.commit().await?;
                Ok(ReportId::new(id))
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "report rollback failed");
                }
                Err(err.into())
            }
        }
    }

    async fn find_report_by_id(&self, id: ReportId) -> Result<Option<ReportDetail>, ApiError> {
        let report = sqlx::query_as::<_, ReportRow>(
            "SELECT r.id, r.drone_id, r.date, r.location, u.username, r.created_at \
             FROM reports r LEFT JOIN users u ON r.uploaded_by = u.id WHERE r.id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some((report_id, drone_id, date, location, uploaded_by, created_at)) = report else {
            return Ok(None);
        };

        let violations = sqlx::query_as::<_, ViolationRow>(
            "SELECT id, report_id, violation_id, type, timestamp, latitude::float8, \
             longitude::float8, image_url, created_at \
             FROM violations WHERE report_id = $1 ORDER BY timestamp ASC, id ASC",
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ReportDetail {
            id: ReportId::new(report_id),
            drone_id,
            date,
            location,
            uploaded_by,
            created_at,
            violations: violations.into_iter().map(violation_from_row).collect(),
        }))
    }

    async fn delete_report(&self, id: ReportId) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_violations(
        &self,
        filter: &ViolationFilter,
    ) -> Result<Vec<ViolationView>, ApiError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT v.violation_id, v.type, v.timestamp, v.latitude::float8, \
             v.longitude::float8, v.image_url, r.drone_id, r.date, r.location, \
             v.created_at, u.username",
        );
        qb.push(VIOLATIONS_JOIN)
            .push(" LEFT JOIN users u ON r.uploaded_by = u.id");
        push_scope(&mut qb, &filter.scope);
        if let Some(violation_type) = &filter.violation_type {
            qb.push(" AND v.type = ").push_bind(violation_type.clone());
        }
        qb.push(" ORDER BY r.date DESC, v.timestamp DESC, v.id DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(filter.offset).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<ViolationViewRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(view_from_row).collect())
    }

    async fn count_violations(&self, scope: &KpiScope) -> Result<i64, ApiError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        qb.push(VIOLATIONS_JOIN);
        push_scope(&mut qb, scope);
        let total = qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn count_grouped(
        &self,
        scope: &KpiScope,
        dimension: KpiDimension,
    ) -> Result<Vec<GroupCount>, ApiError> {
        let column = dimension_column(dimension);
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {column}, COUNT(*) AS count"));
        qb.push(VIOLATIONS_JOIN);
        push_scope(&mut qb, scope);
        qb.push(format!(
            " GROUP BY {column} ORDER BY count DESC, {column} COLLATE \"C\" ASC"
        ));

        let rows = qb
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(key, count)| GroupCount { key, count })
            .collect())
    }

    async fn count_over_time(&self, scope: &KpiScope) -> Result<Vec<DateCount>, ApiError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT r.date, COUNT(*) AS count");
        qb.push(VIOLATIONS_JOIN);
        push_scope(&mut qb, scope);
        qb.push(" GROUP BY r.date ORDER BY r.date ASC");

        let rows = qb
            .build_query_as::<(NaiveDate, i64)>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(date, count)| DateCount { date, count })
            .collect())
    }

    async fn distinct_drone_ids(&self) -> Result<Vec<String>, ApiError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT drone_id FROM reports GROUP BY drone_id ORDER BY drone_id COLLATE \"C\"",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn distinct_dates(&self) -> Result<Vec<NaiveDate>, ApiError> {
        let rows =
            sqlx::query_scalar::<_, NaiveDate>("SELECT DISTINCT date FROM reports ORDER BY date DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn distinct_types(&self) -> Result<Vec<String>, ApiError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT type FROM violations GROUP BY type ORDER BY type COLLATE \"C\"",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        user_from_row(row)
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active = true"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn find_active_by_id(&self, id: UserId) -> Result<Option<User>, ApiError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = true"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn update_last_login(&self, id: UserId) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Option<User>, ApiError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
        if let Some(username) = &update.username {
            qb.push(", username = ").push_bind(username.clone());
        }
        if let Some(email) = &update.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        qb.push(" WHERE id = ")
            .push_bind(id.get())
            .push(" AND is_active = true RETURNING ")
            .push(USER_COLUMNS);

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_users(&self, limit: u32, offset: u64) -> Result<Vec<User>, ApiError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(user_from_row).collect()
    }

    async fn deactivate_user(&self, id: UserId) -> Result<bool, ApiError> {
        let result = sqlx::query(
            "UPDATE users SET is_active = false, updated_at = NOW() \
             WHERE id = $1 AND is_active = true",
        )
        .bind(id.get())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> Result<i64, ApiError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
