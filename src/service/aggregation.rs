//! Aggregation engine: filtered listings, KPI summaries, and filter-option
//! discovery over stored violations.

use std::sync::Arc;
use std::time::Duration;

use super::bounded;
use crate::domain::kpi::{DroneCount, LocationCount, TypeCount};
use crate::domain::{
    FilterOptions, KpiDimension, KpiScope, KpiSummary, ReportDetail, ReportId, ViolationFilter,
    ViolationView,
};
use crate::error::ApiError;
use crate::persistence::ReportStore;

/// Read side of the report store.
///
/// KPI aggregates are five independent reads issued concurrently and
/// joined; each is its own statement, so a concurrent upload may land
/// between them.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    store: Arc<dyn ReportStore>,
    timeout: Duration,
}

impl AggregationEngine {
    /// Creates an engine reading from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns one page of violations matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures and timeouts.
    pub async fn list_violations(
        &self,
        filter: &ViolationFilter,
    ) -> Result<Vec<ViolationView>, ApiError> {
        bounded(self.timeout, self.store.list_violations(filter)).await
    }

    /// Computes all five KPI aggregates for `scope`.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any of the five reads fails.
    pub async fn compute_kpis(&self, scope: &KpiScope) -> Result<KpiSummary, ApiError> {
        let store = &self.store;
        let limit = self.timeout;
        let (total, by_type, by_drone, by_location, over_time) = tokio::try_join!(
            bounded(limit, store.count_violations(scope)),
            bounded(limit, store.count_grouped(scope, KpiDimension::ViolationType)),
            bounded(limit, store.count_grouped(scope, KpiDimension::Drone)),
            bounded(limit, store.count_grouped(scope, KpiDimension::Location)),
            bounded(limit, store.count_over_time(scope)),
        )?;

        Ok(KpiSummary {
            total,
            by_type: by_type
                .into_iter()
                .map(|g| TypeCount {
                    violation_type: g.key,
                    count: g.count,
                })
                .collect(),
            by_drone: by_drone
                .into_iter()
                .map(|g| DroneCount {
                    drone_id: g.key,
                    count: g.count,
                })
                .collect(),
            by_location: by_location
                .into_iter()
                .map(|g| LocationCount {
                    location: g.key,
                    count: g.count,
                })
                .collect(),
            over_time,
        })
    }

    /// Distinct drone ids, report dates and violation types.
    ///
    /// # Errors
    ///
    /// Propagates store failures and timeouts.
    pub async fn filter_options(&self) -> Result<FilterOptions, ApiError> {
        let store = &self.store;
        let (drone_ids, dates, types) = tokio::try_join!(
            bounded(self.timeout, store.distinct_drone_ids()),
            bounded(self.timeout, store.distinct_dates()),
            bounded(self.timeout, store.distinct_types()),
        )?;
        Ok(FilterOptions {
            drone_ids,
            dates,
            types,
        })
    }

    /// Loads one report with its violations.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if no such report exists.
    pub async fn find_report(&self, id: ReportId) -> Result<ReportDetail, ApiError> {
        bounded(self.timeout, self.store.find_report_by_id(id))
            .await?
            .ok_or_else(|| ApiError::NotFound("Report not found".to_string()))
    }

    /// Store liveness.
    ///
    /// # Errors
    ///
    /// Returns the store's error when it cannot be reached.
    pub async fn ping(&self) -> Result<(), ApiError> {
        bounded(self.timeout, self.store.ping()).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::domain::{NewReport, NewUser, NewViolation, Role, UserId};
    use crate::persistence::{MemoryStore, UserStore};

    fn violation(id: &str, kind: &str, time: &str) -> NewViolation {
        NewViolation {
            violation_id: id.to_string(),
            violation_type: kind.to_string(),
            timestamp: NaiveTime::parse_from_str(time, "%H:%M").unwrap_or_default(),
            latitude: 10.5,
            longitude: 20.25,
            image_url: format!("https://img.example/{id}.jpg"),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap_or_default()
    }

    /// Three reports: D1 on the 1st and 2nd at two locations, D2 on the 2nd.
    async fn seeded() -> (Arc<MemoryStore>, AggregationEngine) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create_user(&NewUser {
                username: "pilot".to_string(),
                email: "pilot@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            })
            .await;
        let Ok(user) = user else {
            panic!("user creation failed");
        };
        let reports = [
            ("D1", day(1), "North", vec![
                violation("a", "speed", "09:00"),
                violation("b", "altitude", "11:00"),
                violation("c", "speed", "10:00"),
            ]),
            ("D1", day(2), "South", vec![violation("d", "zone", "08:00")]),
            ("D2", day(2), "North", vec![
                violation("e", "speed", "12:00"),
                violation("f", "zone", "07:00"),
            ]),
        ];
        for (drone, date, location, violations) in reports {
            let result = store
                .create_report_with_violations(&NewReport {
                    drone_id: drone.to_string(),
                    date,
                    location: location.to_string(),
                    uploaded_by: user.id,
                    violations,
                })
                .await;
            assert!(result.is_ok());
        }
        let engine = AggregationEngine::new(
            Arc::clone(&store) as Arc<dyn ReportStore>,
            Duration::from_secs(5),
        );
        (store, engine)
    }

    fn sum<T>(items: &[T], count: impl Fn(&T) -> i64) -> i64 {
        items.iter().map(count).sum()
    }

    #[tokio::test]
    async fn listing_orders_by_date_then_time_of_day() {
        let (_store, engine) = seeded().await;
        let filter = ViolationFilter {
            scope: KpiScope {
                drone_id: Some("D1".to_string()),
                date: Some(day(1)),
            },
            ..ViolationFilter::default()
        };
        let Ok(rows) = engine.list_violations(&filter).await else {
            panic!("listing failed");
        };
        let ids: Vec<&str> = rows.iter().map(|v| v.violation_id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert!(rows.iter().all(|v| v.uploaded_by.as_deref() == Some("pilot")));
    }

    #[tokio::test]
    async fn listing_across_dates_and_pages() {
        let (_store, engine) = seeded().await;
        let Ok(all) = engine.list_violations(&ViolationFilter::default()).await else {
            panic!("listing failed");
        };
        let ids: Vec<&str> = all.iter().map(|v| v.violation_id.as_str()).collect();
        assert_eq!(ids, ["e", "d", "f", "b", "c", "a"]);

        let page = ViolationFilter {
            limit: 2,
            offset: 1,
            ..ViolationFilter::default()
        };
        let Ok(rows) = engine.list_violations(&page).await else {
            panic!("listing failed");
        };
        let ids: Vec<&str> = rows.iter().map(|v| v.violation_id.as_str()).collect();
        assert_eq!(ids, ["d", "f"]);
    }

    #[tokio::test]
    async fn type_filter_is_exact() {
        let (_store, engine) = seeded().await;
        let filter = ViolationFilter {
            violation_type: Some("zone".to_string()),
            ..ViolationFilter::default()
        };
        let Ok(rows) = engine.list_violations(&filter).await else {
            panic!("listing failed");
        };
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|v| v.violation_type == "zone"));
    }

    #[tokio::test]
    async fn kpi_aggregates_agree_for_every_scope() {
        let (_store, engine) = seeded().await;
        let scopes = [
            KpiScope::default(),
            KpiScope {
                drone_id: Some("D1".to_string()),
                date: None,
            },
            KpiScope {
                drone_id: None,
                date: Some(day(2)),
            },
            KpiScope {
                drone_id: Some("D1".to_string()),
                date: Some(day(2)),
            },
            KpiScope {
                drone_id: Some("D9".to_string()),
                date: None,
            },
        ];
        let expected_totals = [6, 4, 3, 1, 0];
        for (scope, expected) in scopes.iter().zip(expected_totals) {
            let Ok(kpis) = engine.compute_kpis(scope).await else {
                panic!("kpis failed");
            };
            assert_eq!(kpis.total, expected, "scope {scope:?}");
            assert_eq!(sum(&kpis.by_type, |c| c.count), kpis.total);
            assert_eq!(sum(&kpis.by_drone, |c| c.count), kpis.total);
            assert_eq!(sum(&kpis.by_location, |c| c.count), kpis.total);
            assert_eq!(sum(&kpis.over_time, |c| c.count), kpis.total);
        }
    }

    #[tokio::test]
    async fn frequency_aggregates_break_ties_by_key() {
        let (_store, engine) = seeded().await;
        let Ok(kpis) = engine.compute_kpis(&KpiScope::default()).await else {
            panic!("kpis failed");
        };
        let types: Vec<(&str, i64)> = kpis
            .by_type
            .iter()
            .map(|c| (c.violation_type.as_str(), c.count))
            .collect();
        assert_eq!(types, [("speed", 3), ("zone", 2), ("altitude", 1)]);

        let locations: Vec<(&str, i64)> = kpis
            .by_location
            .iter()
            .map(|c| (c.location.as_str(), c.count))
            .collect();
        assert_eq!(locations, [("North", 5), ("South", 1)]);

        let dates: Vec<NaiveDate> = kpis.over_time.iter().map(|c| c.date).collect();
        assert_eq!(dates, [day(1), day(2)]);
    }

    #[tokio::test]
    async fn filter_options_are_sorted_and_stable() {
        let (_store, engine) = seeded().await;
        let (Ok(first), Ok(second)) = (engine.filter_options().await, engine.filter_options().await)
        else {
            panic!("filter options failed");
        };
        assert_eq!(first, second);
        assert_eq!(first.drone_ids, ["D1", "D2"]);
        assert_eq!(first.dates, [day(2), day(1)]);
        assert_eq!(first.types, ["altitude", "speed", "zone"]);
    }

    #[tokio::test]
    async fn deleted_report_vanishes_from_listing() {
        let (store, engine) = seeded().await;
        assert!(matches!(store.delete_report(ReportId::new(1)).await, Ok(true)));
        let filter = ViolationFilter {
            scope: KpiScope {
                drone_id: Some("D1".to_string()),
                date: Some(day(1)),
            },
            ..ViolationFilter::default()
        };
        assert!(matches!(engine.list_violations(&filter).await, Ok(rows) if rows.is_empty()));
        assert!(matches!(
            engine.find_report(ReportId::new(1)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_uploader_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let engine = AggregationEngine::new(
            Arc::clone(&store) as Arc<dyn ReportStore>,
            Duration::from_secs(5),
        );
        let missing = store
            .create_report_with_violations(&NewReport {
                drone_id: "D1".to_string(),
                date: day(1),
                location: "North".to_string(),
                uploaded_by: UserId::new(99),
                violations: vec![],
            })
            .await;
        assert!(matches!(missing, Err(ApiError::Store(_))));
        assert!(matches!(
            engine.find_report(ReportId::new(1)).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
