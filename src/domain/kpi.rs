//! KPI aggregate shapes.
//!
//! Frequency aggregates (`byType`, `byDrone`, `byLocation`) are ordered by
//! count descending with ties broken by the group key ascending (byte
//! order). `overTime` is a time series ordered by date ascending.

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

/// Grouping dimension for a frequency aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KpiDimension {
    /// Violation category.
    ViolationType,
    /// Owning report's drone id.
    Drone,
    /// Owning report's location.
    Location,
}

/// One bucket of a frequency aggregate, keyed by the dimension's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    /// Group key (type, drone id, or location).
    pub key: String,
    /// Violations in the group.
    pub count: i64,
}

impl GroupCount {
    /// Frequency order: count descending, then key ascending.
    #[must_use]
    pub fn frequency_order(a: &Self, b: &Self) -> Ordering {
        b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key))
    }
}

/// Violations per violation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TypeCount {
    /// Violation category.
    #[serde(rename = "type")]
    pub violation_type: String,
    /// Violations of this type.
    pub count: i64,
}

/// Violations per drone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DroneCount {
    /// Drone id.
    pub drone_id: String,
    /// Violations recorded by this drone.
    pub count: i64,
}

/// Violations per location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LocationCount {
    /// Location name.
    pub location: String,
    /// Violations at this location.
    pub count: i64,
}

/// Violations per report date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateCount {
    /// Report date.
    pub date: NaiveDate,
    /// Violations on this date.
    pub count: i64,
}

/// The five dashboard aggregates over one filtered violation set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    /// Violations matching the scope.
    pub total: i64,
    /// Counts per violation type.
    pub by_type: Vec<TypeCount>,
    /// Counts per drone.
    pub by_drone: Vec<DroneCount>,
    /// Counts per location.
    pub by_location: Vec<LocationCount>,
    /// Counts per report date, oldest first.
    pub over_time: Vec<DateCount>,
}

/// Distinct values available for the dashboard's filter dropdowns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Drone ids, ascending.
    pub drone_ids: Vec<String>,
    /// Report dates, newest first.
    pub dates: Vec<NaiveDate>,
    /// Violation types, ascending.
    pub types: Vec<String>,
}
