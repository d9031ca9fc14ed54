//! Domain layer: identifiers, accounts, reports, filters, and KPI shapes.
//!
//! This module contains the server-side domain model including the upload
//! schema for violation reports, the typed filters accepted by the listing
//! and KPI endpoints, and the aggregate shapes returned to the dashboard.

pub mod credentials;
pub mod filter;
pub mod ids;
pub mod kpi;
pub mod report;
pub mod report_document;
pub mod user;

pub use credentials::{Credentials, PasswordChange, Registration};
pub use filter::{KpiScope, ViolationFilter};
pub use ids::{ReportId, UserId};
pub use kpi::{FilterOptions, GroupCount, KpiDimension, KpiSummary};
pub use report::{
    IngestOutcome, NewReport, NewViolation, ReportDetail, StoredViolation, ViolationView,
};
pub use report_document::ReportDocument;
pub use user::{NewUser, ProfileUpdate, Role, User};
