//! # dronewatch-api
//!
//! REST service that ingests drone violation reports and serves the
//! filtered listings and KPI aggregates behind an analytics dashboard.
//!
//! Uploaded JSON documents are validated against a fixed schema and stored
//! atomically (a report and all of its violations, or nothing). Reads run
//! as independent store queries; the five KPI aggregates are issued
//! concurrently and joined.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/) ── AuthUser extractor (auth/)
//!     │
//!     ├── IngestionPipeline / AggregationEngine / AuthService (service/)
//!     │
//!     ├── ReportStore / UserStore traits (persistence/)
//!     │
//!     └── PostgreSQL (PgStore) or in-process tables (MemoryStore)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
