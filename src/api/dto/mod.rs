//! Data Transfer Objects for REST request/response serialization.
//!
//! Request bodies keep every field optional so that a missing field is
//! reported as a validation message naming it rather than a generic
//! deserialization failure. Auth and KPI payloads use camelCase keys;
//! violation rows keep their snake_case column names.

pub mod auth_dto;
pub mod common_dto;
pub mod report_dto;

pub use auth_dto::*;
pub use common_dto::*;
pub use report_dto::*;
