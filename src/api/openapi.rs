//! OpenAPI document for the REST surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::dto;
use super::handlers::{admin, auth, reports, system};
use crate::auth::TokenPair;
use crate::domain::kpi::{DateCount, DroneCount, LocationCount, TypeCount};
use crate::domain::{
    FilterOptions, KpiScope, KpiSummary, ReportDetail, ReportId, Role, StoredViolation, UserId,
    ViolationFilter, ViolationView,
};
use crate::error::ErrorResponse;

/// Registers the `bearer_auth` scheme referenced by protected routes.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// The service's OpenAPI description.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "dronewatch-api",
        description = "Ingests drone violation reports and serves dashboard KPIs."
    ),
    paths(
        auth::register,
        auth::login,
        auth::refresh_token,
        auth::get_profile,
        auth::update_profile,
        auth::change_password,
        auth::logout,
        reports::upload_report,
        reports::list_violations,
        reports::get_kpis,
        reports::get_filter_options,
        reports::get_report,
        reports::delete_report,
        admin::list_users,
        admin::deactivate_user,
        system::health_handler,
    ),
    components(schemas(
        ErrorResponse,
        TokenPair,
        Role,
        UserId,
        ReportId,
        KpiScope,
        ViolationFilter,
        ViolationView,
        StoredViolation,
        ReportDetail,
        TypeCount,
        DroneCount,
        LocationCount,
        DateCount,
        KpiSummary,
        FilterOptions,
        dto::MessageResponse,
        dto::UserDto,
        dto::RegisterRequest,
        dto::LoginRequest,
        dto::RefreshRequest,
        dto::UpdateProfileRequest,
        dto::ChangePasswordRequest,
        dto::AuthResponse,
        dto::TokensResponse,
        dto::UserResponse,
        dto::UserListResponse,
        dto::UploadResponse,
        dto::ViolationListResponse,
        system::HealthResponse,
        system::DatabaseStatus,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Accounts and tokens"),
        (name = "Reports", description = "Report ingestion and analytics"),
        (name = "Admin", description = "User management"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/register",
            "/api/auth/profile",
            "/api/reports/upload",
            "/api/reports/{id}",
            "/api/admin/users/{id}",
            "/api/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        assert!(
            doc.components
                .as_ref()
                .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"))
        );
    }
}
