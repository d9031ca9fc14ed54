//! Admin-only user management.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get};
use axum::{Json, Router};

use crate::api::dto::{MessageResponse, PaginationParams, UserDto, UserListResponse};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{Role, UserId};
use crate::error::{ApiError, ErrorResponse};

/// `GET /admin/users` — Page through all accounts.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "Admin",
    summary = "List users",
    description = "All accounts, active or not, newest first.",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "One page of accounts", body = UserListResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<UserListResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let Query(params) = params?;
    let (limit, offset) = params.clamped();
    let users = state.auth.list_users(limit, offset).await?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserDto::from).collect(),
        limit,
        offset,
    }))
}

/// `DELETE /admin/users/{id}` — Deactivate an account.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins and
/// [`ApiError::NotFound`] when no active account has this id.
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "Admin",
    summary = "Deactivate user",
    description = "Soft delete: the account can no longer sign in, but its username and email stay reserved.",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deactivated", body = MessageResponse),
        (status = 400, description = "Invalid user ID", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let id: UserId = id
        .parse()
        .map_err(|_| ApiError::Validation("Invalid user ID".to_string()))?;
    state.auth.deactivate_user(id).await?;
    Ok(Json(MessageResponse::new("User deactivated successfully")))
}

/// Admin routes, nested under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", delete(deactivate_user))
}
