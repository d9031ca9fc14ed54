//! Account handlers: register, login, token refresh, profile, password.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest,
    RegisterRequest, TokensResponse, UpdateProfileRequest, UserDto, UserResponse,
};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::{ApiError, ErrorResponse};

/// `POST /auth/register` — Create an account.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] for a bad body and
/// [`ApiError::Conflict`] for a taken username or email.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    summary = "Register",
    description = "Creates an account and returns it with a fresh token pair.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 409, description = "Username or email taken", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    let session = state.auth.register(req.validate()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            user: UserDto::from(session.user),
            tokens: session.tokens,
        }),
    ))
}

/// `POST /auth/login` — Exchange credentials for tokens.
///
/// # Errors
///
/// Returns [`ApiError::Unauthenticated`] for bad credentials.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    summary = "Log in",
    description = "Verifies email and password, records the login, and returns a token pair. `user.lastLogin` is the previous login.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(req) = body?;
    let session = state.auth.login(req.validate()?).await?;
    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user: UserDto::from(session.user),
        tokens: session.tokens,
    }))
}

/// `POST /auth/refresh-token` — Rotate a token pair.
///
/// # Errors
///
/// Returns [`ApiError::Unauthenticated`] for a missing or invalid token.
#[utoipa::path(
    post,
    path = "/api/auth/refresh-token",
    tag = "Auth",
    summary = "Refresh tokens",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokensResponse),
        (status = 401, description = "Missing or invalid refresh token", body = ErrorResponse),
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokensResponse>, ApiError> {
    let Json(req) = body?;
    let tokens = state.auth.refresh(req.refresh_token.as_deref()).await?;
    Ok(Json(TokensResponse { tokens }))
}

/// `GET /auth/profile` — The caller's account.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] if the account is gone.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "Auth",
    summary = "Get profile",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.profile(caller.id).await?;
    Ok(Json(UserResponse {
        message: None,
        user: UserDto::from(user),
    }))
}

/// `PUT /auth/profile` — Change username and/or email.
///
/// # Errors
///
/// Returns [`ApiError::Validation`] for a bad or empty body and
/// [`ApiError::Conflict`] for a taken username or email.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "Auth",
    summary = "Update profile",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = UserResponse),
        (status = 400, description = "Invalid field or nothing to update", body = ErrorResponse),
        (status = 409, description = "Username or email taken", body = ErrorResponse),
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(req) = body?;
    let user = state.auth.update_profile(caller.id, req.validate()?).await?;
    Ok(Json(UserResponse {
        message: Some("Profile updated successfully".to_string()),
        user: UserDto::from(user),
    }))
}

/// `PUT /auth/change-password` — Replace the caller's password.
///
/// # Errors
///
/// Returns [`ApiError::Unauthenticated`] when the current password is wrong.
#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    tag = "Auth",
    summary = "Change password",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid field", body = ErrorResponse),
        (status = 401, description = "Current password is incorrect", body = ErrorResponse),
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = body?;
    state
        .auth
        .change_password(caller.id, req.validate()?)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// `POST /auth/logout` — Acknowledge a logout.
///
/// Tokens are stateless; the client discards them.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    summary = "Log out",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    )
)]
pub async fn logout(caller: AuthUser) -> Json<MessageResponse> {
    tracing::debug!(user_id = %caller.id, "user logged out");
    Json(MessageResponse::new("Logged out successfully"))
}

/// Account routes, nested under `/api/auth`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", put(change_password))
        .route("/logout", post(logout))
}
