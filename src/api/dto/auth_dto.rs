//! Request and response bodies for `/api/auth` and `/api/admin`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserDto;
use crate::auth::TokenPair;
use crate::domain::{Credentials, PasswordChange, ProfileUpdate, Registration};
use crate::error::ApiError;

/// `POST /api/auth/register` body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Alphanumeric, 3 to 30 characters.
    pub username: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// At least 6 characters.
    pub password: Option<String>,
    /// `admin`, `user` or `viewer`; defaults to `user`.
    pub role: Option<String>,
}

impl RegisterRequest {
    /// Validates the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<Registration, ApiError> {
        Registration::parse(
            self.username.as_deref(),
            self.email.as_deref(),
            self.password.as_deref(),
            self.role.as_deref(),
        )
    }
}

/// `POST /api/auth/login` body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Account email.
    pub email: Option<String>,
    /// Password.
    pub password: Option<String>,
}

impl LoginRequest {
    /// Validates the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<Credentials, ApiError> {
        Credentials::parse(self.email.as_deref(), self.password.as_deref())
    }
}

/// `POST /api/auth/refresh-token` body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token from a previous login or refresh.
    pub refresh_token: Option<String>,
}

/// `PUT /api/auth/profile` body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// New username.
    pub username: Option<String>,
    /// New email.
    pub email: Option<String>,
}

impl UpdateProfileRequest {
    /// Validates the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<ProfileUpdate, ApiError> {
        ProfileUpdate::parse(self.username.as_deref(), self.email.as_deref())
    }
}

/// `PUT /api/auth/change-password` body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// The caller's current password.
    pub current_password: Option<String>,
    /// Replacement, at least 6 characters.
    pub new_password: Option<String>,
}

impl ChangePasswordRequest {
    /// Validates the body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<PasswordChange, ApiError> {
        PasswordChange::parse(
            self.current_password.as_deref(),
            self.new_password.as_deref(),
        )
    }
}

/// Response to register and login.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Outcome message.
    pub message: String,
    /// The signed-in account.
    pub user: UserDto,
    /// Fresh token pair.
    pub tokens: TokenPair,
}

/// Response to a token refresh.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokensResponse {
    /// Fresh token pair.
    pub tokens: TokenPair,
}

/// Response carrying one account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    /// Present on mutations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The account.
    pub user: UserDto,
}

/// `GET /api/admin/users` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserListResponse {
    /// One page of accounts, newest first.
    pub users: Vec<UserDto>,
    /// Page size used.
    pub limit: u32,
    /// Rows skipped.
    pub offset: u64,
}
