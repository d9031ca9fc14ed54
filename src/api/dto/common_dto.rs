//! Shared DTO types used across multiple endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Role, User, UserId};

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

impl MessageResponse {
    /// Wraps `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    /// User id.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Authorization role.
    pub role: Role,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Previous login, if any.
    pub last_login: Option<DateTime<Utc>>,
    /// `false` once an admin has deactivated the account.
    pub is_active: bool,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            last_login: user.last_login,
            is_active: user.is_active,
        }
    }
}

/// Offset pagination for list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page size, 1 to 1000. Defaults to 50.
    pub limit: Option<u32>,
    /// Rows to skip. Defaults to 0.
    pub offset: Option<u64>,
}

/// Default page size for [`PaginationParams`].
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size accepted by [`PaginationParams`].
pub const MAX_PAGE_SIZE: u32 = 1000;

impl PaginationParams {
    /// Resolves defaults and clamps the page size to `1..=1000`.
    #[must_use]
    pub fn clamped(&self) -> (u32, u64) {
        (
            self.limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            self.offset.unwrap_or(0),
        )
    }
}
