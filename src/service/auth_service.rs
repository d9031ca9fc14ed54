//! Auth service: accounts, sessions, and bearer-token resolution.

use std::sync::Arc;
use std::time::Duration;

use super::bounded;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthUser, TokenKind, TokenPair, TokenService};
use crate::domain::{
    Credentials, NewUser, PasswordChange, ProfileUpdate, Registration, Role, User, UserId,
};
use crate::error::ApiError;
use crate::persistence::UserStore;

/// Username given to the account created by
/// [`AuthService::ensure_default_admin`].
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// A user together with a freshly issued token pair.
#[derive(Debug, Clone)]
pub struct Session {
    /// The account. On login, `last_login` holds the previous login time.
    pub user: User,
    /// Access and refresh tokens.
    pub tokens: TokenPair,
}

/// Account management and authentication.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    timeout: Duration,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthenticated("Invalid email or password".to_string())
}

fn invalid_refresh() -> ApiError {
    ApiError::Unauthenticated("Invalid refresh token".to_string())
}

impl AuthService {
    /// Creates a service over `users`, signing with `tokens`.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService, timeout: Duration) -> Self {
        Self {
            users,
            tokens,
            timeout,
        }
    }

    /// Creates an account and signs it in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Conflict`] when the email, or at insert time the
    /// username, is already taken.
    pub async fn register(&self, registration: Registration) -> Result<Session, ApiError> {
        let existing = bounded(
            self.timeout,
            self.users.find_active_by_email(&registration.email),
        )
        .await?;
        if existing.is_some() {
            return Err(ApiError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(registration.password).await?;
        let new_user = NewUser {
            username: registration.username,
            email: registration.email,
            password_hash,
            role: registration.role,
        };
        let user = bounded(self.timeout, self.users.create_user(&new_user)).await?;
        let tokens = self.tokens.issue_pair(&user)?;

        tracing::info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(Session { user, tokens })
    }

    /// Checks credentials, stamps the login time and issues tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] for an unknown or inactive
    /// email or a wrong password, without saying which.
    pub async fn login(&self, credentials: Credentials) -> Result<Session, ApiError> {
        let user = bounded(
            self.timeout,
            self.users.find_active_by_email(&credentials.email),
        )
        .await?
        .ok_or_else(invalid_credentials)?;

        if !verify_password(credentials.password, user.password_hash.clone()).await? {
            tracing::info!(user_id = %user.id, "login rejected");
            return Err(invalid_credentials());
        }

        bounded(self.timeout, self.users.update_last_login(user.id)).await?;
        let tokens = self.tokens.issue_pair(&user)?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(Session { user, tokens })
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] when the token is missing,
    /// invalid, expired, or belongs to an inactive user.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<TokenPair, ApiError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthenticated("Refresh token required".to_string()))?;
        let claims = self
            .tokens
            .verify(token, TokenKind::Refresh)
            .map_err(|_| invalid_refresh())?;
        let user = bounded(self.timeout, self.users.find_active_by_id(claims.user_id))
            .await?
            .ok_or_else(invalid_refresh)?;
        self.tokens.issue_pair(&user)
    }

    /// Loads the caller's account.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the account is gone.
    pub async fn profile(&self, id: UserId) -> Result<User, ApiError> {
        bounded(self.timeout, self.users.find_active_by_id(id))
            .await?
            .ok_or_else(user_not_found)
    }

    /// Applies a partial profile update.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Validation`] when neither field is supplied.
    /// - [`ApiError::Conflict`] when the new username or email is taken.
    /// - [`ApiError::NotFound`] if the account is gone.
    pub async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> Result<User, ApiError> {
        if update.is_empty() {
            return Err(ApiError::Validation("No fields to update".to_string()));
        }
        let user = bounded(self.timeout, self.users.update_profile(id, &update))
            .await?
            .ok_or_else(user_not_found)?;
        tracing::info!(user_id = %id, "profile updated");
        Ok(user)
    }

    /// Replaces the caller's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthenticated`] when the current password is
    /// wrong or the account is gone.
    pub async fn change_password(&self, id: UserId, change: PasswordChange) -> Result<(), ApiError> {
        let user = bounded(self.timeout, self.users.find_active_by_id(id))
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("Invalid token - user not found".to_string()))?;

        if !verify_password(change.current, user.password_hash).await? {
            return Err(ApiError::Unauthenticated(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(change.new).await?;
        bounded(
            self.timeout,
            self.users.update_password_hash(id, &password_hash),
        )
        .await?;
        tracing::info!(user_id = %id, "password changed");
        Ok(())
    }

    /// Resolves an access token to the active user it names.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidToken`] for a bad signature, expiry, or a
    ///   refresh token.
    /// - [`ApiError::Unauthenticated`] when the user no longer exists or is
    ///   deactivated.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, ApiError> {
        let claims = self.tokens.verify(token, TokenKind::Access)?;
        let user = bounded(self.timeout, self.users.find_active_by_id(claims.user_id))
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("Invalid token - user not found".to_string()))?;
        Ok(AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }

    /// Lists accounts, newest first.
    ///
    /// # Errors
    ///
    /// Propagates store failures and timeouts.
    pub async fn list_users(&self, limit: u32, offset: u64) -> Result<Vec<User>, ApiError> {
        bounded(self.timeout, self.users.list_users(limit, offset)).await
    }

    /// Soft-deletes an account. Its username and email stay reserved.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if no active account has this id.
    pub async fn deactivate_user(&self, id: UserId) -> Result<(), ApiError> {
        if bounded(self.timeout, self.users.deactivate_user(id)).await? {
            tracing::info!(user_id = %id, "user deactivated");
            Ok(())
        } else {
            Err(user_not_found())
        }
    }

    /// Creates an admin account when the users table is empty. Returns
    /// whether one was created.
    ///
    /// # Errors
    ///
    /// Propagates store and hashing failures.
    pub async fn ensure_default_admin(&self, email: &str, password: &str) -> Result<bool, ApiError> {
        if bounded(self.timeout, self.users.count_users()).await? > 0 {
            return Ok(false);
        }
        let password_hash = hash_password(password.to_string()).await?;
        let admin = NewUser {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::Admin,
        };
        let user = bounded(self.timeout, self.users.create_user(&admin)).await?;
        tracing::info!(user_id = %user.id, %email, "default admin created");
        Ok(true)
    }
}
