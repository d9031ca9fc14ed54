//! Bearer-token extraction for handlers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::{Role, UserId};
use crate::error::ApiError;

/// The authenticated caller, resolved from an access token and the
/// current users table.
///
/// Adding `AuthUser` to a handler's arguments makes the route require a
/// valid access token belonging to an active user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// User id.
    pub id: UserId,
    /// Current username.
    pub username: String,
    /// Current email.
    pub email: String,
    /// Current role.
    pub role: Role,
}

impl AuthUser {
    /// Ensures the caller holds one of `roles`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] otherwise.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.id, role = %self.role, "role not permitted");
            Err(ApiError::Forbidden)
        }
    }
}

/// Returns the credential following the scheme in an `Authorization`
/// header, if any.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (_, token) = value.split_once(' ')?;
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthenticated("Access token required".to_string()))?;
        state.auth.authenticate(token).await
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extracts_bearer_credential() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
    }

    #[test]
    fn missing_or_bare_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
    }

    #[test]
    fn role_check() {
        let user = AuthUser {
            id: UserId::new(1),
            username: "viewer".to_string(),
            email: "viewer@example.com".to_string(),
            role: Role::Viewer,
        };
        assert!(user.require(&[Role::Viewer]).is_ok());
        assert!(matches!(
            user.require(&[Role::User, Role::Admin]),
            Err(ApiError::Forbidden)
        ));
    }
}
