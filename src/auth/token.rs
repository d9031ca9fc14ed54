//! Signed access and refresh tokens.
//!
//! Both token kinds are HS256 JWTs signed with the same secret. The `kind`
//! claim keeps them apart: a refresh token is rejected where an access
//! token is expected and vice versa.

use std::fmt;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Role, User, UserId};
use crate::error::ApiError;

/// `iss` claim stamped on and required of every token.
pub const ISSUER: &str = "dronewatch-api";

/// Which half of a token pair a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived bearer credential.
    Access,
    /// Long-lived credential exchanged for a new pair.
    Refresh,
}

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject user.
    pub user_id: UserId,
    /// Subject email at issue time.
    pub email: String,
    /// Subject role at issue time.
    pub role: Role,
    /// Access or refresh.
    pub kind: TokenKind,
    /// Issuer.
    pub iss: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// An access token and its matching refresh token.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Token for `POST /api/auth/refresh-token`.
    pub refresh_token: String,
}

/// Issues and verifies token pairs.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a service signing with `secret`.
    #[must_use]
    pub fn new(secret: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl_secs: i64::try_from(access_ttl_secs).unwrap_or(i64::MAX),
            refresh_ttl_secs: i64::try_from(refresh_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Issues a fresh access/refresh pair for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if signing fails.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            access_token: self.issue(user, TokenKind::Access)?,
            refresh_token: self.issue(user, TokenKind::Refresh)?,
        })
    }

    fn issue(&self, user: &User, kind: TokenKind) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            kind,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, ApiError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// Verifies signature, issuer, expiry and kind.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidToken`] on any failure.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                ApiError::InvalidToken
            })?;
        if data.claims.kind != expected {
            tracing::debug!(kind = ?data.claims.kind, "token of the wrong kind");
            return Err(ApiError::InvalidToken);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId::new(7),
            username: "pilot".to_string(),
            email: "pilot@example.com".to_string(),
            password_hash: String::new(),
            role: Role::User,
            created_at: now,
            updated_at: now,
            last_login: None,
            is_active: true,
        }
    }

    #[test]
    fn access_token_round_trips_claims() {
        let service = TokenService::new("secret", 60, 120);
        let Ok(pair) = service.issue_pair(&user()) else {
            panic!("signing failed");
        };
        let Ok(claims) = service.verify(&pair.access_token, TokenKind::Access) else {
            panic!("verification failed");
        };
        assert_eq!(claims.user_id, UserId::new(7));
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let service = TokenService::new("secret", 60, 120);
        let Ok(pair) = service.issue_pair(&user()) else {
            panic!("signing failed");
        };
        assert!(matches!(
            service.verify(&pair.refresh_token, TokenKind::Access),
            Err(ApiError::InvalidToken)
        ));
        assert!(matches!(
            service.verify(&pair.access_token, TokenKind::Refresh),
            Err(ApiError::InvalidToken)
        ));
        tokio_test::assert_ok!(service.verify(&pair.refresh_token, TokenKind::Refresh));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let issuer = TokenService::new("one secret", 60, 120);
        let verifier = TokenService::new("another secret", 60, 120);
        let Ok(pair) = issuer.issue_pair(&user()) else {
            panic!("signing failed");
        };
        assert!(matches!(
            verifier.verify(&pair.access_token, TokenKind::Access),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = TokenService::new("secret", 60, 120);
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: UserId::new(7),
            email: "pilot@example.com".to_string(),
            role: Role::User,
            kind: TokenKind::Access,
            iss: ISSUER.to_string(),
            iat: now - 7200,
            exp: now - 3600,
            jti: Uuid::new_v4().to_string(),
        };
        let Ok(token) = service.sign(&claims) else {
            panic!("signing failed");
        };
        assert!(matches!(
            service.verify(&token, TokenKind::Access),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let service = TokenService::new("secret", 60, 120);
        tokio_test::assert_err!(service.verify("not-a-jwt", TokenKind::Access));
    }
}
