//! Argon2id password hashing.
//!
//! Hashing is CPU-bound, so both operations run on tokio's blocking pool.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::ApiError;

/// Hashes `password` into a PHC string with a random salt.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] if hashing fails or the blocking task
/// is cancelled.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

/// Checks `password` against a stored PHC string.
///
/// An unparseable stored hash never matches.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] if the blocking task is cancelled.
pub async fn verify_password(password: String, stored: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored) else {
            tracing::warn!("stored password hash is not a valid PHC string");
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let Ok(hash) = hash_password("s3cret!".to_string()).await else {
            panic!("hashing failed");
        };
        assert!(hash.starts_with("$argon2id$"));
        assert!(matches!(
            verify_password("s3cret!".to_string(), hash.clone()).await,
            Ok(true)
        ));
        assert!(matches!(
            verify_password("wrong".to_string(), hash).await,
            Ok(false)
        ));
    }

    #[tokio::test]
    async fn salts_differ() {
        let (Ok(a), Ok(b)) = (
            hash_password("same".to_string()).await,
            hash_password("same".to_string()).await,
        ) else {
            panic!("hashing failed");
        };
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_never_matches() {
        assert!(matches!(
            verify_password("x".to_string(), "plaintext".to_string()).await,
            Ok(false)
        ));
    }
}
