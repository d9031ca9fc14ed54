//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and a flat JSON error body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// { "error": "\"violations[0].latitude\" must be a number", "code": 1003 }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Numeric error code (see ranges on [`ApiError`]).
    pub code: u32,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status          |
/// |-----------|----------------------|----------------------|
/// | 1000–1999 | Input validation     | 400 / 413 / 415      |
/// | 2000–2999 | Authentication       | 401 / 403            |
/// | 3000–3999 | Resource state       | 404 / 409            |
/// | 4000–4999 | Throttling           | 429                  |
/// | 5000–5999 | Server / persistence | 500 / 503            |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The uploaded document has zero length.
    #[error("File is empty")]
    EmptyPayload,

    /// The uploaded document is not valid JSON.
    #[error("Invalid JSON format in uploaded file")]
    MalformedJson(String),

    /// The uploaded document does not match the report schema. The message
    /// names the first offending field.
    #[error("{0}")]
    SchemaViolation(String),

    /// Listing or KPI query parameters are out of bounds or mistyped.
    #[error("{0}")]
    InvalidFilter(String),

    /// Request body or path validation failed.
    #[error("{0}")]
    Validation(String),

    /// Upload request did not carry a `report` file field.
    #[error("No file uploaded")]
    MissingFile,

    /// Uploaded file exceeds the configured size limit.
    #[error("File too large")]
    PayloadTooLarge,

    /// Uploaded file does not declare a JSON content type.
    #[error("Only JSON files are allowed")]
    UnsupportedMediaType,

    /// Missing credentials or credentials that no longer map to a user.
    #[error("{0}")]
    Unauthenticated(String),

    /// Bearer token failed signature or expiry checks.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Authenticated user lacks the required role.
    #[error("Insufficient permissions")]
    Forbidden,

    /// Requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A unique constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// Client exceeded its request quota.
    #[error("Too many requests, please try again later")]
    RateLimited {
        /// Seconds until the client may retry.
        retry_after_secs: u64,
    },

    /// Unexpected persistence failure.
    #[error("persistence error: {0}")]
    Store(String),

    /// The store did not answer within the configured timeout.
    #[error("store unavailable")]
    StoreUnavailable,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::EmptyPayload => 1001,
            Self::MalformedJson(_) => 1002,
            Self::SchemaViolation(_) => 1003,
            Self::InvalidFilter(_) => 1004,
            Self::Validation(_) => 1005,
            Self::MissingFile => 1006,
            Self::PayloadTooLarge => 1007,
            Self::UnsupportedMediaType => 1008,
            Self::Unauthenticated(_) => 2001,
            Self::InvalidToken => 2002,
            Self::Forbidden => 2003,
            Self::NotFound(_) => 3001,
            Self::Conflict(_) => 3002,
            Self::RateLimited { .. } => 4001,
            Self::Internal(_) => 5000,
            Self::Store(_) => 5001,
            Self::StoreUnavailable => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyPayload
            | Self::MalformedJson(_)
            | Self::SchemaViolation(_)
            | Self::InvalidFilter(_)
            | Self::Validation(_)
            | Self::MissingFile => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidToken | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to show to clients. Server-side failures are replaced
    /// by a generic message; their detail only goes to the log.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::StoreUnavailable => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                if db.constraint().is_some_and(|c| c.starts_with("users_")) {
                    Self::Conflict("Username or email already exists".to_string())
                } else {
                    Self::Conflict("Duplicate value violates a unique constraint".to_string())
                }
            }
            sqlx::Error::PoolTimedOut => Self::StoreUnavailable,
            _ => Self::Store(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Store(detail) | Self::Internal(detail) => {
                tracing::error!(code = self.error_code(), %detail, "request failed");
            }
            Self::MalformedJson(detail) => {
                tracing::debug!(%detail, "rejected malformed upload");
            }
            _ => {}
        }
        let body = ErrorResponse {
            error: self.public_message(),
            code: self.error_code(),
        };
        let mut response = (status, axum::Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_failures_are_bad_request() {
        assert_eq!(ApiError::EmptyPayload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MalformedJson("eof".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::SchemaViolation("\"drone_id\" is required".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upload_limits_map_to_dedicated_statuses() {
        assert_eq!(
            ApiError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::UnsupportedMediaType.status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }

    #[test]
    fn store_detail_is_not_exposed() {
        let err = ApiError::Store("relation \"violations\" does not exist".to_string());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn schema_message_is_passed_through() {
        let err = ApiError::SchemaViolation("\"violations[1].type\" is required".to_string());
        assert_eq!(err.public_message(), "\"violations[1].type\" is required");
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = ApiError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER),
            Some(&HeaderValue::from(42_u64))
        );
    }

    #[test]
    fn codes_are_unique() {
        let errors = [
            ApiError::EmptyPayload,
            ApiError::MalformedJson(String::new()),
            ApiError::SchemaViolation(String::new()),
            ApiError::InvalidFilter(String::new()),
            ApiError::Validation(String::new()),
            ApiError::MissingFile,
            ApiError::PayloadTooLarge,
            ApiError::UnsupportedMediaType,
            ApiError::Unauthenticated(String::new()),
            ApiError::InvalidToken,
            ApiError::Forbidden,
            ApiError::NotFound(String::new()),
            ApiError::Conflict(String::new()),
            ApiError::RateLimited {
                retry_after_secs: 1,
            },
            ApiError::Store(String::new()),
            ApiError::StoreUnavailable,
            ApiError::Internal(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(ApiError::error_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
