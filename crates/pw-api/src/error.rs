//! API error types and handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pw_core::{AuthError, DetectionError, EffectorError, GraphError, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// API error type.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request (validation error, invalid input).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (missing or invalid authentication).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid login credentials.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Forbidden (authenticated but not allowed).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (wrong state for the requested transition).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// External (effector-side) failure after retries were exhausted.
    #[error("External failure: {0}")]
    External(String),

    /// Scan budget exhausted.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::External(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ApiError::External(_) => "EXTERNAL_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidUsername | AuthError::WeakPassword(_) => {
                ApiError::BadRequest(err.to_string())
            }
            AuthError::UserExists => ApiError::Conflict("username already taken".to_string()),
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::InvalidToken => {
                ApiError::Unauthorized("invalid or expired token".to_string())
            }
            AuthError::Password(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ResponseError> for ApiError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::PlanNotFound(_) | ResponseError::ActionNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ResponseError::InvalidTransition { .. }
            | ResponseError::NotReversible(_)
            | ResponseError::NotRollbackable { .. } => ApiError::Conflict(err.to_string()),
            // Transient errors exhaust their retries inside the executor and
            // surface to the caller as permanent.
            ResponseError::Effector(EffectorError::Transient(msg))
            | ResponseError::Effector(EffectorError::Permanent(msg)) => ApiError::External(msg),
        }
    }
}

impl From<DetectionError> for ApiError {
    fn from(err: DetectionError) -> Self {
        match err {
            DetectionError::UnknownStartNode(_) => ApiError::NotFound(err.to_string()),
            DetectionError::BudgetExceeded(_) => ApiError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::External("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_conflict_mapping_from_response_error() {
        let err = ResponseError::NotReversible("RA-000001".to_string());
        let api: ApiError = err.into();
        assert_eq!(api.error_code(), "CONFLICT");
    }

    #[test]
    fn test_transient_effector_error_maps_to_external() {
        let err = ResponseError::Effector(EffectorError::Transient("throttled".to_string()));
        let api: ApiError = err.into();
        assert_eq!(api.error_code(), "EXTERNAL_ERROR");
        assert_eq!(api.status_code(), StatusCode::BAD_GATEWAY);
    }
}
