//! Error taxonomy for the API and the store
//!
//! Every failure surfaces to the caller as a structured JSON body with a
//! machine-readable kind and a human message; nothing is silently swallowed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result alias used throughout the store and handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// API-level error taxonomy
#[derive(Debug, Error)]
pub enum ApiError {
    /// Referenced id or natural key does not exist
    #[error("{0}")]
    NotFound(String),

    /// Malformed input, referential integrity violation, or duplicate unique key
    #[error("{0}")]
    Validation(String),

    /// Loser of a concurrent cascade race
    #[error("{0}")]
    Conflict(String),

    /// Store call exceeded its bounded timeout; safe to retry
    #[error("store operation timed out: {0}")]
    StoreTimeout(String),

    /// Unexpected store fault
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable error kind, stable across releases
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::Validation(_) => "validation",
            ApiError::Conflict(_) => "conflict",
            ApiError::StoreTimeout(_) => "store_timeout",
            ApiError::Internal(_) => "internal",
        }
    }

    /// HTTP status the error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::StoreTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(kind = self.kind(), "request failed: {}", self);
        } else {
            tracing::debug!(kind = self.kind(), "request rejected: {}", self);
        }
        let body = Json(json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => {
                ApiError::NotFound("record not found".to_string())
            }
            rusqlite::Error::SqliteFailure(e, msg) => match e.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    ApiError::StoreTimeout(
                        msg.clone().unwrap_or_else(|| "database is busy".to_string()),
                    )
                }
                rusqlite::ErrorCode::ConstraintViolation => ApiError::Validation(
                    msg.clone().unwrap_or_else(|| "constraint violation".to_string()),
                ),
                _ => ApiError::Internal(err.to_string()),
            },
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ApiError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ApiError::Validation("x".into()).kind(), "validation");
        assert_eq!(ApiError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(ApiError::StoreTimeout("x".into()).kind(), "store_timeout");
        assert_eq!(ApiError::Internal("x".into()).kind(), "internal");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::StoreTimeout("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_busy_maps_to_timeout() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let api: ApiError = err.into();
        assert_eq!(api.kind(), "store_timeout");
    }

    #[test]
    fn test_constraint_maps_to_validation() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("UNIQUE constraint failed: subjects.code".to_string()),
        );
        let api: ApiError = err.into();
        assert_eq!(api.kind(), "validation");
    }
}
