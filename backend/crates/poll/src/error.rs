//! Poll Error Types
//!
//! This module provides poll-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use crate::domain::fairness::FailedCheck;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use serde_json::json;
use thiserror::Error;

/// Poll-specific result type alias
pub type PollResult<T> = Result<T, PollError>;

/// Poll-specific error variants
#[derive(Debug, Error)]
pub enum PollError {
    /// Poll id unknown
    #[error("Poll not found")]
    PollNotFound,

    /// Poll id malformed; rejected before touching storage
    #[error("Invalid poll id")]
    InvalidPollId,

    /// Option index out of range
    #[error("Invalid option selected")]
    InvalidOption,

    /// Request payload failed validation
    #[error("{0}")]
    Validation(String),

    /// One or more fairness checks failed
    #[error("Vote rejected by {} fairness check(s)", failed_checks.len())]
    FairnessRejected { failed_checks: Vec<FailedCheck> },

    /// Request-level rate limit exceeded
    #[error("Too many requests, please try again later")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Missing required header (e.g., User-Agent)
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Non-database storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PollError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::PollNotFound => ErrorKind::NotFound,
            PollError::InvalidPollId
            | PollError::InvalidOption
            | PollError::Validation(_)
            | PollError::MissingHeader(_) => ErrorKind::BadRequest,
            PollError::FairnessRejected { .. } | PollError::RateLimitExceeded { .. } => {
                ErrorKind::TooManyRequests
            }
            PollError::Database(_) | PollError::Storage(_) | PollError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            PollError::Database(e) => {
                tracing::error!(error = %e, "Poll database error");
            }
            PollError::Storage(msg) => {
                tracing::error!(message = %msg, "Poll storage error");
            }
            PollError::Internal(msg) => {
                tracing::error!(message = %msg, "Poll internal error");
            }
            PollError::FairnessRejected { failed_checks } => {
                let checks: Vec<&str> = failed_checks.iter().map(|c| c.check_name()).collect();
                tracing::warn!(failed_checks = ?checks, "Vote rejected by fairness gate");
            }
            PollError::RateLimitExceeded { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Poll request rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Poll error");
            }
        }
    }
}

impl From<PollError> for AppError {
    fn from(err: PollError) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::InternalServerError {
            // Server-side details stay in the source chain, not the body
            return AppError::new(kind, "Internal server error").with_source(err);
        }
        match err {
            PollError::FairnessRejected { failed_checks } => {
                let retry_after_minutes = failed_checks
                    .iter()
                    .map(|c| c.retry_after_minutes)
                    .max()
                    .unwrap_or(1);
                let errors: Vec<_> = failed_checks
                    .iter()
                    .map(|c| {
                        json!({
                            "check": c.check_name(),
                            "reason": c.reason,
                            "retryAfter": c.retry_after_minutes,
                        })
                    })
                    .collect();
                AppError::new(kind, "Vote rejected by fairness checks")
                    .with_action("Wait before voting again")
                    .with_retry_after(retry_after_minutes * 60)
                    .with_extension("errors", json!(errors))
            }
            PollError::RateLimitExceeded { retry_after_secs } => {
                AppError::new(kind, "Too many requests, please try again later")
                    .with_retry_after(retry_after_secs)
            }
            other => AppError::new(kind, other.to_string()),
        }
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        self.log();
        AppError::from(self).into_response()
    }
}

impl From<platform::client::ClientIdentityError> for PollError {
    fn from(err: platform::client::ClientIdentityError) -> Self {
        match err {
            platform::client::ClientIdentityError::MissingHeader(header) => {
                PollError::MissingHeader(header)
            }
        }
    }
}

impl From<platform::rate_limit::RateLimitError> for PollError {
    fn from(err: platform::rate_limit::RateLimitError) -> Self {
        PollError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_storage_details_stay_out_of_the_body() {
        let app_err = AppError::from(PollError::Storage("disk full".to_string()));
        assert_eq!(app_err.status_code(), 500);
        assert_eq!(app_err.message(), "Internal server error");
        let source = app_err.source().unwrap();
        assert!(source.to_string().contains("disk full"));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let app_err = AppError::from(PollError::RateLimitExceeded {
            retry_after_secs: 90,
        });
        assert_eq!(app_err.status_code(), 429);
        assert_eq!(app_err.retry_after_secs(), Some(90));
    }

    #[test]
    fn test_every_variant_maps_to_a_kernel_kind() {
        let cases = [
            (PollError::PollNotFound, ErrorKind::NotFound),
            (PollError::InvalidPollId, ErrorKind::BadRequest),
            (PollError::InvalidOption, ErrorKind::BadRequest),
            (PollError::Validation("x".to_string()), ErrorKind::BadRequest),
            (PollError::MissingHeader("User-Agent".to_string()), ErrorKind::BadRequest),
            (
                PollError::FairnessRejected {
                    failed_checks: Vec::new(),
                },
                ErrorKind::TooManyRequests,
            ),
            (
                PollError::RateLimitExceeded {
                    retry_after_secs: 1,
                },
                ErrorKind::TooManyRequests,
            ),
            (
                PollError::Database(sqlx::Error::PoolTimedOut),
                ErrorKind::InternalServerError,
            ),
            (PollError::Storage("x".to_string()), ErrorKind::InternalServerError),
            (PollError::Internal("x".to_string()), ErrorKind::InternalServerError),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
            assert_eq!(err.status_code().as_u16(), kind.status_code());
        }
    }
}
