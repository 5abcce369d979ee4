//! Synchronizer error types with HTTP status code mapping.
//!
//! [`SyncError`] is the central error type for the service. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1003,
///     "message": "invalid webhook signature: no v1 signature matched",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                 |
/// |-----------|----------------------|-----------------------------|
/// | 1000–1099 | Verification         | 400 Bad Request             |
/// | 1100–1199 | Payload shape        | 422 Unprocessable Entity    |
/// | 3000–3999 | Server               | 500 Internal Server Error   |
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The request carried no signature header.
    #[error("missing webhook signature header")]
    MissingSignature,

    /// No webhook secret is configured, so nothing can be verified.
    #[error("webhook secret is not configured")]
    SecretNotConfigured,

    /// Signature header was malformed or did not match the payload.
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Signature timestamp is older (or newer) than the allowed tolerance.
    #[error("signature timestamp {timestamp} is outside the {tolerance_secs}s tolerance")]
    TimestampOutsideTolerance {
        /// Timestamp carried by the `t=` element.
        timestamp: i64,
        /// Configured tolerance in seconds.
        tolerance_secs: u64,
    },

    /// Verified body could not be decoded as an event envelope.
    #[error("malformed event payload: {0}")]
    MalformedEvent(String),

    /// Required metadata keys are missing or inconsistent.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Campaign plan id is not in the catalog.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A handler failed while applying an event.
    #[error("handler for {event_type} failed on event {event_id}: {reason}")]
    HandlerFailed {
        /// Provider event id.
        event_id: String,
        /// Provider event type tag.
        event_type: String,
        /// Underlying failure message.
        reason: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MissingSignature => 1001,
            Self::SecretNotConfigured => 1002,
            Self::InvalidSignature(_) => 1003,
            Self::TimestampOutsideTolerance { .. } => 1004,
            Self::MalformedEvent(_) => 1005,
            Self::InvalidMetadata(_) => 1100,
            Self::UnknownPlan(_) => 1101,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::HandlerFailed { .. } => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature
            | Self::SecretNotConfigured
            | Self::InvalidSignature(_)
            | Self::TimestampOutsideTolerance { .. }
            | Self::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            Self::InvalidMetadata(_) | Self::UnknownPlan(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(_) | Self::HandlerFailed { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` when a verified event carried data a handler cannot
    /// use. Redelivering the same payload would fail the same way.
    #[must_use]
    pub const fn is_data_shape(&self) -> bool {
        matches!(
            self,
            Self::InvalidMetadata(_) | Self::UnknownPlan(_) | Self::MalformedEvent(_)
        )
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_map_to_bad_request() {
        let errors = [
            SyncError::MissingSignature,
            SyncError::SecretNotConfigured,
            SyncError::InvalidSignature("mismatch".to_string()),
            SyncError::TimestampOutsideTolerance {
                timestamp: 0,
                tolerance_secs: 300,
            },
            SyncError::MalformedEvent("eof".to_string()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn handler_failure_is_server_error() {
        let err = SyncError::HandlerFailed {
            event_id: "evt_1".to_string(),
            event_type: "payout.paid".to_string(),
            reason: "db down".to_string(),
        };
        assert!(!err.is_data_shape());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), 3002);
    }

    #[test]
    fn metadata_problems_are_data_shape() {
        assert!(SyncError::InvalidMetadata("userId".to_string()).is_data_shape());
        assert!(SyncError::UnknownPlan("gold".to_string()).is_data_shape());
        assert!(!SyncError::Persistence("timeout".to_string()).is_data_shape());
    }

    #[test]
    fn into_response_keeps_status() {
        let response = SyncError::MissingSignature.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
