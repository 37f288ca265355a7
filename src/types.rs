//! Shared error type for the ritual service.
//!
//! Every fallible path funnels into [`RitualError`]; route handlers map a
//! variant to its HTTP status through [`RitualError::status_code`] so the
//! wire taxonomy stays in one place.

use hyper::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RitualError>;

#[derive(Debug, Error)]
pub enum RitualError {
    /// Request payload failed validation. The string is the client-facing
    /// message.
    #[error("{0}")]
    Validation(String),

    /// A date string that neither RFC 3339 nor `YYYY-MM-DD` could parse.
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    /// Habit duration outside the supported range.
    #[error("Duration must be between 1 and 365 days")]
    InvalidDuration(i64),

    /// Day-title list length does not match the habit duration.
    #[error("Schedule requires {expected} day titles, got {got}")]
    ScheduleMismatch { expected: usize, got: usize },

    /// Target date lies before the habit start or after its last day.
    #[error("Date is outside habit duration")]
    DateOutOfRange,

    /// Target date is inside the range but has no schedule record.
    #[error("Date not found in habit schedule")]
    DateNotScheduled,

    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed Authorization header.
    #[error("{0}")]
    Unauthorized(String),

    /// Token present but failed signature or expiry checks.
    #[error("{0}")]
    InvalidToken(String),

    /// An upstream collaborator (the AI planner) failed.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RitualError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RitualError::Validation(_)
            | RitualError::InvalidDateFormat(_)
            | RitualError::InvalidDuration(_)
            | RitualError::ScheduleMismatch { .. }
            | RitualError::DateOutOfRange
            | RitualError::DateNotScheduled => StatusCode::BAD_REQUEST,
            RitualError::NotFound(_) => StatusCode::NOT_FOUND,
            RitualError::Unauthorized(_) | RitualError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            RitualError::ExternalService(_) => StatusCode::SERVICE_UNAVAILABLE,
            RitualError::Database(_) | RitualError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<std::io::Error> for RitualError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_bad_request() {
        assert_eq!(
            RitualError::DateOutOfRange.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RitualError::DateNotScheduled.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RitualError::InvalidDuration(400).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_boundary_errors_keep_their_statuses() {
        assert_eq!(
            RitualError::NotFound("Habit not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RitualError::InvalidToken("Invalid token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RitualError::ExternalService("planner timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RitualError::Database("insert failed".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_messages_are_client_ready() {
        let err = RitualError::Validation("All fields are required".into());
        assert_eq!(err.to_string(), "All fields are required");

        let err = RitualError::DateOutOfRange;
        assert_eq!(err.to_string(), "Date is outside habit duration");
    }
}
