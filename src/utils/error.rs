use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::engine::EngineError;
use crate::store::StoreError;
use crate::utils::response::error as error_response;

/// Request-level error taxonomy. Every registration-engine outcome maps to
/// its own stable code so the frontend can render precise state (disable the
/// register button on ALREADY_REGISTERED, show "event full" on EVENT_FULL,
/// and so on) instead of pattern-matching messages.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Event full: {0}")]
    EventFull(String),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Duplicate feedback: {0}")]
    DuplicateFeedback(String),

    #[error("Invalid rating: {0}")]
    InvalidRating(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidRating(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyRegistered(_)
            | AppError::EventFull(_)
            | AppError::DuplicateFeedback(_)
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            AppError::EventFull(_) => "EVENT_FULL",
            AppError::NotEligible(_) => "NOT_ELIGIBLE",
            AppError::DuplicateFeedback(_) => "DUPLICATE_FEEDBACK",
            AppError::InvalidRating(_) => "INVALID_RATING",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            other => {
                error!(error = ?other, code = other.code(), "Request failed");
            }
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound => AppError::NotFound("Event not found".to_string()),
            EngineError::Forbidden => {
                AppError::Forbidden("You can only manage your own registration".to_string())
            }
            EngineError::AlreadyRegistered => {
                AppError::AlreadyRegistered("Already registered for this event".to_string())
            }
            EngineError::EventFull => AppError::EventFull("Event is full".to_string()),
            EngineError::NotEligible(reason) => AppError::NotEligible(reason.to_string()),
            EngineError::DuplicateFeedback => AppError::DuplicateFeedback(
                "Feedback already submitted for this event".to_string(),
            ),
            EngineError::InvalidRating(_) => AppError::InvalidRating(err.to_string()),
            EngineError::Conflict => AppError::Conflict(
                "The event was updated concurrently, please retry".to_string(),
            ),
            EngineError::Backend(store_err) => {
                AppError::InternalServerError(format!("event store failure: {store_err}"))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Event not found".to_string()),
            StoreError::Conflict => AppError::Conflict(
                "The event was updated concurrently, please retry".to_string(),
            ),
            StoreError::Backend(e) => AppError::DatabaseError(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Internal faults keep their details out of the response body.
        let public_message = match &self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        error_response(code, public_message, None, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_distinct_codes() {
        let cases = [
            (EngineError::NotFound, "NOT_FOUND"),
            (EngineError::Forbidden, "FORBIDDEN"),
            (EngineError::AlreadyRegistered, "ALREADY_REGISTERED"),
            (EngineError::EventFull, "EVENT_FULL"),
            (EngineError::NotEligible("nope"), "NOT_ELIGIBLE"),
            (EngineError::DuplicateFeedback, "DUPLICATE_FEEDBACK"),
            (EngineError::InvalidRating(9), "INVALID_RATING"),
            (EngineError::Conflict, "CONFLICT"),
        ];
        for (engine_err, expected) in cases {
            assert_eq!(AppError::from(engine_err).code(), expected);
        }
    }

    #[test]
    fn registration_conflicts_are_409() {
        assert_eq!(
            AppError::AlreadyRegistered(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::EventFull(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidRating(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
