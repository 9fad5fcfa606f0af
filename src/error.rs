//! Error types for the lending server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Machine-readable error codes returned alongside every error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    InvalidOperation = 5,
    Duplicate = 6,
    BadValue = 7,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Translate a violation of the given kind into `Conflict(message)`.
    ///
    /// Other unique, foreign key or check violations become a `Conflict`
    /// naming the constraint; any other error passes through untouched.
    pub fn on_constraint(err: sqlx::Error, kind: ErrorKind, message: &str) -> Self {
        let Some(db) = err.as_database_error() else {
            return AppError::Database(err);
        };
        match db.kind() {
            k if k == kind => AppError::Conflict(message.to_string()),
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::CheckViolation => AppError::Conflict(format!(
                "Constraint violated: {}",
                db.constraint().unwrap_or("unknown")
            )),
            _ => AppError::Database(err),
        }
    }

    /// Numeric overflow of a column (SQLSTATE 22003)
    pub fn is_out_of_range(err: &sqlx::Error) -> bool {
        err.as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "22003")
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NotFound, msg.clone()),
            AppError::InvalidOperation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidOperation, msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidOperation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[derive(Debug)]
    struct Violation {
        constraint: &'static str,
        code: &'static str,
    }

    impl std::fmt::Display for Violation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "violates {}", self.constraint)
        }
    }

    impl std::error::Error for Violation {}

    impl sqlx::error::DatabaseError for Violation {
        fn message(&self) -> &str {
            "violation"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.code.into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn constraint(&self) -> Option<&str> {
            Some(self.constraint)
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                "23514" => ErrorKind::CheckViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn violation(constraint: &'static str, code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(Violation { constraint, code }))
    }

    #[test]
    fn test_non_database_error_is_not_a_conflict() {
        let err = AppError::on_constraint(
            sqlx::Error::RowNotFound,
            ErrorKind::UniqueViolation,
            "dup",
        );
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn test_expected_violation_gets_caller_message() {
        let err = AppError::on_constraint(
            violation("books_isbn_key", "23505"),
            ErrorKind::UniqueViolation,
            "ISBN already exists",
        );
        assert!(matches!(err, AppError::Conflict(msg) if msg == "ISBN already exists"));
    }

    #[test]
    fn test_other_violation_names_its_constraint() {
        let err = AppError::on_constraint(
            violation("books_copies_check", "23514"),
            ErrorKind::UniqueViolation,
            "ISBN already exists",
        );
        assert!(
            matches!(err, AppError::Conflict(msg) if msg == "Constraint violated: books_copies_check")
        );
    }

    #[test]
    fn test_out_of_range_detection() {
        let overflow = violation("", "22003");
        assert!(AppError::is_out_of_range(&overflow));
        assert!(!AppError::is_out_of_range(&sqlx::Error::RowNotFound));
        assert!(matches!(
            AppError::on_constraint(overflow, ErrorKind::UniqueViolation, "dup"),
            AppError::Database(_)
        ));
    }
}
