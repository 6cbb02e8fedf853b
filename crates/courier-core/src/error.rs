//! Error types and result handling for core operations.
//!
//! The core taxonomy deliberately stays small: delivery faults (timeouts,
//! refused connections, HTTP error responses) are *outcomes* handled by the
//! delivery engine, not errors. Only genuine infrastructure and input
//! failures surface here.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for storage and validation operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The persistence layer is unavailable or a query failed.
    ///
    /// Never swallowed: surfaced to the trigger layer so the whole cycle
    /// can be re-driven, distinct from delivery retries.
    #[error("database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or referential constraint was violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                Self::ConstraintViolation(db_err.to_string())
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = CoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn error_display_is_lowercase_prefixed() {
        let err = CoreError::InvalidInput("bad url".to_string());
        assert_eq!(err.to_string(), "invalid input: bad url");
    }
}
