//! Crate-wide error type
//!
//! Persistence failures from SQLite arrive as [`DbError`]; everything else the
//! library can refuse is described here. Nothing in this crate treats an error
//! as fatal: callers log it and keep going.

use crate::db::DbError;

/// Errors surfaced by the content store, sync layer, editor panel and transfer
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),

    /// Persistence error from a non-SQLite backend
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("{kind} {id} does not exist")]
    NotFound { kind: &'static str, id: String },

    /// One entry per failing field; blocks saves, never fatal
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Too many requests, try again in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Import rejected: {0}")]
    Import(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A newer operation with the same key took over
    #[error("Operation '{0}' was aborted")]
    Aborted(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound { kind, id: id.into() }
    }

    /// True for failures worth retrying (persistence), false for user errors
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Db(_) | Error::Backend(_) | Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_joins_fields() {
        let err = Error::Validation(vec!["Title is required".into(), "Choice 1 needs text".into()]);
        assert_eq!(
            err.to_string(),
            "Validation failed: Title is required; Choice 1 needs text"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_backend_errors_are_retryable() {
        assert!(Error::Backend("disk full".into()).is_retryable());
        assert!(!Error::Aborted("save-connections".into()).is_retryable());
    }
}
