//! Unified error type for the exopf workspace.
//!
//! Domain-specific error enums (susceptance, sensitivity, solver backends)
//! convert into [`ExopfError`] at API boundaries so callers handle one type.

use thiserror::Error;

/// Unified error type for all exopf operations.
#[derive(Error, Debug)]
pub enum ExopfError {
    /// Incompatible or malformed configuration. Raised before any solver call.
    #[error("configuration error: {0}")]
    Config(String),

    /// A requested feature combination the engine does not support.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Network data failed structural validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The optimization problem is infeasible.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// The backend failed or returned an unusable status.
    #[error("solver error: {0}")]
    Solver(String),

    /// I/O errors (trace dumps, backend option files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors (for wrapping external errors).
    #[error("{0}")]
    Other(String),
}

/// Convenience alias for Results using ExopfError.
pub type ExopfResult<T> = Result<T, ExopfError>;

impl From<anyhow::Error> for ExopfError {
    fn from(err: anyhow::Error) -> Self {
        ExopfError::Other(err.to_string())
    }
}

impl From<String> for ExopfError {
    fn from(s: String) -> Self {
        ExopfError::Other(s)
    }
}

impl From<&str> for ExopfError {
    fn from(s: &str) -> Self {
        ExopfError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for ExopfError {
    fn from(err: serde_json::Error) -> Self {
        ExopfError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExopfError::Config("update_x with integer_bigm".into());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("update_x"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ExopfResult<()> {
            Err(ExopfError::Validation("test".into()))
        }

        fn outer() -> ExopfResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ExopfError = io_err.into();
        assert!(matches!(err, ExopfError::Io(_)));
    }
}
