//! Crate-level error types
//!
//! Repository operations report [`RepositoryError`]; everything around them
//! (configuration, connection setup, logging initialization) reports [`Error`].

use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Configuration parsed but violates a constraint
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Repository operation failed
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;

    #[test]
    fn test_repository_error_converts() {
        let error: Error =
            RepositoryError::validation_failed(RepositoryOperation::Add, "empty").into();
        assert!(matches!(error, Error::Repository(_)));
        assert!(error.to_string().contains("validation_failed"));
    }

    #[test]
    fn test_io_error_converts() {
        let error: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(error.to_string().starts_with("I/O error"));
    }
}
