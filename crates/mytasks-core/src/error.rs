//! Error types for the mytasks core library.

use thiserror::Error;

/// Core error types, raised before anything reaches storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid project type: {0:?}")]
    InvalidProjectType(String),

    #[error("invalid priority: {0:?}")]
    InvalidPriority(String),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
