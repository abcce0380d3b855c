//! Error types for the visit counter service.

use thiserror::Error;

/// Errors raised by a key-value store backend.
///
/// A missing key is not an error; stores report it as `None`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered, but the command failed.
    #[error("store command failed: {0}")]
    Command(String),

    /// The value stored under a key is not a visit count.
    #[error("invalid value stored under {key:?}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl StoreError {
    /// Whether this error means the backend itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Main error type for visit counter operations.
#[derive(Error, Debug)]
pub enum VisitsError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A client identifier that cannot be used as a store key
    #[error("Invalid client identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Page template loading or rendering errors
    #[error("Render error: {0}")]
    Render(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for VisitsError {
    fn from(err: config::ConfigError) -> Self {
        VisitsError::Config(err.to_string())
    }
}

/// Result type alias for visit counter operations.
pub type Result<T> = std::result::Result<T, VisitsError>;
