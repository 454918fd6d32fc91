//! Error types for filevault.

use thiserror::Error;

use crate::auth::{PasswordError, ValidationError};

/// Common error type for filevault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant with their message.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The acting user does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Resource conflicts with an existing one (e.g. duplicate folder name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An upload would exceed the user's storage quota.
    #[error("storage quota exceeded: requested {requested} bytes, {available} bytes available")]
    StorageExceeded {
        /// Bytes the operation needs.
        requested: u64,
        /// Bytes left in the quota.
        available: u64,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for VaultError {
    fn from(e: sqlx::Error) -> Self {
        VaultError::Database(e.to_string())
    }
}

impl From<ValidationError> for VaultError {
    fn from(e: ValidationError) -> Self {
        VaultError::Validation(e.to_string())
    }
}

impl From<PasswordError> for VaultError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort | PasswordError::TooLong => {
                VaultError::Validation(e.to_string())
            }
            _ => VaultError::Auth(e.to_string()),
        }
    }
}

/// Result type alias for filevault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
