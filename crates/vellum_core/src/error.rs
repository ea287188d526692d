//! Error types for vellum core.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in vellum core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the persistence layer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed filter or value expression.
    #[error("parse error: {message}")]
    Parse {
        /// Description of the syntax problem.
        message: String,
    },

    /// Invalid argument provided to an API.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// Store directory is already open in another instance.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,
}

impl Error {
    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
