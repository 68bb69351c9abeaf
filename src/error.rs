use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while talking to the FinMind backend or managing the session
#[derive(Error, Debug)]
pub enum FinMindError {
    /// No usable session; the caller must re-authenticate
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend answered with a non-OK status
    ///
    /// `message` is whatever the backend said, surfaced verbatim.
    #[error("{message}")]
    Request {
        status: u16,
        message: String,
    },

    /// Network or decoding failure, passed through unchanged
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The token storage backend failed to persist a change
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Input rejected before any request was made
    #[error("Invalid input: {reason}")]
    InvalidInput {
        reason: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {reason}")]
    Config {
        key: String,
        reason: String,
    },
}

/// Failures below the HTTP status level
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Response body claimed to be JSON but could not be decoded
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Errors raised by key/value storage backends
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Error categories used by the UI to decide how to present a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Session is gone; redirect to sign-in
    Authentication,
    /// Backend rejected the request (validation, business rule, not found)
    Backend,
    /// Network failures or malformed responses
    Network,
    /// Local token persistence failed
    Storage,
    /// Input rejected client-side
    Validation,
    /// Misconfigured client
    Configuration,
}

impl ErrorCategory {
    /// Returns true if a manual retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Authentication => write!(f, "Authentication"),
            ErrorCategory::Backend => write!(f, "Backend"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
        }
    }
}

impl FinMindError {
    /// Create a backend request error
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        FinMindError::Request {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        FinMindError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        FinMindError::Config {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Get the category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            FinMindError::Unauthorized => ErrorCategory::Authentication,
            FinMindError::Request { .. } => ErrorCategory::Backend,
            FinMindError::Transport(_) => ErrorCategory::Network,
            FinMindError::Storage(_) => ErrorCategory::Storage,
            FinMindError::InvalidInput { .. } => ErrorCategory::Validation,
            FinMindError::Config { .. } => ErrorCategory::Configuration,
        }
    }

    /// True for errors that require the user to sign in again
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FinMindError::Unauthorized)
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FinMindError::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            FinMindError::Request { status, .. } => StatusCode::from_u16(*status).ok(),
            _ => None,
        }
    }
}

/// Custom Result type for FinMind client operations
pub type FinMindResult<T> = Result<T, FinMindError>;
