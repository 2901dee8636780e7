//! Error types used throughout the application

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Dermalens
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DermalensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Dermalens operations
pub type Result<T> = std::result::Result<T, DermalensError>;

/// Failure of a single `POST /auth/refresh` exchange.
///
/// Only [`RefreshError::Rejected`] is a confirmed-invalid refresh token; every
/// other variant is transient and must never clear stored credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The server refused the refresh token (401/403).
    #[error("refresh token rejected with status {status}")]
    Rejected { status: u16 },

    /// Any other non-success status.
    #[error("refresh endpoint returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("refresh request timed out after {0:?}")]
    Timeout(Duration),

    /// Success status with a body that does not carry a usable token.
    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl RefreshError {
    /// Whether the server confirmed the refresh token is dead.
    #[must_use]
    pub fn is_confirmed_invalid(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Classify a non-success refresh status.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 401 || status == 403 {
            Self::Rejected { status }
        } else {
            Self::Status { status, message: message.into() }
        }
    }
}
