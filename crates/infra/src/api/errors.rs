//! API-specific error types
//!
//! Provides error classification for API operations with retry metadata.

use std::time::Duration;

use dermalens_core::RefreshFailure;
use dermalens_domain::DermalensError;
use thiserror::Error;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403, failed refresh)
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Client errors (4xx except auth) - non-retryable
    Client,
    /// Network/connection errors - retryable
    Network,
    /// Configuration, decoding and storage errors - non-retryable
    Config,
}

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// A 401 could not be recovered because the refresh failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::RefreshFailed(_) => {
                ApiErrorCategory::Authentication
            }
            Self::RateLimit(_) => ApiErrorCategory::RateLimit,
            Self::Server(_) => ApiErrorCategory::Server,
            Self::Client(_) => ApiErrorCategory::Client,
            Self::Network(_) | Self::Timeout(_) => ApiErrorCategory::Network,
            Self::Decode(_) | Self::Storage(_) | Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Check if this error is worth retrying later.
    ///
    /// Authentication errors are not: the pipeline already spent its one
    /// recovery attempt.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::RefreshFailed(failure) => {
                matches!(failure, RefreshFailure::Transient(_) | RefreshFailure::Timeout(_))
            }
            _ => matches!(
                self.category(),
                ApiErrorCategory::RateLimit | ApiErrorCategory::Server | ApiErrorCategory::Network
            ),
        }
    }

    /// Get suggested retry delay in seconds
    pub fn retry_delay_secs(&self) -> u64 {
        if !self.should_retry() {
            return 0;
        }
        match self.category() {
            ApiErrorCategory::RateLimit => 60,
            ApiErrorCategory::Server => 10,
            _ => 5,
        }
    }

    /// Whether the session is gone and the user has to sign in again
    pub fn requires_login(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::RefreshFailed(failure) => {
                matches!(failure, RefreshFailure::Rejected { .. } | RefreshFailure::NoRefreshToken)
            }
            _ => false,
        }
    }
}

impl From<DermalensError> for ApiError {
    fn from(err: DermalensError) -> Self {
        match err {
            DermalensError::Network(message) => Self::Network(message),
            DermalensError::Auth(message) => Self::Unauthorized(message),
            DermalensError::Config(message) => Self::Config(message),
            DermalensError::Storage(message) => Self::Storage(message),
            DermalensError::Serialization(message) => Self::Decode(message),
            DermalensError::Internal(message) => Self::Client(message),
        }
    }
}
