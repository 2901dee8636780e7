//! Port interfaces for the session core
//!
//! These traits define the boundaries between the session lifecycle logic
//! and infrastructure implementations (keychain, files, HTTP).

use async_trait::async_trait;
use dermalens_domain::{RefreshError, RefreshedTokens, Result, StorageKey};

/// Durable key-value persistence shared by every session component.
///
/// No component owns the store exclusively; implementations must tolerate
/// interleaved calls from concurrent tasks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value, `None` when the key is absent
    async fn get(&self, key: StorageKey) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: StorageKey, value: &str) -> Result<()>;

    /// Remove a value; removing an absent key succeeds
    async fn remove(&self, key: StorageKey) -> Result<()>;
}

/// Exchanges a refresh token for a new access token.
///
/// Implementations issue exactly one `POST /auth/refresh` per call, without
/// any access credential attached, and do not retry.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refresh the access token
    ///
    /// # Errors
    /// [`RefreshError::Rejected`] when the server confirms the refresh token
    /// is invalid; any other variant for transient failures.
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<RefreshedTokens, RefreshError>;
}
