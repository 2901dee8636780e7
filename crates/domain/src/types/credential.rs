//! Credential triple and its persisted key layout

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keys of the persisted key-value layout.
///
/// The string values are the on-disk names and must stay stable across
/// releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKey {
    #[serde(rename = "accessToken")]
    AccessToken,
    #[serde(rename = "refreshToken")]
    RefreshToken,
    /// Serialized user profile blob
    #[serde(rename = "user")]
    User,
    /// Unrelated app setting sharing the same store; never touched by the
    /// session core
    #[serde(rename = "voiceWakeEnabled")]
    VoiceWakeEnabled,
}

impl StorageKey {
    /// The three keys that make up a session.
    pub const CREDENTIALS: [Self; 3] = [Self::AccessToken, Self::RefreshToken, Self::User];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessToken => "accessToken",
            Self::RefreshToken => "refreshToken",
            Self::User => "user",
            Self::VoiceWakeEnabled => "voiceWakeEnabled",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session credential; any subset may be absent.
///
/// Token values are redacted from `Debug` output.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<serde_json::Value>,
}

impl Credential {
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        user: serde_json::Value,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            user: Some(user),
        }
    }

    /// True when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}
