//! Wire types for the auth bootstrap endpoints
//!
//! Field names are camelCase on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::RefreshError;

/// Body of `POST /auth/refresh`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest").field("refresh_token", &"<redacted>").finish()
    }
}

/// Raw success body of `POST /auth/refresh`
///
/// `access_token` is optional so a success body without a usable token can be
/// represented and rejected by [`RefreshResponse::into_tokens`].
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl RefreshResponse {
    /// Validate the body into a usable token pair.
    ///
    /// # Errors
    /// Returns [`RefreshError::Malformed`] when the access token is missing or
    /// empty.
    pub fn into_tokens(self) -> Result<RefreshedTokens, RefreshError> {
        match self.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(RefreshedTokens {
                access_token,
                refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            }),
            _ => Err(RefreshError::Malformed("response carries no access token".to_string())),
        }
    }
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshResponse")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Validated result of a successful refresh.
///
/// `refresh_token` is only present when the server rotated it.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl RefreshedTokens {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token: None }
    }

    #[must_use]
    pub fn with_rotated_refresh(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access_token", &"<redacted>")
            .field("rotated", &self.refresh_token.is_some())
            .finish()
    }
}

/// Body of `POST /auth/login`
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Success body of `POST /auth/login`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: serde_json::Value,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse").field("user", &self.user).finish_non_exhaustive()
    }
}
