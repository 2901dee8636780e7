//! Credential store adapter
//!
//! Wraps a [`CredentialStore`] with the session's read policy: a failed read
//! is logged and treated as "absent", so gate and refresh logic never fail on
//! storage errors.

use std::sync::Arc;

use dermalens_domain::{Credential, Result, StorageKey};
use tracing::{debug, warn};

use super::ports::CredentialStore;

/// Typed view over the credential keys of a [`CredentialStore`]
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn CredentialStore>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    async fn read(&self, key: StorageKey) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                warn!(key = %key, error = %err, "Credential read failed, treating as absent");
                None
            }
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read(StorageKey::AccessToken).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.read(StorageKey::RefreshToken).await
    }

    /// Stored user blob; an unparsable blob is treated as absent
    pub async fn user(&self) -> Option<serde_json::Value> {
        let raw = self.read(StorageKey::User).await?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(error = %err, "Stored user blob is not valid JSON");
                None
            }
        }
    }

    pub async fn credential(&self) -> Credential {
        Credential {
            access_token: self.access_token().await,
            refresh_token: self.refresh_token().await,
            user: self.user().await,
        }
    }

    /// Whether any of the three credential keys is present
    pub async fn has_any(&self) -> bool {
        for key in StorageKey::CREDENTIALS {
            if self.read(key).await.is_some() {
                return true;
            }
        }
        false
    }

    /// Like [`has_any`](Self::has_any), but an unreadable key counts as
    /// present. `false` only when every key was read and came back empty.
    pub async fn may_hold_credentials(&self) -> bool {
        for key in StorageKey::CREDENTIALS {
            match self.store.get(key).await {
                Ok(Some(value)) if !value.is_empty() => return true,
                Ok(_) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "Credential presence unknown");
                    return true;
                }
            }
        }
        false
    }

    pub async fn store_access_token(&self, token: &str) -> Result<()> {
        self.store.set(StorageKey::AccessToken, token).await
    }

    pub async fn store_refresh_token(&self, token: &str) -> Result<()> {
        self.store.set(StorageKey::RefreshToken, token).await
    }

    /// Persist every present field; completes only once all writes landed.
    ///
    /// # Errors
    /// Returns the first storage error; earlier writes are not rolled back.
    pub async fn store_credential(&self, credential: &Credential) -> Result<()> {
        if let Some(access) = &credential.access_token {
            self.store.set(StorageKey::AccessToken, access).await?;
        }
        if let Some(refresh) = &credential.refresh_token {
            self.store.set(StorageKey::RefreshToken, refresh).await?;
        }
        if let Some(user) = &credential.user {
            let blob = serde_json::to_string(user).map_err(|e| {
                dermalens_domain::DermalensError::Serialization(format!(
                    "Failed to serialize user: {e}"
                ))
            })?;
            self.store.set(StorageKey::User, &blob).await?;
        }
        debug!("Credential persisted");
        Ok(())
    }

    /// Remove the three credential keys.
    ///
    /// Every key is attempted even if an earlier removal fails; returns the
    /// number of keys that could not be removed.
    pub async fn clear(&self) -> usize {
        let mut failures = 0;
        for key in StorageKey::CREDENTIALS {
            if let Err(err) = self.store.remove(key).await {
                warn!(key = %key, error = %err, "Failed to remove credential key");
                failures += 1;
            }
        }
        failures
    }
}
