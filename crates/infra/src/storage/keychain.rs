//! Platform keychain backend
//!
//! One keychain entry per [`StorageKey`] under a shared service name
//! (macOS Keychain, Windows Credential Manager, Secret Service on Linux).

use async_trait::async_trait;
use dermalens_core::CredentialStore;
use dermalens_domain::{DermalensError, Result, StorageKey};
use keyring::Entry;
use tokio::task;
use tracing::debug;

use crate::errors::InfraError;

pub struct KeychainCredentialStore {
    service_name: String,
}

impl KeychainCredentialStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Run a keychain operation off the async runtime
    async fn with_entry<T, F>(&self, key: StorageKey, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> std::result::Result<T, keyring::Error> + Send + 'static,
    {
        let service = self.service_name.clone();
        task::spawn_blocking(move || -> Result<T> {
            let entry = Entry::new(&service, key.as_str()).map_err(InfraError::from)?;
            op(entry).map_err(|e| InfraError::from(e).into())
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl CredentialStore for KeychainCredentialStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>> {
        debug!(service = %self.service_name, %key, "Reading keychain entry");
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err),
        })
        .await
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        debug!(service = %self.service_name, %key, "Writing keychain entry");
        let value = value.to_string();
        self.with_entry(key, move |entry| entry.set_password(&value)).await
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        debug!(service = %self.service_name, %key, "Deleting keychain entry");
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err),
        })
        .await
    }
}

fn map_join_error(err: task::JoinError) -> DermalensError {
    DermalensError::Storage(format!("keychain task failed: {err}"))
}
