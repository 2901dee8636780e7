//! JSON file backend
//!
//! Stores every key in a single JSON object. Writes go to a sibling temp
//! file first and are renamed into place; on unix the file is owner-only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dermalens_core::CredentialStore;
use dermalens_domain::{Result, StorageKey};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::InfraError;

type Entries = HashMap<String, String>;

pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Entries> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Entries::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| InfraError::from(e).into()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    async fn save(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(InfraError::from)?;
        }

        let bytes = serde_json::to_vec_pretty(entries).map_err(InfraError::from)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(InfraError::from)?;
        restrict_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(InfraError::from)?;
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Entries) -> bool,
    {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if mutate(&mut entries) {
            self.save(&entries).await?;
        }
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| InfraError::from(e).into())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await.inspect_err(|err| {
            warn!(path = %self.path.display(), error = %err, "Failed to read credential file");
        })?;
        Ok(entries.remove(key.as_str()))
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        debug!(%key, "Writing credential file entry");
        self.update(|entries| {
            entries.insert(key.as_str().to_string(), value.to_string());
            true
        })
        .await
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        debug!(%key, "Removing credential file entry");
        self.update(|entries| entries.remove(key.as_str()).is_some()).await
    }
}
