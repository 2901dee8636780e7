//! Durable credential store backends

mod file;
mod keychain;

use std::sync::Arc;

use dermalens_core::CredentialStore;
use dermalens_domain::{StorageBackend, StorageConfig};
use tracing::info;

pub use file::FileCredentialStore;
pub use keychain::KeychainCredentialStore;

/// Open the backend selected by `config`
pub fn open_credential_store(config: &StorageConfig) -> Arc<dyn CredentialStore> {
    match config.backend {
        StorageBackend::Keychain => {
            info!(service = %config.service_name, "Using keychain credential store");
            Arc::new(KeychainCredentialStore::new(config.service_name.clone()))
        }
        StorageBackend::File => {
            info!(path = %config.file_path.display(), "Using file credential store");
            Arc::new(FileCredentialStore::new(config.file_path.clone()))
        }
    }
}
