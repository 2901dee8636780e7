//! Wiring of one process-wide session
//!
//! Builds the credential store, refresher, [`SessionController`] and API
//! clients from a [`Config`], sharing a single controller between all of
//! them.

use std::sync::Arc;

use dermalens_core::{CredentialStore, SessionConfig, SessionController};
use dermalens_domain::Config;
use tracing::info;

use crate::api::{ApiClient, ApiError, AuthApi, HttpTokenRefresher};
use crate::storage::open_credential_store;

/// Session controller plus the clients bound to it
pub struct SessionStack {
    pub session: Arc<SessionController>,
    pub api: Arc<ApiClient>,
    pub auth: AuthApi,
}

impl SessionStack {
    /// Build the stack over the store selected by `config.storage`.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if an HTTP client cannot be built
    pub fn connect(config: &Config) -> Result<Self, ApiError> {
        Self::with_store(config, open_credential_store(&config.storage))
    }

    /// Build the stack over an explicit store
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if an HTTP client cannot be built
    pub fn with_store(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let refresher = Arc::new(HttpTokenRefresher::new(&config.api)?);
        let session = Arc::new(SessionController::new(
            store,
            refresher,
            SessionConfig::from(&config.api),
        ));
        let api = Arc::new(ApiClient::new(config.api.clone(), session.clone())?);
        let auth = AuthApi::new(api.clone());

        info!(base_url = %config.api.base_url, "Session stack ready");
        Ok(Self { session, api, auth })
    }
}
