//! Session controller
//!
//! Owns one instance of every session component. Construct it once at
//! startup and share it by `Arc` with whatever builds the request pipeline;
//! pipeline and foreground triggers must use the same instance for the
//! single-refresh guarantee to hold.

use std::sync::Arc;
use std::time::Duration;

use dermalens_domain::constants::DEFAULT_REFRESH_TIMEOUT_SECS;
use dermalens_domain::{ApiConfig, Credential, Result};
use tracing::{debug, info, warn};

use super::events::AuthEvents;
use super::gate::{GateState, TokenGate};
use super::ports::{CredentialStore, TokenRefresher};
use super::pre_refresh::{PreRefreshCoordinator, PreRefreshState};
use super::refresh::RefreshCoordinator;
use super::refresh_queue::RefreshFailure;
use super::terminator::SessionTerminator;
use super::vault::CredentialVault;

/// Tunables for [`SessionController`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on one refresh exchange
    pub refresh_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS) }
    }
}

impl From<&ApiConfig> for SessionConfig {
    fn from(api: &ApiConfig) -> Self {
        Self { refresh_timeout: api.refresh_timeout() }
    }
}

/// Token lifecycle controller
pub struct SessionController {
    vault: CredentialVault,
    gate: TokenGate,
    pre_refresh: PreRefreshCoordinator,
    refresh: RefreshCoordinator,
    terminator: Arc<SessionTerminator>,
    events: AuthEvents,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        config: SessionConfig,
    ) -> Self {
        let vault = CredentialVault::new(store);
        let events = AuthEvents::new();
        let gate = TokenGate::new(vault.clone());
        let terminator = Arc::new(SessionTerminator::new(vault.clone(), events.clone()));
        let refresh = RefreshCoordinator::new(
            vault.clone(),
            gate.clone(),
            terminator.clone(),
            refresher,
            config.refresh_timeout,
        );
        let pre_refresh = PreRefreshCoordinator::new(gate.clone(), vault.clone(), refresh.clone());

        Self { vault, gate, pre_refresh, refresh, terminator, events }
    }

    /// Access token to attach to a protected request, if any.
    ///
    /// Opens the gate, running the pre-refresh first when a cold start left
    /// only a refresh token behind. Absence is not an error.
    pub async fn authorize(&self) -> Option<String> {
        if self.ensure_gate_open().await == GateState::Unresolved {
            self.run_pre_refresh_if_needed().await;
        }
        self.vault.access_token().await
    }

    /// Obtain a replacement for `rejected` after a 401.
    ///
    /// # Errors
    /// Returns the [`RefreshFailure`] shared by every caller of the cycle.
    pub async fn recover_from_unauthorized(
        &self,
        rejected: Option<&str>,
    ) -> std::result::Result<String, RefreshFailure> {
        self.refresh.recover(rejected).await
    }

    /// Signal that a valid credential is in place
    pub fn mark_token_ready(&self) {
        self.gate.mark_resolved();
    }

    pub async fn ensure_gate_open(&self) -> GateState {
        self.gate.ensure_open().await
    }

    pub async fn run_pre_refresh_if_needed(&self) {
        self.pre_refresh.run_if_needed().await;
    }

    /// Persist a freshly issued credential and open the gate.
    ///
    /// # Errors
    /// Returns the storage error if any field failed to persist; the gate is
    /// left untouched in that case.
    pub async fn establish_session(&self, credential: &Credential) -> Result<()> {
        self.vault.store_credential(credential).await?;
        self.mark_token_ready();
        info!("Session established");
        Ok(())
    }

    /// User-initiated logout. Clears credentials without an auth event.
    pub async fn logout(&self) {
        let failures = self.vault.clear().await;
        if failures > 0 {
            warn!(failures, "Logout left credential keys behind");
        }
        self.gate.reset();
        self.pre_refresh.reset();
        info!("Logged out");
    }

    /// Erase credentials and notify listeners; returns whether anything was
    /// erased
    pub async fn terminate_session(&self) -> bool {
        self.terminator.terminate().await
    }

    /// Refresh on return to foreground when a refresh token is stored.
    ///
    /// Failures are absorbed; a confirmed-invalid refresh token still ends the
    /// session. Returns whether a new access token was obtained.
    pub async fn on_foreground(&self) -> bool {
        if self.vault.refresh_token().await.is_none() {
            debug!("Foreground refresh skipped: no refresh token");
            return false;
        }
        match self.refresh.refresh_now().await {
            Ok(_) => true,
            Err(failure) => {
                debug!(error = %failure, "Foreground refresh did not produce a token");
                false
            }
        }
    }

    /// Snapshot of the stored credential
    pub async fn credential(&self) -> Credential {
        self.vault.credential().await
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn pre_refresh_state(&self) -> PreRefreshState {
        self.pre_refresh.state()
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.refresh.in_flight()
    }

    /// Callers queued behind the in-flight refresh
    pub fn refresh_waiters(&self) -> usize {
        self.refresh.waiters()
    }

    /// Refresh cycles started since construction
    pub fn refresh_cycles(&self) -> u64 {
        self.refresh.cycles()
    }

    /// Refresh-queue drains since construction
    pub fn refresh_drains(&self) -> u64 {
        self.refresh.drains()
    }
}
