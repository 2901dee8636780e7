//! Pre-refresh coordinator
//!
//! On a cold start with a refresh token but no access token, trade the
//! refresh token for an access token before the first protected request goes
//! out. Runs at most once per app-start window and never fails; whatever
//! happens, the gate ends up `Resolved`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::gate::TokenGate;
use super::refresh::RefreshCoordinator;
use super::single_flight::SingleFlight;
use super::vault::CredentialVault;

/// Progress of the pre-refresh for the current app-start window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreRefreshState {
    NotStarted,
    InFlight,
    Done,
}

#[derive(Clone)]
pub struct PreRefreshCoordinator {
    state: Arc<Mutex<PreRefreshState>>,
    flight: Arc<SingleFlight<()>>,
    gate: TokenGate,
    vault: CredentialVault,
    refresh: RefreshCoordinator,
}

impl PreRefreshCoordinator {
    pub fn new(gate: TokenGate, vault: CredentialVault, refresh: RefreshCoordinator) -> Self {
        Self {
            state: Arc::new(Mutex::new(PreRefreshState::NotStarted)),
            flight: Arc::new(SingleFlight::new()),
            gate,
            vault,
            refresh,
        }
    }

    pub fn state(&self) -> PreRefreshState {
        *self.state.lock()
    }

    /// Start a new app-start window
    pub fn reset(&self) {
        *self.state.lock() = PreRefreshState::NotStarted;
    }

    /// Run the pre-refresh unless the gate is already resolved or this
    /// window's attempt has completed. Concurrent callers share one attempt.
    pub async fn run_if_needed(&self) {
        if self.gate.is_resolved() || self.state() == PreRefreshState::Done {
            return;
        }

        let this = self.clone();
        self.flight.run(move || async move { this.attempt().await }).await;
    }

    async fn attempt(&self) {
        if self.gate.is_resolved() {
            return;
        }
        {
            let mut state = self.state.lock();
            if *state == PreRefreshState::Done {
                return;
            }
            *state = PreRefreshState::InFlight;
        }

        self.refresh_if_warranted().await;

        self.gate.mark_resolved();
        *self.state.lock() = PreRefreshState::Done;
    }

    async fn refresh_if_warranted(&self) {
        if self.vault.refresh_token().await.is_none() {
            debug!("Pre-refresh skipped: no refresh token");
            return;
        }
        if self.vault.access_token().await.is_some() {
            debug!("Pre-refresh skipped: access token present");
            return;
        }

        match self.refresh.refresh_now().await {
            Ok(_) => info!("Pre-refresh obtained an access token"),
            Err(failure) if failure.is_confirmed_invalid() => {
                info!(error = %failure, "Pre-refresh ended the session");
            }
            Err(failure) => warn!(error = %failure, "Pre-refresh failed; continuing without token"),
        }
    }
}
