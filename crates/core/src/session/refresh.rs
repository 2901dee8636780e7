//! Refresh coordinator
//!
//! The only caller of [`TokenRefresher`]. Every trigger (pre-refresh, 401
//! recovery, foreground) goes through [`RefreshCoordinator::refresh_now`], so
//! at most one network refresh is in flight per process.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::gate::TokenGate;
use super::ports::TokenRefresher;
use super::refresh_queue::{RefreshFailure, RefreshLease, RefreshOutcome, RefreshQueue, Ticket};
use super::terminator::SessionTerminator;
use super::vault::CredentialVault;

/// Leader logic around the [`RefreshQueue`]
#[derive(Clone)]
pub struct RefreshCoordinator {
    vault: CredentialVault,
    gate: TokenGate,
    terminator: Arc<SessionTerminator>,
    refresher: Arc<dyn TokenRefresher>,
    queue: RefreshQueue,
    timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        vault: CredentialVault,
        gate: TokenGate,
        terminator: Arc<SessionTerminator>,
        refresher: Arc<dyn TokenRefresher>,
        timeout: Duration,
    ) -> Self {
        Self { vault, gate, terminator, refresher, queue: RefreshQueue::new(), timeout }
    }

    /// Obtain a fresh access token, joining the in-flight cycle if any.
    ///
    /// The leading attempt runs on its own task, so a caller that stops
    /// waiting does not abandon the cycle for everyone else.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        match self.queue.join() {
            Ticket::Follow(waiter) => waiter.wait().await,
            Ticket::Lead(lease) => {
                let leader = self.clone();
                match tokio::spawn(async move { leader.lead(lease).await }).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(error = %err, "Refresh task aborted");
                        Err(RefreshFailure::Cancelled)
                    }
                }
            }
        }
    }

    /// Recover from a 401 received for a request sent with `rejected`.
    ///
    /// When no cycle is in flight and storage already holds a different
    /// access token, a concurrent cycle rotated it after the request was
    /// sent; that token is returned without a network call.
    pub async fn recover(&self, rejected: Option<&str>) -> RefreshOutcome {
        if !self.queue.is_refreshing() {
            if let Some(current) = self.vault.access_token().await {
                if rejected != Some(current.as_str()) {
                    debug!("Access token already rotated since request was sent");
                    return Ok(current);
                }
            }
        }
        self.refresh_now().await
    }

    pub fn in_flight(&self) -> bool {
        self.queue.is_refreshing()
    }

    /// Callers waiting on the in-flight cycle
    pub fn waiters(&self) -> usize {
        self.queue.pending()
    }

    /// Refresh cycles started so far
    pub fn cycles(&self) -> u64 {
        self.queue.cycles()
    }

    /// Queue drains so far
    pub fn drains(&self) -> u64 {
        self.queue.drains()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lead(&self, lease: RefreshLease) -> RefreshOutcome {
        let outcome = self.exchange().await;

        if let Err(failure) = &outcome {
            if failure.is_confirmed_invalid() {
                info!(error = %failure, "Refresh token confirmed invalid; terminating session");
                self.terminator.terminate().await;
            } else {
                warn!(error = %failure, "Refresh failed; credentials kept");
            }
        }

        let waiters = lease.settle(&outcome);
        debug!(waiters, success = outcome.is_ok(), "Refresh cycle settled");
        outcome
    }

    async fn exchange(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.vault.refresh_token().await else {
            debug!("No refresh token stored; nothing to refresh");
            return Err(RefreshFailure::NoRefreshToken);
        };

        let tokens =
            match tokio::time::timeout(self.timeout, self.refresher.refresh(&refresh_token)).await {
                Ok(Ok(tokens)) => tokens,
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(RefreshFailure::Timeout(self.timeout)),
            };

        if tokens.access_token.is_empty() {
            return Err(RefreshFailure::MissingAccessToken);
        }

        if let Err(err) = self.vault.store_access_token(&tokens.access_token).await {
            warn!(error = %err, "Failed to persist refreshed access token");
        }
        if let Some(rotated) = &tokens.refresh_token {
            if let Err(err) = self.vault.store_refresh_token(rotated).await {
                warn!(error = %err, "Failed to persist rotated refresh token");
            }
        }
        self.gate.mark_resolved();
        info!(rotated = tokens.refresh_token.is_some(), "Access token refreshed");

        Ok(tokens.access_token)
    }
}
