//! Token gate
//!
//! Answers "has this process finished determining whether a credential can be
//! attached?". The gate moves `Unresolved -> Resolved` at most once per
//! process lifetime; only an explicit [`TokenGate::reset`] (logout) moves it
//! back.
//!
//! The resolution scan is single-flight: callers arriving while a scan runs
//! await that scan instead of reading storage again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::single_flight::SingleFlight;
use super::vault::CredentialVault;

/// Token gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Credential state not yet determined; a pre-refresh is warranted
    Unresolved,
    /// Safe to read the access token and attach it (if any)
    Resolved,
}

/// Process-wide token gate
#[derive(Clone)]
pub struct TokenGate {
    resolved: Arc<AtomicBool>,
    scan: Arc<SingleFlight<GateState>>,
    vault: CredentialVault,
}

impl TokenGate {
    pub fn new(vault: CredentialVault) -> Self {
        Self {
            resolved: Arc::new(AtomicBool::new(false)),
            scan: Arc::new(SingleFlight::new()),
            vault,
        }
    }

    /// Current state without any I/O
    pub fn state(&self) -> GateState {
        if self.is_resolved() {
            GateState::Resolved
        } else {
            GateState::Unresolved
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Force the gate to `Resolved` (e.g., right after login)
    pub fn mark_resolved(&self) {
        if !self.resolved.swap(true, Ordering::AcqRel) {
            debug!("Token gate resolved");
        }
    }

    /// Return the gate to `Unresolved`; only logout/login may do this
    pub fn reset(&self) {
        self.resolved.store(false, Ordering::Release);
        debug!("Token gate reset");
    }

    /// Resolve the gate if storage allows it. Never fails.
    ///
    /// Stays `Unresolved` only when a refresh token is stored without an
    /// access token.
    pub async fn ensure_open(&self) -> GateState {
        if self.is_resolved() {
            return GateState::Resolved;
        }

        let vault = self.vault.clone();
        let resolved = self.resolved.clone();
        self.scan
            .run(move || async move {
                if resolved.load(Ordering::Acquire) {
                    return GateState::Resolved;
                }
                if vault.access_token().await.is_some() {
                    resolved.store(true, Ordering::Release);
                    debug!("Token gate resolved: access token present");
                    return GateState::Resolved;
                }
                if vault.refresh_token().await.is_none() {
                    resolved.store(true, Ordering::Release);
                    debug!("Token gate resolved: no credentials stored");
                    return GateState::Resolved;
                }
                debug!("Token gate unresolved: refresh token without access token");
                GateState::Unresolved
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use dermalens_domain::StorageKey;

    use super::*;
    use crate::testing::MemoryCredentialStore;

    fn gate_with(store: &Arc<MemoryCredentialStore>) -> TokenGate {
        TokenGate::new(CredentialVault::new(store.clone()))
    }

    #[tokio::test]
    async fn resolves_when_access_token_present() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::AccessToken, "a1");
        let gate = gate_with(&store);

        assert_eq!(gate.ensure_open().await, GateState::Resolved);
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn resolves_when_logged_out() {
        let store = Arc::new(MemoryCredentialStore::new());
        let gate = gate_with(&store);

        assert_eq!(gate.ensure_open().await, GateState::Resolved);
        assert_eq!(store.reads(), 2);
    }

    #[tokio::test]
    async fn stays_unresolved_with_refresh_only() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::RefreshToken, "r1");
        let gate = gate_with(&store);

        assert_eq!(gate.ensure_open().await, GateState::Unresolved);
        assert!(!gate.is_resolved());
    }

    #[tokio::test]
    async fn resolved_gate_performs_no_reads() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::AccessToken, "a1");
        let gate = gate_with(&store);

        gate.ensure_open().await;
        let after_first = store.reads();
        for _ in 0..10 {
            assert_eq!(gate.ensure_open().await, GateState::Resolved);
        }
        assert_eq!(store.reads(), after_first);
    }

    #[tokio::test]
    async fn storage_failure_counts_as_absent() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::AccessToken, "a1");
        store.fail_reads(true);
        let gate = gate_with(&store);

        // both reads fail -> nothing stored -> resolved as logged out
        assert_eq!(gate.ensure_open().await, GateState::Resolved);
    }

    #[tokio::test]
    async fn mark_and_reset() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::RefreshToken, "r1");
        let gate = gate_with(&store);

        gate.mark_resolved();
        assert_eq!(gate.ensure_open().await, GateState::Resolved);
        assert_eq!(store.reads(), 0);

        gate.reset();
        assert_eq!(gate.state(), GateState::Unresolved);
        assert_eq!(gate.ensure_open().await, GateState::Unresolved);
    }
}
