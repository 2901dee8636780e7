//! Session terminator
//!
//! Erases every credential key and tells listeners the session is over.
//! Callers decide when termination is warranted; this only performs it.

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::events::{AuthEvent, AuthEvents};
use super::vault::CredentialVault;

/// Idempotent credential wipe plus auth-changed notification
pub struct SessionTerminator {
    vault: CredentialVault,
    events: AuthEvents,
    serial: Mutex<()>,
}

impl SessionTerminator {
    pub fn new(vault: CredentialVault, events: AuthEvents) -> Self {
        Self { vault, events, serial: Mutex::new(()) }
    }

    /// Erase credentials and emit [`AuthEvent::SessionTerminated`].
    ///
    /// The keys are always removed. The event is skipped only when storage
    /// confirmed nothing was stored, so an unreadable store still terminates.
    /// Returns whether a termination was signalled.
    pub async fn terminate(&self) -> bool {
        let _serial = self.serial.lock().await;

        let held = self.vault.may_hold_credentials().await;
        let failures = self.vault.clear().await;
        if !held {
            return false;
        }

        if failures > 0 {
            warn!(failures, "Session terminated with keys left behind");
        }
        info!("Session terminated; credentials erased");
        self.events.emit(AuthEvent::SessionTerminated);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use dermalens_domain::StorageKey;

    use super::*;
    use crate::testing::MemoryCredentialStore;

    fn terminator(store: &Arc<MemoryCredentialStore>) -> (Arc<SessionTerminator>, Arc<AtomicUsize>) {
        let events = AuthEvents::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        events.register(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let terminator = SessionTerminator::new(CredentialVault::new(store.clone()), events);
        (Arc::new(terminator), fired)
    }

    #[tokio::test]
    async fn erases_and_notifies_once() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::AccessToken, "a1");
        store.insert(StorageKey::RefreshToken, "r1");
        store.insert(StorageKey::User, "{}");
        let (terminator, fired) = terminator(&store);

        assert!(terminator.terminate().await);
        assert!(!terminator.terminate().await);

        for key in StorageKey::CREDENTIALS {
            assert_eq!(store.value(key), None);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn nothing_stored_is_a_noop() {
        let store = Arc::new(MemoryCredentialStore::new());
        let (terminator, fired) = terminator(&store);

        assert!(!terminator.terminate().await);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreadable_store_is_still_wiped() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::AccessToken, "a1");
        store.insert(StorageKey::RefreshToken, "r1");
        store.fail_reads(true);
        let (terminator, fired) = terminator(&store);

        assert!(terminator.terminate().await);
        for key in StorageKey::CREDENTIALS {
            assert_eq!(store.value(key), None);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_terminations_emit_once() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(StorageKey::RefreshToken, "r1");
        let (terminator, fired) = terminator(&store);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let terminator = terminator.clone();
                tokio::spawn(async move { terminator.terminate().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
