//! Auth-changed notification channel
//!
//! Navigation and UI code learn about session termination from here, either
//! through registered callbacks or a broadcast subscription.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 16;

/// Auth state changes observable outside the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Credentials were erased because the refresh token is dead
    SessionTerminated,
}

/// Handle returned by [`AuthEvents::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

type Listener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

/// Fan-out of [`AuthEvent`]s to callbacks and broadcast subscribers
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
    listeners: Arc<Mutex<HashMap<ListenerId, Listener>>>,
    next_id: Arc<AtomicU64>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx, listeners: Arc::default(), next_id: Arc::new(AtomicU64::new(1)) }
    }

    /// Register a callback invoked synchronously on every event
    pub fn register<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(AuthEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, Arc::new(callback));
        debug!(listener = %id, "Auth listener registered");
        id
    }

    /// Returns `false` if the listener was not registered
    pub fn unregister(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn emit(&self, event: AuthEvent) {
        // snapshot so a callback may register or unregister without deadlocking
        let listeners: Vec<Listener> = self.listeners.lock().values().cloned().collect();
        for listener in &listeners {
            listener(event);
        }
        // no subscribers is fine
        let _ = self.tx.send(event);
        debug!(?event, listeners = listeners.len(), "Auth event emitted");
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}
