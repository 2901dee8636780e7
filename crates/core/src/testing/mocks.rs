//! In-memory implementations of [`CredentialStore`] and [`TokenRefresher`]

// Test mocks: errors are indicated by their return types
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dermalens_domain::{DermalensError, RefreshError, RefreshedTokens, Result, StorageKey};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::session::ports::{CredentialStore, TokenRefresher};

/// Credential store backed by a `HashMap`, with read counting and failure
/// injection
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<StorageKey, String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without counting it as a write
    pub fn insert(&self, key: StorageKey, value: &str) {
        self.values.lock().insert(key, value.to_string());
    }

    /// Inspect a value without counting it as a read
    #[must_use]
    pub fn value(&self, key: StorageKey) -> Option<String> {
        self.values.lock().get(&key).cloned()
    }

    /// Number of `get` calls so far
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `set` and `remove` calls so far
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every `get` fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every `set` and `remove` fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DermalensError::Storage("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: StorageKey) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DermalensError::Storage("injected read failure".to_string()));
        }
        Ok(self.value(key))
    }

    async fn set(&self, key: StorageKey, value: &str) -> Result<()> {
        self.check_writable()?;
        self.values.lock().insert(key, value.to_string());
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> Result<()> {
        self.check_writable()?;
        self.values.lock().remove(&key);
        Ok(())
    }
}

type Scripted = std::result::Result<RefreshedTokens, RefreshError>;

/// Refresher returning scripted results in order.
///
/// Counts calls and records the refresh tokens it was given. While
/// [`ScriptedRefresher::hold`] is in effect, calls block until
/// [`ScriptedRefresher::release`]. An exhausted script yields a network error.
#[derive(Debug)]
pub struct ScriptedRefresher {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
    latch: watch::Sender<bool>,
}

impl ScriptedRefresher {
    pub fn new() -> Self {
        let (latch, _) = watch::channel(false);
        Self {
            script: Mutex::default(),
            seen: Mutex::default(),
            calls: AtomicUsize::new(0),
            latch,
        }
    }

    pub fn push_ok(&self, tokens: RefreshedTokens) {
        self.script.lock().push_back(Ok(tokens));
    }

    pub fn push_err(&self, err: RefreshError) {
        self.script.lock().push_back(Err(err));
    }

    /// Number of refresh calls started
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh token passed to the most recent call
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.seen.lock().last().cloned()
    }

    /// Block subsequent and in-progress calls until [`Self::release`]
    pub fn hold(&self) {
        self.latch.send_replace(true);
    }

    pub fn release(&self) {
        self.latch.send_replace(false);
    }

    /// Wait until at least `n` calls have started
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("refresher was not called in time");
    }
}

impl Default for ScriptedRefresher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, refresh_token: &str) -> Scripted {
        self.seen.lock().push(refresh_token.to_string());
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut latch = self.latch.subscribe();
        // a dropped sender cannot happen while `self` is alive
        let _ = latch.wait_for(|held| !*held).await;

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshError::Network("no scripted response".to_string())))
    }
}
