//! Integration tests for the session lifecycle
//!
//! Drives [`SessionController`] through the in-memory store and scripted
//! refresher to check the concurrency and credential-retention guarantees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dermalens_core::testing::{MemoryCredentialStore, ScriptedRefresher};
use dermalens_core::{GateState, PreRefreshState, RefreshFailure, SessionConfig, SessionController};
use dermalens_domain::{RefreshError, RefreshedTokens, StorageKey};

struct Harness {
    store: Arc<MemoryCredentialStore>,
    refresher: Arc<ScriptedRefresher>,
    controller: Arc<SessionController>,
    terminations: Arc<AtomicUsize>,
}

fn harness_with(config: SessionConfig) -> Harness {
    let store = Arc::new(MemoryCredentialStore::new());
    let refresher = Arc::new(ScriptedRefresher::new());
    let controller = Arc::new(SessionController::new(store.clone(), refresher.clone(), config));

    let terminations = Arc::new(AtomicUsize::new(0));
    let counter = terminations.clone();
    controller.events().register(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    Harness { store, refresher, controller, terminations }
}

fn harness() -> Harness {
    harness_with(SessionConfig::default())
}

impl Harness {
    fn logged_in(self) -> Self {
        self.store.insert(StorageKey::AccessToken, "a1");
        self.store.insert(StorageKey::RefreshToken, "r1");
        self.store.insert(StorageKey::User, r#"{"name":"Mina"}"#);
        self
    }

    /// Spawn `n` concurrent 401 recoveries for the stale token `a1`
    fn spawn_recoveries(
        &self,
        n: usize,
    ) -> Vec<tokio::task::JoinHandle<Result<String, RefreshFailure>>> {
        (0..n)
            .map(|_| {
                let controller = self.controller.clone();
                tokio::spawn(async move { controller.recover_from_unauthorized(Some("a1")).await })
            })
            .collect()
    }

    fn assert_credentials_erased(&self) {
        for key in StorageKey::CREDENTIALS {
            assert_eq!(self.store.value(key), None, "{key} should be erased");
        }
    }
}

async fn let_tasks_queue() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Wait until `n` callers are queued behind the in-flight refresh
async fn wait_for_waiters(controller: &SessionController, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.refresh_waiters() < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("callers did not queue in time");
}

/// Concurrent 401s with no refresh in flight trigger exactly one refresh and
/// every caller observes the same new token.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_share_one_refresh() {
    let h = harness().logged_in();
    h.refresher.hold();
    h.refresher.push_ok(RefreshedTokens::new("a2"));

    let handles = h.spawn_recoveries(8);
    h.refresher.wait_for_calls(1).await;
    wait_for_waiters(&h.controller, 7).await;
    h.refresher.release();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok("a2".to_string()));
    }
    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(h.store.value(StorageKey::AccessToken).as_deref(), Some("a2"));
    assert_eq!(h.store.value(StorageKey::RefreshToken).as_deref(), Some("r1"));
}

/// Once resolved, the gate answers without touching storage.
#[tokio::test]
async fn resolved_gate_is_read_free() {
    let h = harness().logged_in();

    assert_eq!(h.controller.ensure_gate_open().await, GateState::Resolved);
    let reads = h.store.reads();

    for _ in 0..25 {
        assert_eq!(h.controller.ensure_gate_open().await, GateState::Resolved);
    }
    assert_eq!(h.store.reads(), reads);
}

/// Each refresh cycle drains the queue exactly once, whatever its outcome.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_cycle_drains_once() {
    let h = harness().logged_in();

    h.refresher.push_err(RefreshError::Network("offline".into()));
    h.refresher.push_ok(RefreshedTokens::new("a2").with_rotated_refresh("r2"));
    h.refresher.push_err(RefreshError::Status { status: 503, message: "busy".into() });

    for _ in 0..3 {
        h.refresher.hold();
        let before = h.refresher.calls();
        let stale = h.store.value(StorageKey::AccessToken);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let controller = h.controller.clone();
                let stale = stale.clone();
                tokio::spawn(async move {
                    controller.recover_from_unauthorized(stale.as_deref()).await
                })
            })
            .collect();
        h.refresher.wait_for_calls(before + 1).await;
        wait_for_waiters(&h.controller, 3).await;
        h.refresher.release();

        let outcomes = futures_outcomes(handles).await;
        assert!(outcomes.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(!h.controller.refresh_in_flight());
        assert_eq!(h.controller.refresh_cycles(), h.controller.refresh_drains());
    }

    assert_eq!(h.refresher.calls(), 3);
    assert_eq!(h.controller.refresh_cycles(), 3);
    assert_eq!(h.terminations.load(Ordering::SeqCst), 0);
}

async fn futures_outcomes(
    handles: Vec<tokio::task::JoinHandle<Result<String, RefreshFailure>>>,
) -> Vec<Result<String, RefreshFailure>> {
    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    outcomes
}

/// A confirmed-invalid refresh token erases every credential key and fires
/// the auth-changed notification exactly once, however many callers waited.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_refresh_clears_session_once() {
    let h = harness().logged_in();
    let mut rx = h.controller.events().subscribe();
    h.refresher.hold();
    h.refresher.push_err(RefreshError::Rejected { status: 401 });

    let handles = h.spawn_recoveries(5);
    h.refresher.wait_for_calls(1).await;
    wait_for_waiters(&h.controller, 4).await;
    h.refresher.release();

    for outcome in futures_outcomes(handles).await {
        assert_eq!(outcome, Err(RefreshFailure::Rejected { status: 401 }));
    }
    h.assert_credentials_erased();
    assert_eq!(h.terminations.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
    assert_eq!(h.refresher.calls(), 1);
}

/// A rejected refresh still wipes the session when the store stops
/// answering reads before termination runs.
#[tokio::test]
async fn rejected_refresh_wipes_unreadable_store() {
    let h = harness().logged_in();
    let mut rx = h.controller.events().subscribe();
    h.refresher.hold();
    h.refresher.push_err(RefreshError::Rejected { status: 401 });

    let handles = h.spawn_recoveries(1);
    h.refresher.wait_for_calls(1).await;
    h.store.fail_reads(true);
    h.refresher.release();

    for outcome in futures_outcomes(handles).await {
        assert_eq!(outcome, Err(RefreshFailure::Rejected { status: 401 }));
    }
    h.assert_credentials_erased();
    assert_eq!(h.terminations.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_ok());
}

/// Timeouts and server errors leave the credential alone and stay silent.
#[tokio::test]
async fn transient_failures_preserve_credentials() {
    let h = harness_with(SessionConfig { refresh_timeout: Duration::from_millis(30) }).logged_in();

    h.refresher.hold();
    h.refresher.push_err(RefreshError::Status { status: 500, message: "boom".into() });
    assert_eq!(
        h.controller.recover_from_unauthorized(Some("a1")).await,
        Err(RefreshFailure::Timeout(Duration::from_millis(30)))
    );

    h.refresher.release();
    let outcome = h.controller.recover_from_unauthorized(Some("a1")).await;
    assert!(matches!(outcome, Err(RefreshFailure::Transient(_))));

    assert_eq!(h.store.value(StorageKey::RefreshToken).as_deref(), Some("r1"));
    assert_eq!(h.store.value(StorageKey::AccessToken).as_deref(), Some("a1"));
    assert_eq!(h.terminations.load(Ordering::SeqCst), 0);
}

/// With only a refresh token stored, back-to-back protected calls trigger a
/// single pre-refresh.
#[tokio::test]
async fn pre_refresh_runs_once_per_start() {
    let h = harness();
    h.store.insert(StorageKey::RefreshToken, "r1");
    h.refresher.push_ok(RefreshedTokens::new("a1"));

    assert_eq!(h.controller.authorize().await.as_deref(), Some("a1"));
    assert_eq!(h.controller.authorize().await.as_deref(), Some("a1"));

    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(h.controller.pre_refresh_state(), PreRefreshState::Done);
    assert_eq!(h.controller.gate_state(), GateState::Resolved);
}

/// Concurrent first requests on a cold start share the pre-refresh.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_start_shares_pre_refresh() {
    let h = harness();
    h.store.insert(StorageKey::RefreshToken, "r1");
    h.refresher.hold();
    h.refresher.push_ok(RefreshedTokens::new("a1"));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.authorize().await })
        })
        .collect();
    h.refresher.wait_for_calls(1).await;
    let_tasks_queue().await;
    h.refresher.release();

    for handle in handles {
        assert_eq!(handle.await.unwrap().as_deref(), Some("a1"));
    }
    assert_eq!(h.refresher.calls(), 1);
}

/// A dead refresh token found during pre-refresh ends the session and the
/// request goes out without a credential.
#[tokio::test]
async fn pre_refresh_rejection_terminates() {
    let h = harness();
    h.store.insert(StorageKey::RefreshToken, "r1");
    h.store.insert(StorageKey::User, "{}");
    h.refresher.push_err(RefreshError::Rejected { status: 403 });

    assert_eq!(h.controller.authorize().await, None);
    h.assert_credentials_erased();
    assert_eq!(h.terminations.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.gate_state(), GateState::Resolved);
}

/// Foreground refresh and 401 recovery use the same single flight.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn foreground_joins_inflight_recovery() {
    let h = harness().logged_in();
    h.refresher.hold();
    h.refresher.push_ok(RefreshedTokens::new("a2"));

    let recoveries = h.spawn_recoveries(2);
    h.refresher.wait_for_calls(1).await;
    let controller = h.controller.clone();
    let foreground = tokio::spawn(async move { controller.on_foreground().await });
    wait_for_waiters(&h.controller, 2).await;
    h.refresher.release();

    assert!(foreground.await.unwrap());
    for outcome in futures_outcomes(recoveries).await {
        assert_eq!(outcome, Ok("a2".to_string()));
    }
    assert_eq!(h.refresher.calls(), 1);
}

/// Logout clears the session without an auth-changed notification and
/// restarts the gate.
#[tokio::test]
async fn logout_is_silent() {
    let h = harness().logged_in();
    h.controller.ensure_gate_open().await;

    h.controller.logout().await;

    h.assert_credentials_erased();
    assert_eq!(h.terminations.load(Ordering::SeqCst), 0);
    assert_eq!(h.controller.gate_state(), GateState::Unresolved);
    assert!(!h.controller.terminate_session().await);
}
