//! Refresh queue
//!
//! Serializes refresh attempts: the first caller while `Idle` becomes the
//! leader and moves the queue to `Refreshing`; callers arriving while a
//! refresh is underway are enqueued as one-shot continuations. When the
//! leader settles, the whole queue is drained exactly once with the same
//! outcome and the state returns to `Idle`.
//!
//! Continuations are `oneshot` senders consumed on delivery, so none can be
//! settled twice. A leader dropped before settling (panic, cancelled task)
//! drains the queue with [`RefreshFailure::Cancelled`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dermalens_domain::RefreshError;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why a refresh cycle produced no access token.
///
/// Cloneable so one failure can be delivered to every queued waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// Nothing to refresh with
    #[error("no refresh token stored")]
    NoRefreshToken,

    /// The server confirmed the refresh token is invalid (401/403)
    #[error("refresh token rejected with status {status}")]
    Rejected { status: u16 },

    #[error("transient refresh failure: {0}")]
    Transient(String),

    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    /// Success status without a usable access token
    #[error("refresh response carried no access token")]
    MissingAccessToken,

    /// The leading refresh was abandoned before it settled
    #[error("refresh abandoned before completion")]
    Cancelled,
}

impl RefreshFailure {
    /// Whether this failure ends the session
    #[must_use]
    pub fn is_confirmed_invalid(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl From<RefreshError> for RefreshFailure {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Rejected { status } => Self::Rejected { status },
            RefreshError::Timeout(after) => Self::Timeout(after),
            RefreshError::Malformed(_) => Self::MissingAccessToken,
            RefreshError::Status { .. } | RefreshError::Network(_) => {
                Self::Transient(err.to_string())
            }
        }
    }
}

/// Result delivered to every participant of a refresh cycle
pub type RefreshOutcome = Result<String, RefreshFailure>;

enum QueueState {
    Idle,
    Refreshing { waiters: Vec<oneshot::Sender<RefreshOutcome>> },
}

#[derive(Default)]
struct QueueStats {
    cycles: AtomicU64,
    drained: AtomicU64,
}

/// The refresh queue; cheap to clone, all clones share one state
#[derive(Clone)]
pub struct RefreshQueue {
    state: Arc<Mutex<QueueState>>,
    stats: Arc<QueueStats>,
}

/// What a caller must do after [`RefreshQueue::join`]
pub enum Ticket {
    /// Perform the refresh and settle the lease
    Lead(RefreshLease),
    /// A refresh is underway; await its outcome
    Follow(RefreshWaiter),
}

impl RefreshQueue {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(QueueState::Idle)), stats: Arc::default() }
    }

    /// Become the leader (`Idle -> Refreshing`) or enqueue behind the current
    /// one.
    pub fn join(&self) -> Ticket {
        let mut state = self.state.lock();
        match &mut *state {
            QueueState::Idle => {
                *state = QueueState::Refreshing { waiters: Vec::new() };
                self.stats.cycles.fetch_add(1, Ordering::Relaxed);
                debug!("Refresh queue: starting refresh cycle");
                Ticket::Lead(RefreshLease { queue: self.clone(), settled: false })
            }
            QueueState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                debug!(queued = waiters.len(), "Refresh queue: waiting on in-flight refresh");
                Ticket::Follow(RefreshWaiter { rx })
            }
        }
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), QueueState::Refreshing { .. })
    }

    /// Number of continuations waiting on the current cycle
    pub fn pending(&self) -> usize {
        match &*self.state.lock() {
            QueueState::Idle => 0,
            QueueState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Refresh cycles started so far
    pub fn cycles(&self) -> u64 {
        self.stats.cycles.load(Ordering::Relaxed)
    }

    /// Drains performed so far; equals [`Self::cycles`] whenever idle
    pub fn drains(&self) -> u64 {
        self.stats.drained.load(Ordering::Relaxed)
    }

    fn drain(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, QueueState::Idle) {
                QueueState::Idle => {
                    warn!("Refresh queue drained while idle");
                    return 0;
                }
                QueueState::Refreshing { waiters } => waiters,
            }
        };
        self.stats.drained.fetch_add(1, Ordering::Relaxed);

        let count = waiters.len();
        for waiter in waiters {
            // a waiter whose caller went away is simply skipped
            let _ = waiter.send(outcome.clone());
        }
        debug!(waiters = count, success = outcome.is_ok(), "Refresh queue drained");
        count
    }
}

impl Default for RefreshQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive right to perform the current refresh cycle
pub struct RefreshLease {
    queue: RefreshQueue,
    settled: bool,
}

impl RefreshLease {
    /// Deliver `outcome` to every queued waiter and return to `Idle`.
    /// Returns the number of waiters settled.
    pub fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.queue.drain(outcome)
    }
}

impl Drop for RefreshLease {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh leader dropped without settling; releasing queue");
            self.queue.drain(&Err(RefreshFailure::Cancelled));
        }
    }
}

/// A queued continuation awaiting the in-flight refresh
pub struct RefreshWaiter {
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl RefreshWaiter {
    pub async fn wait(self) -> RefreshOutcome {
        self.rx.await.unwrap_or(Err(RefreshFailure::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    fn lead(queue: &RefreshQueue) -> RefreshLease {
        match queue.join() {
            Ticket::Lead(lease) => lease,
            Ticket::Follow(_) => panic!("expected to lead"),
        }
    }

    fn follow(queue: &RefreshQueue) -> RefreshWaiter {
        match queue.join() {
            Ticket::Follow(waiter) => waiter,
            Ticket::Lead(_) => panic!("expected to follow"),
        }
    }

    #[tokio::test]
    async fn followers_receive_leader_outcome() {
        let queue = RefreshQueue::new();
        let lease = lead(&queue);
        let first = follow(&queue);
        let second = follow(&queue);
        assert_eq!(queue.pending(), 2);

        assert_eq!(lease.settle(&Ok("a2".to_string())), 2);
        assert_eq!(first.wait().await, Ok("a2".to_string()));
        assert_eq!(second.wait().await, Ok("a2".to_string()));
        assert!(!queue.is_refreshing());
        assert_eq!(queue.cycles(), 1);
        assert_eq!(queue.drains(), 1);
    }

    #[tokio::test]
    async fn failure_is_delivered_to_all() {
        let queue = RefreshQueue::new();
        let lease = lead(&queue);
        let waiter = follow(&queue);

        lease.settle(&Err(RefreshFailure::Rejected { status: 401 }));
        assert_eq!(waiter.wait().await, Err(RefreshFailure::Rejected { status: 401 }));
    }

    #[test]
    fn waiter_stays_pending_until_settled() {
        let queue = RefreshQueue::new();
        let lease = lead(&queue);
        let mut waiter = tokio_test::task::spawn(follow(&queue).wait());

        assert_pending!(waiter.poll());
        lease.settle(&Ok("a2".to_string()));
        assert!(waiter.is_woken());
        assert_eq!(assert_ready!(waiter.poll()), Ok("a2".to_string()));
    }

    #[tokio::test]
    async fn dropped_leader_releases_queue() {
        let queue = RefreshQueue::new();
        let lease = lead(&queue);
        let waiter = follow(&queue);

        drop(lease);
        assert_eq!(waiter.wait().await, Err(RefreshFailure::Cancelled));
        assert!(!queue.is_refreshing());
        assert_eq!(queue.drains(), 1);
    }

    #[tokio::test]
    async fn next_cycle_starts_after_settle() {
        let queue = RefreshQueue::new();
        lead(&queue).settle(&Ok("a2".to_string()));
        let lease = lead(&queue);
        assert_eq!(queue.cycles(), 2);
        assert_eq!(lease.settle(&Ok("a3".to_string())), 0);
        assert_eq!(queue.drains(), 2);
    }

    #[test]
    fn refresh_error_mapping() {
        assert_eq!(
            RefreshFailure::from(RefreshError::Rejected { status: 403 }),
            RefreshFailure::Rejected { status: 403 }
        );
        assert!(matches!(
            RefreshFailure::from(RefreshError::Status { status: 502, message: String::new() }),
            RefreshFailure::Transient(_)
        ));
        assert_eq!(
            RefreshFailure::from(RefreshError::Malformed("empty".into())),
            RefreshFailure::MissingAccessToken
        );
        assert!(!RefreshFailure::Timeout(Duration::from_secs(1)).is_confirmed_invalid());
        assert!(RefreshFailure::Rejected { status: 401 }.is_confirmed_invalid());
    }
}
