//! Single-slot in-flight computation shared by concurrent callers
//!
//! The first caller starts the computation; every caller arriving while it
//! runs awaits the same [`Shared`] future instead of starting another one.
//! The slot is cleared once the computation completes so a later call can
//! start a fresh one.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type Slot<T> = Shared<BoxFuture<'static, T>>;

/// Single-flight guard for one kind of computation
pub struct SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    slot: Mutex<Option<Slot<T>>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// Run `start` unless a computation is already in flight, in which case
    /// join it. `start` is only invoked when this caller leads.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = start().boxed().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let output = flight.clone().await;

        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }

        output
    }

    /// Whether a computation is currently in flight
    pub fn in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
