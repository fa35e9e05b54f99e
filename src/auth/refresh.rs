//! Single-flight coordination of token refreshes.
//!
//! At most one refresh is in flight. Callers that observe an expired session
//! while a refresh is running attach to the same shared future, so all of
//! them see the same outcome. The refresh runs on its own task, so it
//! completes even if every waiter gives up. The slot is emptied by that task
//! right before its result is published, which returns the coordinator to
//! idle before any waiter resumes.

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::http::HttpError;

pub type RefreshOutcome = Result<String, HttpError>;
pub type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Default)]
struct Slot {
    in_flight: Option<(u64, SharedRefresh)>,
    next_id: u64,
}

#[derive(Default)]
pub struct RefreshCoordinator {
    slot: Mutex<Slot>,
}

/// Exclusive view of the coordinator. Checking for an in-flight refresh and
/// installing a new one happen under the same guard.
pub struct RefreshSlot<'a> {
    owner: &'a Arc<RefreshCoordinator>,
    guard: MutexGuard<'a, Slot>,
}

impl RefreshCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lock(self: &Arc<Self>) -> RefreshSlot<'_> {
        RefreshSlot {
            owner: self,
            guard: self.slot.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .is_some()
    }

    fn finish(&self, id: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(&slot.in_flight, Some((current, _)) if *current == id) {
            slot.in_flight = None;
            debug!("Refresh #{} settled", id);
        }
    }
}

impl RefreshSlot<'_> {
    /// The refresh currently in flight, if any.
    pub fn current(&self) -> Option<SharedRefresh> {
        self.guard
            .in_flight
            .as_ref()
            .map(|(_, refresh)| refresh.clone())
    }

    /// Spawns `refresh` as the in-flight operation and returns a handle to it.
    ///
    /// Callers must check [`current`](Self::current) first; an existing
    /// operation is returned instead of being replaced. Must be called from
    /// within a tokio runtime.
    pub fn start(mut self, refresh: BoxFuture<'static, RefreshOutcome>) -> SharedRefresh {
        if let Some(existing) = self.current() {
            return existing;
        }

        let id = self.guard.next_id;
        self.guard.next_id += 1;

        let owner: Weak<RefreshCoordinator> = Arc::downgrade(self.owner);
        let task = {
            let owner = owner.clone();
            tokio::spawn(async move {
                let outcome = refresh.await;
                if let Some(owner) = owner.upgrade() {
                    owner.finish(id);
                }
                outcome
            })
        };
        let shared = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Panicked or aborted before it could clear the slot.
                    if let Some(owner) = owner.upgrade() {
                        owner.finish(id);
                    }
                    Err(HttpError::ReauthenticationFailed(format!(
                        "refresh task failed: {}",
                        e
                    )))
                }
            }
        }
        .boxed()
        .shared();

        debug!("Starting refresh #{}", id);
        self.guard.in_flight = Some((id, shared.clone()));
        shared
    }
}
