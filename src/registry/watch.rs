//! Watch registry: fd readiness registrations.
//!
//! Tracks every fd watch the external library has registered, keyed by
//! [`WatchId`]. The table is guarded by one mutex; registration calls are
//! safe from any thread, including from inside a callback executing on the
//! loop thread, because dispatch never holds the lock across a user
//! callback.
//!
//! # Entry lifecycle
//!
//! ```text
//! add ──► Active (subscribed) ◄──update──► Active (unsubscribed)
//!                 │
//!              remove  (tombstone + cancel, from any thread)
//!                 ▼
//!        Removed-Pending-Cleanup ──deferred task──► Destroyed
//!                                   (loop thread: excise, then finalizer)
//! ```
//!
//! Only forward transitions out of `Removed-Pending-Cleanup` exist; any call
//! against a tombstoned or destroyed id is a not-found no-op. Destruction is
//! deferred because the host loop's cancel may be asynchronous — a dispatch
//! it already selected must be able to finish against still-valid storage.

use crate::error::BridgeError;
use crate::events::{Interest, Readiness};
use crate::host::{Dispatch, HostLoop, SubscriptionId};
use crate::registry::{Finalizer, WatchId};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::{Arc, Weak};

/// Callback invoked on the loop thread when a watched fd reports readiness.
pub type WatchCallback = Arc<dyn Fn(WatchId, RawFd, Readiness) + Send + Sync>;

struct WatchEntry {
    fd: RawFd,
    interest: Interest,
    subscription: Option<SubscriptionId>,
    removed: bool,
    callback: WatchCallback,
    finalizer: Option<Finalizer>,
}

struct WatchState {
    next_id: u64,
    entries: HashMap<WatchId, WatchEntry>,
}

/// Table of fd watches, with the dispatch adapter that feeds their callbacks.
pub struct WatchRegistry {
    host: Arc<dyn HostLoop>,
    state: Mutex<WatchState>,
    /// Handed to host-loop handlers and deferred tasks; a failed upgrade
    /// means the registry is gone and the subscription should die with it.
    weak: Weak<Self>,
}

impl WatchRegistry {
    pub(crate) fn new(host: Arc<dyn HostLoop>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            host,
            state: Mutex::new(WatchState {
                next_id: 1,
                entries: HashMap::new(),
            }),
            weak: weak.clone(),
        })
    }

    /// Registers a watch on `fd`. An empty interest set produces a valid
    /// entry with no host-loop subscription.
    pub fn add(
        &self,
        fd: RawFd,
        interest: Interest,
        callback: WatchCallback,
        finalizer: Option<Finalizer>,
    ) -> Result<WatchId, BridgeError> {
        let mut state = self.state.lock();
        let id = WatchId::new(state.next_id);
        state.next_id += 1;

        let subscription = if interest.is_empty() {
            None
        } else {
            let sub = self
                .subscribe(id, fd, interest)
                .map_err(|source| BridgeError::WatchSubscribe { fd, source })?;
            Some(sub)
        };

        state.entries.insert(
            id,
            WatchEntry {
                fd,
                interest,
                subscription,
                removed: false,
                callback,
                finalizer,
            },
        );
        debug!("add watch {id} fd={fd} interest={interest:?}");
        Ok(id)
    }

    /// Changes the interest set of a watch. Unknown or tombstoned ids are a
    /// benign no-op (the expected concurrent-removal race). An unchanged
    /// interest set is a no-op to avoid subscription churn; otherwise the
    /// old subscription (if any) is cancelled and a new one created, with an
    /// empty set meaning no new subscription.
    pub fn update(&self, id: WatchId, interest: Interest) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(&id).filter(|e| !e.removed) else {
            debug!("update for missing watch {id}");
            return Ok(());
        };

        if entry.interest == interest {
            return Ok(());
        }

        if let Some(sub) = entry.subscription.take() {
            let _ = self.host.cancel(sub);
        }
        entry.interest = interest;
        if !interest.is_empty() {
            let fd = entry.fd;
            let sub = self
                .subscribe(id, fd, interest)
                .map_err(|source| BridgeError::WatchSubscribe { fd, source })?;
            entry.subscription = Some(sub);
        }
        debug!("update watch {id} interest={interest:?}");
        Ok(())
    }

    /// Removes a watch. Returns `false` for unknown or already-removed ids.
    ///
    /// On success the entry is tombstoned and its subscription cancelled
    /// before this returns — no new dispatch for the id will begin — and a
    /// deferred task on the loop thread later excises the entry and runs its
    /// finalizer. A dispatch the loop had already selected may still
    /// complete in between.
    pub fn remove(&self, id: WatchId) -> bool {
        {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.get_mut(&id).filter(|e| !e.removed) else {
                debug!("remove of missing watch {id}");
                return false;
            };
            if let Some(sub) = entry.subscription.take() {
                let _ = self.host.cancel(sub);
            }
            entry.interest = Interest::NONE;
            entry.removed = true;
            debug!("remove watch {id} fd={}", entry.fd);
        }

        let registry = self.weak.clone();
        self.host.defer(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.destroy(id);
            }
        }));
        true
    }

    fn subscribe(
        &self,
        id: WatchId,
        fd: RawFd,
        interest: Interest,
    ) -> io::Result<SubscriptionId> {
        let registry = self.weak.clone();
        self.host.watch_fd(
            fd,
            interest,
            Box::new(move |ready| match registry.upgrade() {
                Some(registry) => registry.dispatch(id, ready),
                None => Dispatch::Remove,
            }),
        )
    }

    /// Dispatch adapter: runs on the loop thread when the host reports
    /// readiness. Copies the callback out under the lock, releases it, then
    /// calls — the callback is free to re-enter the registration API,
    /// including removing this same watch.
    fn dispatch(&self, id: WatchId, ready: Readiness) -> Dispatch {
        let target = {
            let state = self.state.lock();
            state
                .entries
                .get(&id)
                .filter(|e| !e.removed)
                .map(|e| (e.callback.clone(), e.fd))
        };
        let Some((callback, fd)) = target else {
            debug!("dispatch for missing watch {id}");
            return Dispatch::Continue;
        };
        trace!("dispatch watch {id} fd={fd} ready={ready:?}");
        callback(id, fd, ready);
        Dispatch::Continue
    }

    /// Deferred-cleanup task body, loop thread only: excise the entry, then
    /// run its finalizer outside the lock.
    fn destroy(&self, id: WatchId) {
        let entry = self.state.lock().entries.remove(&id);
        let Some(entry) = entry else { return };
        trace!("destroy watch {id}");
        if let Some(finalizer) = entry.finalizer {
            finalizer();
        }
    }
}
