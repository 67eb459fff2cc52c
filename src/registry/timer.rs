//! Timer registry: periodic callback registrations.
//!
//! Mirrors the watch registry with the interest mask replaced by an interval
//! in milliseconds. A negative interval means "registered but not firing":
//! the entry keeps its id and holds no host-loop subscription until a later
//! update gives it a non-negative interval.
//!
//! Unlike watches, an update with an unchanged non-negative interval is not
//! a no-op: the host mechanism cannot retime an existing periodic
//! subscription in place, so every non-negative update cancels and
//! re-creates the subscription — which restarts the period, a behavior
//! callers use to push a deadline back.

use crate::error::BridgeError;
use crate::host::{Dispatch, HostLoop, SubscriptionId};
use crate::registry::{Finalizer, TimerId};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Callback invoked on the loop thread each time a timer fires.
pub type TimerCallback = Arc<dyn Fn(TimerId) + Send + Sync>;

struct TimerEntry {
    interval_ms: i64,
    subscription: Option<SubscriptionId>,
    removed: bool,
    callback: TimerCallback,
    finalizer: Option<Finalizer>,
}

struct TimerState {
    next_id: u64,
    entries: HashMap<TimerId, TimerEntry>,
}

/// Table of timers, with the dispatch adapter that feeds their callbacks.
pub struct TimerRegistry {
    host: Arc<dyn HostLoop>,
    state: Mutex<TimerState>,
    weak: Weak<Self>,
}

impl TimerRegistry {
    pub(crate) fn new(host: Arc<dyn HostLoop>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            host,
            state: Mutex::new(TimerState {
                next_id: 1,
                entries: HashMap::new(),
            }),
            weak: weak.clone(),
        })
    }

    /// Registers a timer. A negative interval produces a valid entry with no
    /// host-loop subscription.
    pub fn add(
        &self,
        interval_ms: i64,
        callback: TimerCallback,
        finalizer: Option<Finalizer>,
    ) -> Result<TimerId, BridgeError> {
        let mut state = self.state.lock();
        let id = TimerId::new(state.next_id);
        state.next_id += 1;

        let subscription = if interval_ms < 0 {
            None
        } else {
            let sub = self
                .subscribe(id, interval_ms)
                .map_err(|source| BridgeError::TimerSubscribe { interval_ms, source })?;
            Some(sub)
        };

        state.entries.insert(
            id,
            TimerEntry {
                interval_ms,
                subscription,
                removed: false,
                callback,
                finalizer,
            },
        );
        debug!("add timer {id} interval={interval_ms}ms");
        Ok(id)
    }

    /// Changes a timer's interval. Unknown or tombstoned ids are a benign
    /// no-op. A non-negative interval always reschedules (cancel + recreate,
    /// restarting the period); a negative one cancels the subscription and
    /// keeps the entry.
    pub fn update(&self, id: TimerId, interval_ms: i64) -> Result<(), BridgeError> {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(&id).filter(|e| !e.removed) else {
            debug!("update of missing timer {id}");
            return Ok(());
        };

        if let Some(sub) = entry.subscription.take() {
            let _ = self.host.cancel(sub);
        }
        entry.interval_ms = interval_ms;
        if interval_ms >= 0 {
            let sub = self
                .subscribe(id, interval_ms)
                .map_err(|source| BridgeError::TimerSubscribe { interval_ms, source })?;
            entry.subscription = Some(sub);
        }
        debug!("update timer {id} interval={interval_ms}ms");
        Ok(())
    }

    /// Removes a timer. Returns `false` for unknown or already-removed ids.
    /// Same two-phase contract as watch removal: tombstone and cancel now,
    /// excise and finalize from the loop thread's deferred task.
    pub fn remove(&self, id: TimerId) -> bool {
        {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.get_mut(&id).filter(|e| !e.removed) else {
                debug!("remove of missing timer {id}");
                return false;
            };
            if let Some(sub) = entry.subscription.take() {
                let _ = self.host.cancel(sub);
            }
            entry.removed = true;
            debug!("remove timer {id}");
        }

        let registry = self.weak.clone();
        self.host.defer(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.destroy(id);
            }
        }));
        true
    }

    fn subscribe(&self, id: TimerId, interval_ms: i64) -> io::Result<SubscriptionId> {
        debug_assert!(interval_ms >= 0);
        let period = Duration::from_millis(interval_ms.unsigned_abs());
        let registry = self.weak.clone();
        self.host.add_periodic(
            period,
            Box::new(move || match registry.upgrade() {
                Some(registry) => registry.dispatch(id),
                None => Dispatch::Remove,
            }),
        )
    }

    /// Dispatch adapter: runs on the loop thread at each firing. Copies the
    /// callback out under the lock, releases it, then calls.
    fn dispatch(&self, id: TimerId) -> Dispatch {
        let target = {
            let state = self.state.lock();
            state
                .entries
                .get(&id)
                .filter(|e| !e.removed)
                .map(|e| e.callback.clone())
        };
        let Some(callback) = target else {
            debug!("dispatch for missing timer {id}");
            return Dispatch::Continue;
        };
        trace!("dispatch timer {id}");
        callback(id);
        Dispatch::Continue
    }

    /// Deferred-cleanup task body, loop thread only.
    fn destroy(&self, id: TimerId) {
        let entry = self.state.lock().entries.remove(&id);
        let Some(entry) = entry else { return };
        trace!("destroy timer {id}");
        if let Some(finalizer) = entry.finalizer {
            finalizer();
        }
    }
}
