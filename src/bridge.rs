//! Bridge coordinator and process-wide installation.
//!
//! [`EventBridge`] owns the watch and timer registries over one host loop
//! and exposes the six-operation registration API the external library
//! consumes. Tests construct bridges directly with [`EventBridge::new`];
//! production code goes through [`install`], which creates the process-wide
//! bridge exactly once and hands it to the external library's registration
//! hook.

use crate::error::BridgeError;
use crate::events::{Interest, Readiness};
use crate::host::HostLoop;
use crate::registry::{Finalizer, TimerId, TimerRegistry, WatchId, WatchRegistry};
use log::debug;
use parking_lot::Mutex;
use std::os::fd::RawFd;
use std::sync::Arc;

/// The registration API over one host loop.
pub struct EventBridge {
    watches: Arc<WatchRegistry>,
    timers: Arc<TimerRegistry>,
}

impl EventBridge {
    /// Creates a bridge over `host`. The bridge holds the host loop for the
    /// lifetime of its registries.
    #[must_use]
    pub fn new(host: Arc<dyn HostLoop>) -> Arc<Self> {
        Arc::new(Self {
            watches: WatchRegistry::new(host.clone()),
            timers: TimerRegistry::new(host),
        })
    }

    /// Registers a watch on `fd`. The callback runs on the loop thread each
    /// time the fd reports readiness; the finalizer, if any, runs exactly
    /// once after the watch is removed and excised.
    pub fn add_watch<F>(
        &self,
        fd: RawFd,
        interest: Interest,
        callback: F,
        finalizer: Option<Finalizer>,
    ) -> Result<WatchId, BridgeError>
    where
        F: Fn(WatchId, RawFd, Readiness) + Send + Sync + 'static,
    {
        self.watches.add(fd, interest, Arc::new(callback), finalizer)
    }

    /// Changes a watch's interest set. Unknown ids are a benign no-op.
    pub fn update_watch(&self, id: WatchId, interest: Interest) -> Result<(), BridgeError> {
        self.watches.update(id, interest)
    }

    /// Removes a watch. Returns `false` for unknown or already-removed ids.
    pub fn remove_watch(&self, id: WatchId) -> bool {
        self.watches.remove(id)
    }

    /// Registers a timer firing every `interval_ms` milliseconds; a negative
    /// interval registers it disabled.
    pub fn add_timer<F>(
        &self,
        interval_ms: i64,
        callback: F,
        finalizer: Option<Finalizer>,
    ) -> Result<TimerId, BridgeError>
    where
        F: Fn(TimerId) + Send + Sync + 'static,
    {
        self.timers.add(interval_ms, Arc::new(callback), finalizer)
    }

    /// Changes a timer's interval. Unknown ids are a benign no-op.
    pub fn update_timer(&self, id: TimerId, interval_ms: i64) -> Result<(), BridgeError> {
        self.timers.update(id, interval_ms)
    }

    /// Removes a timer. Returns `false` for unknown or already-removed ids.
    pub fn remove_timer(&self, id: TimerId) -> bool {
        self.timers.remove(id)
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge").finish_non_exhaustive()
    }
}

/// Process-wide bridge slot. The guarded `Option` is the run-once primitive:
/// the first installer creates the bridge and runs the registration hook
/// while holding the lock, so concurrent installers block until installation
/// is complete and then observe the same bridge.
static GLOBAL: Mutex<Option<Arc<EventBridge>>> = Mutex::new(None);

/// Installs the process-wide bridge over `host`.
///
/// The first call creates the bridge and invokes `register` with it —
/// `register` is the hook that hands the six registration operations to the
/// external library, and it runs exactly once per install generation, no
/// matter how many threads race here. Later calls return the existing bridge
/// without touching `register` or `host`.
///
/// `register` runs under the installation lock and must not call back into
/// [`install`], [`installed`] or [`teardown`].
pub fn install<F>(host: Arc<dyn HostLoop>, register: F) -> Arc<EventBridge>
where
    F: FnOnce(&Arc<EventBridge>),
{
    let mut slot = GLOBAL.lock();
    if let Some(bridge) = slot.as_ref() {
        return bridge.clone();
    }
    debug!("installing process-wide event bridge");
    let bridge = EventBridge::new(host);
    *slot = Some(bridge.clone());
    register(&bridge);
    bridge
}

/// Returns the process-wide bridge, if one is installed.
#[must_use]
pub fn installed() -> Option<Arc<EventBridge>> {
    GLOBAL.lock().clone()
}

/// Clears the process-wide bridge so a later [`install`] starts fresh.
///
/// Production installs are process-lifetime; this hook exists so tests can
/// reinstall against a fresh host loop. Registrations made through the old
/// bridge stay alive for as long as something still holds it.
pub fn teardown() {
    let previous = GLOBAL.lock().take();
    if previous.is_some() {
        debug!("tore down process-wide event bridge");
    }
}
