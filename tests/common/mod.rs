//! Shared helpers for the bridge integration tests.
#![allow(dead_code)]

use evbridge::{EventBridge, LabLoop, Readiness, WatchId};
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fresh bridge over a fresh lab loop.
pub fn lab_bridge() -> (Arc<LabLoop>, Arc<EventBridge>) {
    init_logging();
    let lab = Arc::new(LabLoop::new());
    let bridge = EventBridge::new(lab.clone());
    (lab, bridge)
}

/// Records every watch dispatch it sees.
#[derive(Default)]
pub struct DispatchLog {
    entries: parking_lot::Mutex<Vec<(WatchId, RawFd, Readiness)>>,
}

impl DispatchLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, id: WatchId, fd: RawFd, ready: Readiness) {
        self.entries.lock().push((id, fd, ready));
    }

    pub fn entries(&self) -> Vec<(WatchId, RawFd, Readiness)> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Counts invocations of a finalizer (or any hook). Cheap to clone; clones
/// share the counter.
#[derive(Default, Clone)]
pub struct Probe {
    count: Arc<AtomicUsize>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// A finalizer that bumps this probe.
    pub fn finalizer(&self) -> evbridge::Finalizer {
        let probe = self.clone();
        Box::new(move || probe.hit())
    }
}
