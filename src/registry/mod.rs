//! Watch and timer registries.
//!
//! Each registry owns a table of entries keyed by an id it allocates from a
//! monotonically increasing counter. Ids are never reused, even after an
//! entry is destroyed, so a stale id held by the external library can only
//! ever miss — it can never alias a newer registration.
//!
//! Removal is two-phase: `remove` tombstones the entry (invisible to lookup
//! immediately) and cancels its subscription, and a deferred task on the
//! loop thread later excises the entry and runs its finalizer. See the
//! module docs of [`watch`] and [`timer`] for the per-kind lifecycles.

pub mod timer;
pub mod watch;

pub use timer::TimerRegistry;
pub use watch::WatchRegistry;

use core::fmt;

/// Cleanup hook owned by an entry, run exactly once after the entry has been
/// excised from its registry.
pub type Finalizer = Box<dyn FnOnce() + Send>;

/// Identifier of a watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl WatchId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Reconstructs an id from its raw value, as received over the external
    /// contract (which traffics in plain integers). A value that was never
    /// issued simply never matches.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value. Ids start at 1 and increase strictly.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a timer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Reconstructs an id from its raw value, as received over the external
    /// contract. A value that was never issued simply never matches.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id value. Ids start at 1 and increase strictly.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
