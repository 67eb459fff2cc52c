//! The host-loop contract consumed by the bridge.
//!
//! The bridge does not poll anything itself. It relies on the surrounding
//! application's event loop for four primitives: subscribe an fd for
//! readiness, subscribe a periodic timer, cancel a subscription, and run a
//! task once, soon, on the loop thread. [`HostLoop`] captures exactly that
//! surface; everything else the loop does (polling mechanism, wakeup
//! strategy, priorities) stays the loop's business.
//!
//! # Contract
//!
//! Implementations must uphold the following, which the bridge's lifecycle
//! logic depends on:
//!
//! - Handlers and deferred tasks run on the loop thread only, in the order
//!   the loop observes readiness, expiry, and queued tasks.
//! - [`watch_fd`](HostLoop::watch_fd), [`add_periodic`](HostLoop::add_periodic)
//!   and [`cancel`](HostLoop::cancel) are non-blocking, callable from any
//!   thread, and never invoke a handler synchronously.
//! - `cancel` prevents dispatches the loop has not yet selected. A dispatch
//!   already queued may still run; the bridge tolerates this by deferring
//!   entry destruction to the loop thread.
//! - Readiness delivered to an fd handler may include hangup and error flags
//!   regardless of the subscribed interest.
//! - [`defer`](HostLoop::defer) runs its task once, at lower priority than
//!   readiness dispatch.

pub mod lab;

pub use lab::LabLoop;

use crate::events::{Interest, Readiness};
use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// The host loop's handle for an active subscription.
///
/// Opaque to the bridge; distinct from the bridge's own watch/timer ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription id from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// What a handler tells the loop about its recurring subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Dispatch {
    /// Keep the subscription armed.
    Continue,
    /// Drop the subscription; the handler will not be invoked again.
    Remove,
}

/// Handler invoked on the loop thread when a watched fd reports readiness.
pub type FdHandler = Box<dyn Fn(Readiness) -> Dispatch + Send + Sync>;

/// Handler invoked on the loop thread when a periodic timer fires.
pub type TimerHandler = Box<dyn Fn() -> Dispatch + Send + Sync>;

/// Task run once on the loop thread via [`HostLoop::defer`].
pub type DeferredTask = Box<dyn FnOnce() + Send>;

/// Event-loop primitives the bridge consumes.
pub trait HostLoop: Send + Sync {
    /// Subscribes `fd` for the conditions in `interest`. The handler is
    /// invoked on the loop thread with the observed readiness each time the
    /// fd reports; the subscription stays armed while the handler returns
    /// [`Dispatch::Continue`].
    fn watch_fd(&self, fd: RawFd, interest: Interest, handler: FdHandler)
        -> io::Result<SubscriptionId>;

    /// Subscribes a periodic timer firing every `period`. The first fire is
    /// one full period after subscription.
    fn add_periodic(&self, period: Duration, handler: TimerHandler)
        -> io::Result<SubscriptionId>;

    /// Cancels a subscription. No dispatch not yet selected by the loop will
    /// happen afterwards; an already-queued one may still run.
    ///
    /// Errors are advisory — the subscription may already be gone.
    fn cancel(&self, subscription: SubscriptionId) -> io::Result<()>;

    /// Queues `task` to run once, soon, on the loop thread, after any
    /// already-queued dispatches.
    fn defer(&self, task: DeferredTask);
}
