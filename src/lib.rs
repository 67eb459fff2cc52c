//! Event-loop bridge for callback-driven I/O libraries.
//!
//! Some libraries do not run their own event loop: they hand the embedding
//! application a registration contract — "watch this file descriptor and call
//! me back when it is ready, fire this callback every N milliseconds" — and
//! expect the application to drive those callbacks from whatever loop it
//! already owns. This crate is the adapter between such a contract and the
//! host loop: it tracks registrations, translates identifiers, and manages
//! callback lifetimes so that the two sides never see each other's handles.
//!
//! # Architecture
//!
//! - [`events`]: the [`Interest`] mask a registration asks for and the
//!   [`Readiness`] mask a dispatch delivers.
//! - [`host`]: the [`HostLoop`] contract the bridge consumes — subscribe an
//!   fd, subscribe a periodic timer, cancel, and defer a task to the loop
//!   thread — plus [`LabLoop`], a deterministic in-process implementation
//!   for tests.
//! - [`registry`]: the watch and timer tables. Registration calls are safe
//!   from any thread, including from inside a callback running on the loop
//!   thread; dispatch never holds a table lock across a user callback.
//! - [`bridge`]: the [`EventBridge`] coordinator and the process-wide
//!   [`install`]/[`teardown`] hooks that hand the registration API to the
//!   external library exactly once.
//!
//! # Lifecycle
//!
//! Entries are tombstoned on removal and destroyed by a deferred task on the
//! loop thread, because cancelling a host-loop subscription may race with a
//! dispatch the loop has already selected. Identifiers are never reused, so
//! a stale id held by the external library can never alias a new entry.
//!
//! # Example
//!
//! ```
//! use evbridge::{EventBridge, Interest, LabLoop, Readiness};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let lab = Arc::new(LabLoop::new());
//! let bridge = EventBridge::new(lab.clone());
//!
//! let hits = Arc::new(AtomicUsize::new(0));
//! let seen = hits.clone();
//! let id = bridge
//!     .add_watch(7, Interest::READABLE, move |_id, _fd, _ready| {
//!         seen.fetch_add(1, Ordering::SeqCst);
//!     }, None)
//!     .unwrap();
//!
//! lab.fire_fd(7, Readiness::READABLE);
//! lab.turn();
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//!
//! assert!(bridge.remove_watch(id));
//! lab.turn();
//! ```

pub mod bridge;
pub mod error;
pub mod events;
pub mod host;
pub mod registry;

pub use bridge::{install, installed, teardown, EventBridge};
pub use error::BridgeError;
pub use events::{Interest, Readiness};
pub use host::{Dispatch, HostLoop, LabLoop, SubscriptionId};
pub use registry::{Finalizer, TimerId, WatchId};
