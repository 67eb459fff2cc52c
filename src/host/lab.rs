//! Deterministic lab host loop.
//!
//! [`LabLoop`] is a controllable, single-threaded stand-in for a real event
//! loop, used to exercise the bridge without OS-level readiness or wall-clock
//! timers. Tests inject readiness with [`fire_fd`](LabLoop::fire_fd), move
//! virtual time with [`advance`](LabLoop::advance), and then drain everything
//! with [`turn`](LabLoop::turn) from the thread playing the loop thread.
//!
//! # Cancellation semantics
//!
//! Cancelling a subscription prevents dispatches that have not yet been
//! queued. A dispatch already sitting in the queue still delivers, which
//! deliberately models a loop whose cancellation is asynchronous with
//! dispatch selection — the race the bridge's deferred destruction exists to
//! survive. Zero-period timers fire once per `advance` call rather than
//! looping forever.

use super::{DeferredTask, Dispatch, FdHandler, HostLoop, SubscriptionId, TimerHandler};
use crate::events::{Interest, Readiness};
use slab::Slab;
use std::collections::VecDeque;
use std::io;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedFdHandler = Arc<dyn Fn(Readiness) -> Dispatch + Send + Sync>;
type SharedTimerHandler = Arc<dyn Fn() -> Dispatch + Send + Sync>;

/// Deterministic host loop for tests.
#[derive(Default)]
pub struct LabLoop {
    state: Mutex<LabState>,
}

#[derive(Default)]
struct LabState {
    now_ms: u64,
    next_generation: u32,
    subs: Slab<LabSub>,
    queued: VecDeque<Queued>,
    deferred: VecDeque<DeferredTask>,
    created: u64,
}

struct LabSub {
    generation: u32,
    kind: SubKind,
}

enum SubKind {
    Fd {
        fd: RawFd,
        interest: Interest,
        handler: SharedFdHandler,
    },
    Timer {
        period_ms: u64,
        next_due_ms: u64,
        handler: SharedTimerHandler,
    },
}

/// A dispatch the loop has selected but not yet run. Holds its own clone of
/// the handler so delivery does not depend on the subscription still being
/// registered.
enum Queued {
    Fd {
        subscription: SubscriptionId,
        handler: SharedFdHandler,
        ready: Readiness,
    },
    Timer {
        subscription: SubscriptionId,
        handler: SharedTimerHandler,
    },
}

/// Packs a slab key and generation into a subscription id (generation in the
/// upper 32 bits, key in the lower).
const fn pack(key: usize, generation: u32) -> SubscriptionId {
    SubscriptionId::new(((generation as u64) << 32) | key as u64)
}

const fn unpack(subscription: SubscriptionId) -> (usize, u32) {
    let raw = subscription.raw();
    ((raw & u32::MAX as u64) as usize, (raw >> 32) as u32)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl LabLoop {
    /// Creates a lab loop with virtual time at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LabState> {
        self.state.lock().expect("lab loop lock poisoned")
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_millis(self.lock().now_ms)
    }

    /// Total subscriptions ever created. Lets tests assert re-subscription
    /// churn (or the absence of it).
    #[must_use]
    pub fn subscriptions_created(&self) -> u64 {
        self.lock().created
    }

    /// Number of currently registered subscriptions.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.lock().subs.len()
    }

    /// Number of dispatches selected but not yet delivered.
    #[must_use]
    pub fn pending_dispatches(&self) -> usize {
        self.lock().queued.len()
    }

    /// Queues a readiness dispatch for every live subscription on `fd` whose
    /// interest (widened with hangup and error) intersects `ready`.
    pub fn fire_fd(&self, fd: RawFd, ready: Readiness) {
        let mut state = self.lock();
        let mut hits = Vec::new();
        for (key, sub) in state.subs.iter() {
            if let SubKind::Fd {
                fd: sub_fd,
                interest,
                handler,
            } = &sub.kind
            {
                let wanted =
                    Readiness::from_interest(*interest) | Readiness::HANGUP | Readiness::ERROR;
                if *sub_fd == fd && ready.intersects(wanted) {
                    hits.push(Queued::Fd {
                        subscription: pack(key, sub.generation),
                        handler: handler.clone(),
                        ready,
                    });
                }
            }
        }
        state.queued.extend(hits);
    }

    /// Advances virtual time, queueing a dispatch for every timer firing that
    /// falls due. A timer that fell behind by several periods queues several
    /// dispatches.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now_ms = state.now_ms.saturating_add(millis(by));
        let now = state.now_ms;
        let mut due = Vec::new();
        for (key, sub) in state.subs.iter_mut() {
            let generation = sub.generation;
            if let SubKind::Timer {
                period_ms,
                next_due_ms,
                handler,
            } = &mut sub.kind
            {
                if *period_ms == 0 {
                    due.push(Queued::Timer {
                        subscription: pack(key, generation),
                        handler: handler.clone(),
                    });
                } else {
                    while *next_due_ms <= now {
                        due.push(Queued::Timer {
                            subscription: pack(key, generation),
                            handler: handler.clone(),
                        });
                        *next_due_ms += *period_ms;
                    }
                }
            }
        }
        state.queued.extend(due);
    }

    /// Runs one loop iteration on the calling thread: delivers every queued
    /// dispatch, then every deferred task, repeating until both queues are
    /// empty. Returns the number of dispatches and tasks run.
    pub fn turn(&self) -> usize {
        let mut processed = 0;
        loop {
            let batch: Vec<Queued> = self.lock().queued.drain(..).collect();
            if !batch.is_empty() {
                for item in batch {
                    processed += 1;
                    let (subscription, verdict) = match item {
                        Queued::Fd {
                            subscription,
                            handler,
                            ready,
                        } => (subscription, handler(ready)),
                        Queued::Timer {
                            subscription,
                            handler,
                        } => (subscription, handler()),
                    };
                    if verdict == Dispatch::Remove {
                        let _ = self.cancel(subscription);
                    }
                }
                continue;
            }
            let tasks: Vec<DeferredTask> = self.lock().deferred.drain(..).collect();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                processed += 1;
                task();
            }
        }
        processed
    }

    fn insert(&self, kind: SubKind) -> SubscriptionId {
        let mut state = self.lock();
        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);
        state.created += 1;
        let key = state.subs.insert(LabSub { generation, kind });
        pack(key, generation)
    }
}

impl HostLoop for LabLoop {
    fn watch_fd(
        &self,
        fd: RawFd,
        interest: Interest,
        handler: FdHandler,
    ) -> io::Result<SubscriptionId> {
        Ok(self.insert(SubKind::Fd {
            fd,
            interest,
            handler: Arc::from(handler),
        }))
    }

    fn add_periodic(&self, period: Duration, handler: TimerHandler) -> io::Result<SubscriptionId> {
        let period_ms = millis(period);
        let next_due_ms = self.lock().now_ms.saturating_add(period_ms);
        Ok(self.insert(SubKind::Timer {
            period_ms,
            next_due_ms,
            handler: Arc::from(handler),
        }))
    }

    fn cancel(&self, subscription: SubscriptionId) -> io::Result<()> {
        let (key, generation) = unpack(subscription);
        let mut state = self.lock();
        let live = state
            .subs
            .get(key)
            .is_some_and(|sub| sub.generation == generation);
        if live {
            state.subs.remove(key);
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                "subscription already gone",
            ))
        }
    }

    fn defer(&self, task: DeferredTask) {
        self.lock().deferred.push_back(task);
    }
}

impl std::fmt::Debug for LabLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LabLoop")
            .field("now_ms", &state.now_ms)
            .field("live", &state.subs.len())
            .field("queued", &state.queued.len())
            .field("deferred", &state.deferred.len())
            .finish()
    }
}
