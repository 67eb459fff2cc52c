//! Registration-API thread-safety: calls race from arbitrary threads while
//! dispatch stays on the (test-driven) loop thread.

mod common;

use common::{lab_bridge, DispatchLog, Probe};
use evbridge::{Interest, Readiness};
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_adds_issue_distinct_ids() {
    let (lab, bridge) = lab_bridge();

    let mut joins = Vec::new();
    for t in 0..8 {
        let bridge = bridge.clone();
        joins.push(thread::spawn(move || {
            let mut ids = Vec::new();
            for _ in 0..50 {
                ids.push(bridge.add_watch(t, Interest::READABLE, |_, _, _| {}, None).unwrap());
            }
            ids
        }));
    }

    let mut all: Vec<_> = joins
        .into_iter()
        .flat_map(|j| j.join().unwrap())
        .collect();
    all.sort();
    let before = all.len();
    all.dedup();
    assert_eq!(all.len(), before, "no id issued twice");
    assert_eq!(all.len(), 400);

    // No lost updates: every issued id is present and removable.
    for id in all {
        assert!(bridge.remove_watch(id));
    }
    lab.turn();
}

#[test]
fn concurrent_removal_finds_exactly_once() {
    let (lab, bridge) = lab_bridge();

    for _ in 0..100 {
        let id = bridge
            .add_watch(3, Interest::READABLE, |_, _, _| {}, None)
            .unwrap();

        let other = bridge.clone();
        let racer = thread::spawn(move || other.remove_watch(id));
        let here = bridge.remove_watch(id);
        let there = racer.join().unwrap();

        assert!(here ^ there, "exactly one remover wins");
        lab.turn();
    }
}

#[test]
fn removal_from_another_thread_suppresses_pending_dispatch() {
    let (lab, bridge) = lab_bridge();
    let log = DispatchLog::new();
    let finalized = Probe::new();

    let record = log.clone();
    let id = bridge
        .add_watch(
            4,
            Interest::READABLE,
            move |id, fd, ready| record.record(id, fd, ready),
            Some(finalized.finalizer()),
        )
        .unwrap();

    lab.fire_fd(4, Readiness::READABLE);

    let other = bridge.clone();
    let removed = thread::spawn(move || other.remove_watch(id))
        .join()
        .unwrap();
    assert!(removed);

    // remove_watch returned on the other thread: the queued dispatch must
    // not reach the callback, and destruction happens exactly once.
    lab.turn();
    assert_eq!(log.len(), 0);
    assert_eq!(finalized.count(), 1);
}

#[test]
fn callback_may_register_new_entries() {
    let (lab, bridge) = lab_bridge();
    let nested = DispatchLog::new();

    let bridge_ref = Arc::downgrade(&bridge);
    let record = nested.clone();
    bridge
        .add_watch(
            5,
            Interest::READABLE,
            move |_id, _fd, _ready| {
                let bridge = bridge_ref.upgrade().expect("bridge alive");
                let record = record.clone();
                bridge
                    .add_watch(6, Interest::WRITABLE, move |id, fd, ready| {
                        record.record(id, fd, ready);
                    }, None)
                    .unwrap();
            },
            None,
        )
        .unwrap();

    lab.fire_fd(5, Readiness::READABLE);
    lab.turn();

    lab.fire_fd(6, Readiness::WRITABLE);
    lab.turn();
    assert_eq!(nested.len(), 1, "watch registered from inside a dispatch works");
}

#[test]
fn callback_may_drive_timers_and_watches_together() {
    let (lab, bridge) = lab_bridge();
    let finalized = Probe::new();

    // A timer whose callback removes a watch, from the loop thread.
    let watch = bridge
        .add_watch(7, Interest::READABLE, |_, _, _| {}, Some(finalized.finalizer()))
        .unwrap();

    let bridge_ref = Arc::downgrade(&bridge);
    let timer = bridge
        .add_timer(10, move |_id| {
            let bridge = bridge_ref.upgrade().expect("bridge alive");
            bridge.remove_watch(watch);
        }, None)
        .unwrap();

    lab.advance(std::time::Duration::from_millis(10));
    lab.turn();
    assert_eq!(finalized.count(), 1, "watch removed and destroyed via timer callback");
    assert!(!bridge.remove_watch(watch));
    assert!(bridge.remove_timer(timer));
    lab.turn();
}
