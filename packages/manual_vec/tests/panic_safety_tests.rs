//! Verifies that operations running user code leave the container as it was when that code
//! panics, without leaking or double-dropping any item.
//!
//! Every test uses `Probe` items, which track their own lifecycle and panic if dropped twice.
//! Failures are injected with `fail_on_construction()`, counting construction attempts from
//! the moment it is called.

use std::panic::{self, AssertUnwindSafe};

use manual_vec::ManualVec;
use testing::{Probe, fail_on_construction, probe_stats, reset_probes, values};

fn probes(count: u64) -> ManualVec<Probe> {
    (0..count).map(Probe::new).collect()
}

fn expect_panic<R>(f: impl FnOnce() -> R) {
    panic::catch_unwind(AssertUnwindSafe(|| {
        drop(f());
    }))
    .expect_err("operation was expected to panic");
}

#[test]
fn with_len_drops_constructed_items_on_panic() {
    reset_probes();
    fail_on_construction(3);

    expect_panic(|| ManualVec::<Probe>::with_len(5));

    let stats = probe_stats();
    assert_eq!(stats.constructed(), 3);
    assert_eq!(stats.dropped(), 3);
    assert_eq!(stats.live(), 0);
}

#[test]
fn clone_drops_partial_clones_on_panic() {
    reset_probes();
    let items = probes(4);
    fail_on_construction(2);

    expect_panic(|| items.clone());

    assert_eq!(values(&items), [0, 1, 2, 3]);
    assert_eq!(items.capacity(), 4);

    let stats = probe_stats();
    assert_eq!(stats.cloned(), 2);
    assert_eq!(stats.live(), 4);
}

#[test]
fn push_with_growth_is_unchanged_on_panic() {
    reset_probes();
    let mut items = probes(2);
    assert_eq!(items.capacity(), 2);
    let base = items.as_ptr();
    fail_on_construction(0);

    expect_panic(|| {
        items.push_with(|| Probe::new(9));
    });

    assert_eq!(values(&items), [0, 1]);
    assert_eq!(items.capacity(), 2);
    assert_eq!(items.as_ptr(), base);
    assert_eq!(probe_stats().live(), 2);
}

#[test]
fn push_within_capacity_is_unchanged_on_panic() {
    reset_probes();
    let mut items = ManualVec::with_capacity(4);
    items.push(Probe::new(0));
    fail_on_construction(0);

    expect_panic(|| {
        items.push_with(Probe::default);
    });

    assert_eq!(values(&items), [0]);
    assert_eq!(items.capacity(), 4);
    assert_eq!(probe_stats().live(), 1);
}

#[test]
fn insert_with_growth_is_unchanged_on_panic() {
    reset_probes();
    let mut items = probes(4);
    assert_eq!(items.capacity(), 4);
    fail_on_construction(0);

    expect_panic(|| {
        items.insert_with(2, || Probe::new(9));
    });

    assert_eq!(values(&items), [0, 1, 2, 3]);
    assert_eq!(items.capacity(), 4);
    assert_eq!(probe_stats().live(), 4);
}

#[test]
fn insert_within_capacity_is_unchanged_on_panic() {
    reset_probes();
    let mut items = probes(3);
    assert_eq!(items.capacity(), 4);
    fail_on_construction(0);

    expect_panic(|| {
        items.insert_with(1, || Probe::new(9));
    });

    assert_eq!(values(&items), [0, 1, 2]);
    assert_eq!(items.capacity(), 4);
    assert_eq!(probe_stats().live(), 3);
}

#[test]
fn resize_with_growth_is_unchanged_on_panic() {
    reset_probes();
    let mut items = probes(2);
    fail_on_construction(2);

    expect_panic(|| items.resize(6));

    assert_eq!(values(&items), [0, 1]);
    assert_eq!(items.capacity(), 2);

    let stats = probe_stats();
    assert_eq!(stats.dropped(), 2);
    assert_eq!(stats.live(), 2);
}

#[test]
fn resize_within_capacity_is_unchanged_on_panic() {
    reset_probes();
    let mut items = probes(2);
    items.reserve(8);
    fail_on_construction(1);

    expect_panic(|| items.resize(6));

    assert_eq!(values(&items), [0, 1]);
    assert_eq!(items.capacity(), 8);

    let stats = probe_stats();
    assert_eq!(stats.dropped(), 1);
    assert_eq!(stats.live(), 2);
}

#[test]
fn clone_from_with_growth_is_unchanged_on_panic() {
    reset_probes();
    let mut target: ManualVec<Probe> = [Probe::new(100)].into_iter().collect();
    let source = probes(3);
    fail_on_construction(1);

    expect_panic(|| target.clone_from(&source));

    assert_eq!(values(&target), [100]);
    assert_eq!(target.capacity(), 1);

    let stats = probe_stats();
    assert_eq!(stats.cloned(), 1);
    assert_eq!(stats.live(), 4);
}

#[test]
fn clone_from_within_capacity_keeps_assigned_items_on_panic() {
    reset_probes();
    let mut target = ManualVec::builder().capacity(8).build();
    target.push(Probe::new(100));
    let source = probes(3);

    // Attempt 0 assigns over the existing item, attempts 1 and 2 fill the tail.
    fail_on_construction(2);

    expect_panic(|| target.clone_from(&source));

    // Items assigned before the failure keep their new values. The tail is rolled back.
    assert_eq!(values(&target), [0]);
    assert_eq!(target.capacity(), 8);
    assert_eq!(probe_stats().live(), 4);
}

#[test]
fn failed_try_push_constructs_nothing() {
    reset_probes();
    let mut items = probes(2);

    let result = items.try_push_with(|| Err::<Probe, _>("refused"));

    assert_eq!(result.map(|item| item.value()), Err("refused"));
    assert_eq!(items.len(), 2);
    assert_eq!(items.capacity(), 2);
    assert_eq!(probe_stats().constructed(), 2);
}

#[test]
fn failed_try_insert_constructs_nothing() {
    reset_probes();
    let mut items = probes(4);

    let result = items.try_insert_with(0, || Err::<Probe, _>("refused"));

    assert_eq!(result.map(|item| item.value()), Err("refused"));
    assert_eq!(values(&items), [0, 1, 2, 3]);
    assert_eq!(items.capacity(), 4);
}

#[test]
fn growth_never_clones() {
    reset_probes();
    let mut items = ManualVec::new();

    for value in 0..128 {
        items.push(Probe::new(value));
    }

    // The buffer is full, so the first of these insertions grows it.
    for value in 128..138 {
        items.insert(0, Probe::new(value));
    }

    assert_eq!(items.capacity(), 256);

    items.reserve(1000);
    items.resize_with(200, Probe::default);

    let stats = probe_stats();
    assert_eq!(stats.cloned(), 0);
    assert_eq!(stats.dropped(), 0);
    assert_eq!(stats.live(), 200);

    drop(items);

    assert_eq!(probe_stats().live(), 0);
    assert_eq!(probe_stats().dropped(), 200);
}

#[test]
fn removal_paths_drop_each_item_once() {
    reset_probes();
    let mut items = probes(6);

    items.erase(1);
    let removed = items.remove(0);
    assert_eq!(removed.value(), 0);
    drop(removed);

    assert_eq!(items.pop().map(|item| item.value()), Some(5));

    items.truncate(2);
    assert_eq!(values(&items), [2, 3]);

    items.clear();

    let stats = probe_stats();
    assert_eq!(stats.dropped(), 6);
    assert_eq!(stats.live(), 0);
    assert_eq!(items.capacity(), 8);
}

#[test]
fn unwinding_drops_container_items_once() {
    reset_probes();

    expect_panic(|| {
        let mut items = ManualVec::with_capacity(4);
        items.push(Probe::new(1));
        items.push(Probe::new(2));

        panic!("unrelated failure while the container holds items");
    });

    let stats = probe_stats();
    assert_eq!(stats.dropped(), 2);
    assert_eq!(stats.live(), 0);
}

#[test]
fn container_stays_usable_after_failed_operation() {
    reset_probes();
    let mut items = probes(2);
    fail_on_construction(0);

    expect_panic(|| {
        items.insert_with(0, || Probe::new(9));
    });

    items.insert(0, Probe::new(9));
    items.push(Probe::new(10));

    assert_eq!(values(&items), [9, 0, 1, 10]);
    assert_eq!(items.capacity(), 4);
}
