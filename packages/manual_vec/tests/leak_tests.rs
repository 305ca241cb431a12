//! Verifies that no memory is leaked, neither by successful operations nor by operations that
//! are rolled back after a panic.
//!
//! The whole binary runs with a counting global allocator that tracks the live bytes of each
//! thread. Panic output is silenced so that the test harness does not allocate capture buffers
//! while a measurement is in progress.

#![cfg(not(miri))] // Miri replaces the global allocator, so cannot be used here.

use std::panic::{self, AssertUnwindSafe};

use manual_vec::ManualVec;
use testing::{
    CountingAllocator, Probe, fail_on_construction, live_bytes_on_current_thread, probe_stats,
    reset_probes,
};

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

/// Prepares the current thread for a measurement and returns the baseline.
fn start_measurement() -> isize {
    panic::set_hook(Box::new(|_| {}));

    // The first panic on a thread may initialize state that is never released.
    _ = panic::catch_unwind(|| {
        panic!("warm-up");
    });

    reset_probes();

    live_bytes_on_current_thread()
}

fn expect_panic(f: impl FnOnce()) {
    let result = panic::catch_unwind(AssertUnwindSafe(f));

    // The payload is allocated by the panic and must be released before measuring.
    drop(result.expect_err("operation was expected to panic"));
}

#[test]
fn successful_operations_release_everything() {
    let baseline = start_measurement();

    {
        let mut items = ManualVec::new();

        for value in 0..50 {
            items.push(Probe::new(value));
        }

        items.insert(10, Probe::new(100));
        items.erase(0);
        items.reserve(200);
        items.resize(150);

        let mut copy = items.clone();
        copy.clone_from(&items);
        copy.truncate(3);
        items.clone_from(&copy);
    }

    assert_eq!(live_bytes_on_current_thread(), baseline);
    assert_eq!(probe_stats().live(), 0);
}

#[test]
fn rolled_back_growth_releases_new_buffer() {
    let baseline = start_measurement();

    {
        let mut items: ManualVec<Probe> = (0..8).map(Probe::new).collect();
        let with_items = live_bytes_on_current_thread();

        fail_on_construction(0);
        expect_panic(|| {
            items.push_with(|| Probe::new(8));
        });

        fail_on_construction(0);
        expect_panic(|| {
            items.insert_with(3, || Probe::new(8));
        });

        fail_on_construction(5);
        expect_panic(|| items.resize(20));

        assert_eq!(live_bytes_on_current_thread(), with_items);
    }

    assert_eq!(live_bytes_on_current_thread(), baseline);
    assert_eq!(probe_stats().live(), 0);
}

#[test]
fn rolled_back_clones_release_everything() {
    let baseline = start_measurement();

    {
        let source: ManualVec<Probe> = (0..8).map(Probe::new).collect();
        let mut target: ManualVec<Probe> = (0..2).map(Probe::new).collect();
        let with_items = live_bytes_on_current_thread();

        fail_on_construction(4);
        expect_panic(|| drop(source.clone()));

        fail_on_construction(4);
        expect_panic(|| target.clone_from(&source));

        fail_on_construction(4);
        expect_panic(|| drop(ManualVec::<Probe>::with_len(10)));

        assert_eq!(live_bytes_on_current_thread(), with_items);
    }

    assert_eq!(live_bytes_on_current_thread(), baseline);
    assert_eq!(probe_stats().live(), 0);
}

#[test]
fn failed_try_reserve_allocates_nothing() {
    let baseline = start_measurement();

    {
        let mut items: ManualVec<u64> = (0..4).collect();
        let with_items = live_bytes_on_current_thread();

        items
            .try_reserve(usize::MAX)
            .expect_err("reserving usize::MAX items cannot succeed");

        assert_eq!(live_bytes_on_current_thread(), with_items);
        assert_eq!(items.capacity(), 4);
    }

    assert_eq!(live_bytes_on_current_thread(), baseline);
}
