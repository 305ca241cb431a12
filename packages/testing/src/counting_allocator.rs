use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

thread_local! {
    // Const-initialized and free of drop logic, so touching it from inside the allocator
    // can neither allocate nor register a TLS destructor.
    static LIVE_BYTES: Cell<isize> = const { Cell::new(0) };
}

/// A global allocator that forwards to [`System`] and keeps a per-thread balance of
/// allocated minus released bytes.
///
/// Register it in a test binary and compare [`live_bytes_on_current_thread()`] before and after
/// the code under test. Memory allocated on one thread and released on another skews both
/// balances, so keep the code under test on a single thread.
///
/// # Examples
///
/// ```
/// use testing::{CountingAllocator, live_bytes_on_current_thread};
///
/// #[global_allocator]
/// static ALLOCATOR: CountingAllocator = CountingAllocator;
///
/// fn main() {
///     let before = live_bytes_on_current_thread();
///     drop(vec![0_u8; 100]);
///     assert_eq!(live_bytes_on_current_thread(), before);
/// }
/// ```
#[derive(Debug, Default)]
pub struct CountingAllocator;

// SAFETY: We forward every call to the system allocator unchanged and only do bookkeeping that
// cannot allocate or unwind.
unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: Forwarding the caller's guarantees.
        let ptr = unsafe { System.alloc(layout) };

        if !ptr.is_null() {
            record(layout, Direction::Allocated);
        }

        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            System.dealloc(ptr, layout);
        }

        record(layout, Direction::Released);
    }
}

enum Direction {
    Allocated,
    Released,
}

fn record(layout: Layout, direction: Direction) {
    // Layout guarantees that the size fits into isize.
    let size = isize::try_from(layout.size()).unwrap_or(isize::MAX);

    let delta = match direction {
        Direction::Allocated => size,
        Direction::Released => size.wrapping_neg(),
    };

    // During thread teardown the slot may already be gone, in which case we simply stop counting.
    _ = LIVE_BYTES.try_with(|live| live.set(live.get().wrapping_add(delta)));
}

/// Bytes allocated through [`CountingAllocator`] on the current thread and not yet released.
///
/// Only the difference between two readings is meaningful.
#[must_use]
pub fn live_bytes_on_current_thread() -> isize {
    LIVE_BYTES.with(Cell::get)
}
