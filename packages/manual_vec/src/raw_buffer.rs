use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::any::type_name;
use std::ptr::NonNull;
use std::{fmt, mem};

use crate::{Error, Result};

/// An exclusively owned block of uninitialized memory with room for `capacity` items of type `T`.
///
/// This is the storage layer of [`ManualVec`][crate::ManualVec]. It only owns memory: it never
/// constructs, reads or drops any `T`. Whoever uses the buffer decides which slots hold live
/// items and must drop those items before the buffer itself is dropped, otherwise they leak.
///
/// A buffer of capacity zero does not allocate, and neither does a buffer for a zero-sized `T`
/// (it simply reports the requested capacity).
///
/// The buffer cannot be cloned: a block of memory has exactly one owner at any time. Ownership
/// moves either through ordinary Rust moves, through [`take()`][Self::take] which leaves an empty
/// buffer behind, or through [`swap()`][Self::swap].
///
/// # Examples
///
/// ```
/// use manual_vec::RawBuffer;
///
/// let buffer = RawBuffer::<u64>::with_capacity(4);
/// assert_eq!(buffer.capacity(), 4);
///
/// // SAFETY: Slot 0 is within capacity and nothing lives there yet.
/// unsafe {
///     buffer.slot(0).write(42);
///     assert_eq!(buffer.slot(0).read(), 42);
/// }
/// // u64 has no drop logic, so there is nothing to clean up before dropping the buffer.
/// ```
pub struct RawBuffer<T> {
    /// Start of the allocation. Dangling (but well-aligned) if nothing was allocated.
    ptr: NonNull<T>,

    /// Number of items the block has room for.
    capacity: usize,
}

impl<T> RawBuffer<T> {
    /// Creates an empty buffer with zero capacity. This does not allocate.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: 0,
        }
    }

    /// Creates a buffer with room for exactly `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if the size of the block in bytes would exceed `isize::MAX`.
    ///
    /// Calls [`handle_alloc_error`] if the allocator cannot satisfy the request.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        match Self::try_with_capacity(capacity) {
            Ok(buffer) => buffer,
            Err(Error::CapacityOverflow { requested }) => panic!(
                "capacity overflow: cannot reserve memory for {requested} items of {}",
                type_name::<T>()
            ),
            Err(Error::AllocationFailed { layout }) => handle_alloc_error(layout),
        }
    }

    /// Creates a buffer with room for exactly `capacity` items, returning an error instead of
    /// panicking if the memory cannot be obtained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the size of the block in bytes would exceed
    /// `isize::MAX` and [`Error::AllocationFailed`] if the allocator returns no memory.
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || size_of::<T>() == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                capacity,
            });
        }

        let layout = Layout::array::<T>(capacity)
            .ok()
            .ok_or(Error::CapacityOverflow {
                requested: capacity,
            })?;

        // SAFETY: The layout has a non-zero size because capacity > 0 and T is not zero-sized,
        // both of which we checked above.
        let ptr = unsafe { alloc(layout) };

        let ptr = NonNull::new(ptr.cast::<T>()).ok_or(Error::AllocationFailed { layout })?;

        Ok(Self { ptr, capacity })
    }

    /// Number of items the buffer has room for.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Base address of the block. Dangling if the buffer did not allocate.
    ///
    /// The buffer never creates references to its contents, so the caller is free to read and
    /// write through this pointer within the bounds of the capacity, as long as every read
    /// targets a slot the caller has previously initialized.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Address of the slot at `index`.
    ///
    /// `index == capacity` is accepted and returns the one-past-the-end address. That address
    /// must only be used for address arithmetic and comparison, never dereferenced.
    ///
    /// # Safety
    ///
    /// `index` must not be greater than the capacity. Debug builds check this with an assertion.
    #[must_use]
    #[inline]
    pub unsafe fn slot(&self, index: usize) -> NonNull<T> {
        debug_assert!(
            index <= self.capacity,
            "slot {index} is out of bounds in buffer of {} with capacity {}",
            type_name::<T>(),
            self.capacity
        );

        // SAFETY: The caller guarantees index <= capacity. An offset of exactly `capacity` is
        // the one-past-the-end address, which is still within the same allocated object.
        unsafe { self.ptr.add(index) }
    }

    /// Moves the block out of `self`, leaving an empty buffer with zero capacity behind.
    ///
    /// This never allocates.
    #[must_use]
    #[inline]
    pub fn take(&mut self) -> Self {
        mem::replace(self, Self::new())
    }

    /// Exchanges the blocks (and capacities) of two buffers. This never allocates.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.ptr, &mut other.ptr);
        mem::swap(&mut self.capacity, &mut other.capacity);
    }

    fn is_allocated(&self) -> bool {
        self.capacity != 0 && size_of::<T>() != 0
    }
}

impl<T> Default for RawBuffer<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RawBuffer<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuffer")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> Drop for RawBuffer<T> {
    fn drop(&mut self) {
        if !self.is_allocated() {
            return;
        }

        let layout = Layout::array::<T>(self.capacity)
            .expect("layout was already validated when the block was allocated");

        // SAFETY: We allocated this block in try_with_capacity() with the same layout, and it
        // has not been released yet because every ownership transfer leaves an unallocated
        // buffer behind in the source.
        unsafe {
            dealloc(self.ptr.as_ptr().cast(), layout);
        }
    }
}

// SAFETY: The buffer exclusively owns its block and holds no thread-bound state. Moving it to
// another thread moves the right to access the slots, which is fine whenever the items could
// themselves move to that thread.
unsafe impl<T: Send> Send for RawBuffer<T> {}

// SAFETY: Shared access to the buffer only hands out addresses, never references, so sharing it
// is as safe as sharing the items themselves.
unsafe impl<T: Sync> Sync for RawBuffer<T> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(RawBuffer<u32>: Send, Sync, fmt::Debug, Default);
    assert_impl_all!(RawBuffer<Cell<u32>>: Send);
    assert_not_impl_any!(RawBuffer<Cell<u32>>: Sync);
    assert_not_impl_any!(RawBuffer<Rc<u32>>: Send, Sync);
    assert_not_impl_any!(RawBuffer<u32>: Clone, Copy);

    #[test]
    fn zero_capacity_does_not_allocate() {
        let buffer = RawBuffer::<u64>::with_capacity(0);

        assert_eq!(buffer.capacity(), 0);
        assert_eq!(buffer.as_ptr(), NonNull::<u64>::dangling().as_ptr());
        assert!(!buffer.is_allocated());
    }

    #[test]
    fn new_is_empty() {
        let buffer = RawBuffer::<String>::new();

        assert_eq!(buffer.capacity(), 0);
        assert!(!buffer.is_allocated());
    }

    #[test]
    fn slots_are_writable_and_readable() {
        let buffer = RawBuffer::<String>::with_capacity(3);
        assert_eq!(buffer.capacity(), 3);

        for index in 0..3 {
            unsafe {
                buffer.slot(index).write(format!("item {index}"));
            }
        }

        for index in 0..3 {
            let item = unsafe { buffer.slot(index).as_ref() };
            assert_eq!(item, &format!("item {index}"));
        }

        // The buffer does not drop items, so we must do it ourselves.
        for index in 0..3 {
            unsafe {
                buffer.slot(index).drop_in_place();
            }
        }
    }

    #[test]
    fn slots_are_contiguous() {
        let buffer = RawBuffer::<u32>::with_capacity(4);

        let base = buffer.as_ptr();
        for index in 0..4 {
            assert_eq!(unsafe { buffer.slot(index) }.as_ptr(), unsafe { base.add(index) });
        }
    }

    #[test]
    fn one_past_end_slot_is_addressable() {
        let buffer = RawBuffer::<u32>::with_capacity(4);

        let end = unsafe { buffer.slot(4) };
        assert_eq!(end.as_ptr(), unsafe { buffer.as_ptr().add(4) });
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn slot_beyond_one_past_end_panics_in_debug_builds() {
        let buffer = RawBuffer::<u32>::with_capacity(4);

        _ = unsafe { buffer.slot(5) };
    }

    #[test]
    fn take_leaves_empty_buffer() {
        let mut source = RawBuffer::<u32>::with_capacity(8);
        let source_ptr = source.as_ptr();

        let destination = source.take();

        assert_eq!(destination.capacity(), 8);
        assert_eq!(destination.as_ptr(), source_ptr);
        assert_eq!(source.capacity(), 0);
        assert!(!source.is_allocated());
    }

    #[test]
    fn swap_exchanges_blocks() {
        let mut a = RawBuffer::<u32>::with_capacity(2);
        let mut b = RawBuffer::<u32>::with_capacity(5);
        let a_ptr = a.as_ptr();
        let b_ptr = b.as_ptr();

        a.swap(&mut b);

        assert_eq!(a.capacity(), 5);
        assert_eq!(a.as_ptr(), b_ptr);
        assert_eq!(b.capacity(), 2);
        assert_eq!(b.as_ptr(), a_ptr);
    }

    #[test]
    fn swap_with_empty() {
        let mut a = RawBuffer::<u32>::with_capacity(2);
        let mut b = RawBuffer::<u32>::new();

        a.swap(&mut b);

        assert_eq!(a.capacity(), 0);
        assert_eq!(b.capacity(), 2);
    }

    #[test]
    fn try_with_capacity_reports_overflow() {
        let result = RawBuffer::<u64>::try_with_capacity(usize::MAX);

        assert!(matches!(
            result,
            Err(Error::CapacityOverflow {
                requested: usize::MAX
            })
        ));
    }

    #[test]
    #[should_panic]
    fn with_capacity_panics_on_overflow() {
        _ = RawBuffer::<u64>::with_capacity(usize::MAX);
    }

    #[test]
    fn zero_sized_items_do_not_allocate() {
        let buffer = RawBuffer::<()>::with_capacity(usize::MAX);

        assert_eq!(buffer.capacity(), usize::MAX);
        assert!(!buffer.is_allocated());
    }

    #[test]
    fn debug_output_mentions_capacity() {
        let buffer = RawBuffer::<u8>::with_capacity(7);

        let output = format!("{buffer:?}");
        assert!(output.contains("capacity: 7"));
    }
}
