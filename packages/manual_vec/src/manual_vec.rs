use std::cmp::Ordering;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::{fmt, mem, ptr, slice};

use scopeguard::ScopeGuard;
use tracing::trace;

use crate::{ManualVecBuilder, RawBuffer};

/// A contiguous growable array that manages item lifetimes by hand on top of a [`RawBuffer`].
///
/// The container owns one raw buffer plus the count of live items. Items occupy the slots
/// `0..len()` of the buffer, while the slots `len()..capacity()` are uninitialized memory.
/// Growing the container never constructs placeholder items in the spare capacity.
///
/// # Growth
///
/// When an insertion finds the buffer full, the capacity doubles (or becomes 1 if it was 0).
/// The new item is constructed in the new buffer before anything else happens, so a failed
/// construction leaves the container exactly as it was. Existing items are then relocated
/// into the new buffer. Relocation is a bitwise move, which cannot fail in Rust, so items
/// are never cloned while the container grows.
///
/// # Panic safety
///
/// Every operation that constructs items through user code (`Default`, `Clone` or a
/// constructor closure) either completes or leaves the container with the same length,
/// capacity and items it had before the call. Items constructed before the failure are
/// dropped in reverse order and any memory allocated for the operation is released.
///
/// The one exception is [`clone_from()`][Clone::clone_from] when the existing capacity is
/// sufficient: a panic while assigning over existing items leaves those items partially
/// assigned. The container is still valid and nothing is leaked or dropped twice.
///
/// # Examples
///
/// ```
/// use manual_vec::ManualVec;
///
/// let mut items = ManualVec::new();
/// items.push(10);
/// items.push(20);
/// items.insert(1, 15);
///
/// assert_eq!(items.as_slice(), &[10, 15, 20]);
/// assert_eq!(items.capacity(), 4);
///
/// items.erase(0);
/// assert_eq!(items.as_slice(), &[15, 20]);
/// ```
pub struct ManualVec<T> {
    buffer: RawBuffer<T>,

    /// Number of live items, stored in slots `0..len` of the buffer.
    len: usize,

    // The container owns and drops values of T, which the buffer alone does not express.
    _owns: PhantomData<T>,
}

impl<T> ManualVec<T> {
    /// Creates an empty container. This does not allocate.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            buffer: RawBuffer::new(),
            len: 0,
            _owns: PhantomData,
        }
    }

    /// Starts building a container with custom settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let items = ManualVec::<u32>::builder().capacity(8).build();
    /// assert_eq!(items.capacity(), 8);
    /// ```
    #[inline]
    pub fn builder() -> ManualVecBuilder<T> {
        ManualVecBuilder::new()
    }

    /// Creates an empty container with room for exactly `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows `isize::MAX` bytes.
    #[must_use]
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: RawBuffer::with_capacity(capacity),
            len: 0,
            _owns: PhantomData,
        }
    }

    /// Creates a container holding `len` default-constructed items, with capacity exactly `len`.
    ///
    /// If `T::default()` panics, the items constructed so far are dropped in reverse order and
    /// the memory is released before the panic continues.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let items = ManualVec::<String>::with_len(3);
    /// assert_eq!(items.len(), 3);
    /// assert!(items.iter().all(String::is_empty));
    /// ```
    #[must_use]
    pub fn with_len(len: usize) -> Self
    where
        T: Default,
    {
        let buffer: RawBuffer<T> = RawBuffer::with_capacity(len);

        // SAFETY: The buffer was just created with room for exactly `len` items and all
        // of its slots are uninitialized. If construction panics, the buffer is dropped
        // during unwinding and releases its memory.
        unsafe {
            construct_n(buffer.as_ptr(), len, T::default);
        }

        Self {
            buffer,
            len,
            _owns: PhantomData,
        }
    }

    /// Number of live items.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the container holds no items.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of items the container can hold without reallocating.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Pointer to the first slot. Dangling if the container has not allocated.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.buffer.as_ptr()
    }

    /// Mutable pointer to the first slot. Dangling if the container has not allocated.
    #[must_use]
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buffer.as_ptr()
    }

    /// The live items as a slice, in index order.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: Slots 0..len are initialized and the pointer is non-null and aligned even
        // when nothing is allocated. We hold a shared borrow of self, so no mutation happens
        // while the slice exists.
        unsafe { slice::from_raw_parts(self.buffer.as_ptr(), self.len) }
    }

    /// The live items as a mutable slice, in index order.
    #[must_use]
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: Slots 0..len are initialized and we hold an exclusive borrow of self.
        unsafe { slice::from_raw_parts_mut(self.buffer.as_ptr(), self.len) }
    }

    /// Appends an item and returns a reference to it.
    ///
    /// If the container is full, the capacity doubles (or becomes 1 if it was 0).
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows.
    pub fn push(&mut self, value: T) -> &mut T {
        self.push_with(|| value)
    }

    /// Appends an item constructed by `f` and returns a reference to it.
    ///
    /// When the container has to grow, `f` runs after the new buffer has been allocated but
    /// before any existing item is touched. If `f` panics, the new buffer is released and the
    /// container is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let mut items = ManualVec::new();
    /// let item = items.push_with(|| String::from("built in place"));
    /// item.push('!');
    ///
    /// assert_eq!(items[0], "built in place!");
    /// ```
    pub fn push_with(&mut self, f: impl FnOnce() -> T) -> &mut T {
        let Ok(item) = self.try_push_with(|| Ok::<T, Infallible>(f()));
        item
    }

    /// Appends an item constructed by a fallible `f` and returns a reference to it.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`. The container is left unchanged, including its
    /// capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let mut numbers = ManualVec::<u8>::new();
    ///
    /// numbers.try_push_with(|| "42".parse()).unwrap();
    /// assert!(numbers.try_push_with(|| "nope".parse()).is_err());
    ///
    /// assert_eq!(numbers.as_slice(), &[42]);
    /// assert_eq!(numbers.capacity(), 1);
    /// ```
    pub fn try_push_with<E>(
        &mut self,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let index = self.len;

        if index < self.buffer.capacity() {
            let value = f()?;

            // SAFETY: index < capacity, so the slot is in bounds, and it is uninitialized
            // because it lies outside the live range.
            unsafe {
                self.buffer.slot(index).write(value);
            }
        } else {
            let new_buffer: RawBuffer<T> = RawBuffer::with_capacity(self.grown_capacity());

            // If this fails, the new buffer is dropped and nothing else has been touched.
            let value = f()?;

            // SAFETY: The new buffer is larger than the old one, so `index` is in bounds.
            unsafe {
                new_buffer.slot(index).write(value);
            }

            self.relocate_into(new_buffer);
        }

        // Cannot overflow because the item fits into the buffer.
        self.len = index.wrapping_add(1);

        #[cfg(debug_assertions)]
        self.integrity_check();

        // SAFETY: We just initialized this slot and the returned borrow is tied to &mut self.
        Ok(unsafe { self.buffer.slot(index).as_mut() })
    }

    /// Removes the last item and returns it, or `None` if the container is empty.
    ///
    /// The capacity is unchanged.
    pub fn pop(&mut self) -> Option<T> {
        let last = self.len.checked_sub(1)?;
        self.len = last;

        // SAFETY: The slot was live and is now outside the live range, so ownership of the
        // value moves to the caller and the container will not drop it again.
        Some(unsafe { self.buffer.slot(last).read() })
    }

    /// Inserts an item at `index`, shifting all items after it to the right, and returns a
    /// reference to the inserted item.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the new capacity overflows.
    pub fn insert(&mut self, index: usize, value: T) -> &mut T {
        self.insert_with(index, || value)
    }

    /// Inserts an item constructed by `f` at `index`, shifting all items after it to the right,
    /// and returns a reference to the inserted item.
    ///
    /// `f` runs before any existing item moves. If `f` panics, the container is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the new capacity overflows.
    pub fn insert_with(&mut self, index: usize, f: impl FnOnce() -> T) -> &mut T {
        let Ok(item) = self.try_insert_with(index, || Ok::<T, Infallible>(f()));
        item
    }

    /// Inserts an item constructed by a fallible `f` at `index`, shifting all items after it
    /// to the right, and returns a reference to the inserted item.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`. The container is left unchanged, including its
    /// capacity.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the new capacity overflows.
    pub fn try_insert_with<E>(
        &mut self,
        index: usize,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        assert!(
            index <= self.len,
            "insertion index {index} is out of bounds in ManualVec of length {}",
            self.len
        );

        if index == self.len {
            return self.try_push_with(f);
        }

        // Cannot underflow because index < len after the checks above.
        let tail_len = self.len.wrapping_sub(index);

        if self.len < self.buffer.capacity() {
            // Construct first: if this fails, no item has moved yet.
            let value = f()?;

            // SAFETY: The tail 0..tail_len after `index` moves one slot to the right, into
            // the slot at `len` which is in bounds (len < capacity) and uninitialized. After
            // the move, the slot at `index` is logically uninitialized and we fill it, so no
            // slot ends up holding two owners of the same value.
            unsafe {
                let slot = self.buffer.slot(index).as_ptr();
                ptr::copy(slot, slot.add(1), tail_len);
                slot.write(value);
            }
        } else {
            let new_buffer: RawBuffer<T> = RawBuffer::with_capacity(self.grown_capacity());

            // If this fails, the new buffer is dropped and nothing else has been touched.
            let value = f()?;

            // SAFETY: The new buffer has room for at least len + 1 items. The prefix lands in
            // 0..index, the new item at index and the suffix in index + 1..len + 1, so the
            // ranges do not overlap and every live item is relocated exactly once.
            unsafe {
                new_buffer.slot(index).write(value);
                relocate(self.buffer.as_ptr(), new_buffer.as_ptr(), index);
                relocate(
                    self.buffer.slot(index).as_ptr(),
                    new_buffer.slot(index.wrapping_add(1)).as_ptr(),
                    tail_len,
                );
            }

            self.adopt_buffer(new_buffer);
        }

        // Cannot overflow because the item fits into the buffer.
        self.len = self.len.wrapping_add(1);

        #[cfg(debug_assertions)]
        self.integrity_check();

        // SAFETY: We just initialized this slot and the returned borrow is tied to &mut self.
        Ok(unsafe { self.buffer.slot(index).as_mut() })
    }

    /// Removes the item at `index` and returns it, shifting all items after it to the left.
    ///
    /// The capacity is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        assert!(
            index < self.len,
            "removal index {index} is out of bounds in ManualVec of length {}",
            self.len
        );

        // Cannot underflow because index < len.
        let last = self.len.wrapping_sub(1);
        let tail_len = last.wrapping_sub(index);

        // SAFETY: The slot at `index` is live. We move its value out, then shift the live
        // items after it one slot to the left. The last slot is left holding a stale bit copy
        // which we exclude from the live range immediately after.
        let value = unsafe {
            let slot = self.buffer.slot(index).as_ptr();
            let value = slot.read();
            ptr::copy(slot.add(1), slot, tail_len);
            value
        };

        self.len = last;

        #[cfg(debug_assertions)]
        self.integrity_check();

        value
    }

    /// Removes and drops the item at `index`, shifting all items after it to the left.
    ///
    /// The item is dropped after the container is back in a consistent state, so a panicking
    /// destructor cannot corrupt the container.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn erase(&mut self, index: usize) {
        drop(self.remove(index));
    }

    /// Ensures room for at least `capacity` items in total (not in addition to the
    /// current length).
    ///
    /// If the capacity is already sufficient, this does nothing. Otherwise, it allocates a
    /// buffer of exactly `capacity` and relocates the items into it. The length never changes.
    ///
    /// # Panics
    ///
    /// Panics if the capacity overflows `isize::MAX` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let mut items = ManualVec::<u32>::new();
    /// items.reserve(10);
    /// assert_eq!(items.capacity(), 10);
    ///
    /// items.reserve(5);
    /// assert_eq!(items.capacity(), 10);
    /// ```
    pub fn reserve(&mut self, capacity: usize) {
        if capacity <= self.buffer.capacity() {
            return;
        }

        self.relocate_into(RawBuffer::with_capacity(capacity));
    }

    /// Ensures room for at least `capacity` items in total, returning an error instead of
    /// panicking if the memory cannot be obtained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`][crate::Error::CapacityOverflow] or
    /// [`Error::AllocationFailed`][crate::Error::AllocationFailed]. The container is left
    /// unchanged.
    pub fn try_reserve(&mut self, capacity: usize) -> crate::Result<()> {
        if capacity <= self.buffer.capacity() {
            return Ok(());
        }

        self.relocate_into(RawBuffer::try_with_capacity(capacity)?);
        Ok(())
    }

    /// Resizes the container to `new_len` items, default-constructing any new items.
    ///
    /// Shrinking drops the surplus items and keeps the capacity. Growing beyond the capacity
    /// reallocates to exactly `new_len`.
    ///
    /// If `T::default()` panics, the new items constructed so far are dropped and the
    /// container keeps its previous length, capacity and items.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let mut items = ManualVec::new();
    /// items.push(7_u8);
    ///
    /// items.resize(3);
    /// assert_eq!(items.as_slice(), &[7, 0, 0]);
    ///
    /// items.resize(0);
    /// assert!(items.is_empty());
    /// assert_eq!(items.capacity(), 3);
    /// ```
    pub fn resize(&mut self, new_len: usize)
    where
        T: Default,
    {
        self.resize_with(new_len, T::default);
    }

    /// Resizes the container to `new_len` items, filling new slots with items returned by `f`.
    ///
    /// The same guarantees apply as for [`resize()`][Self::resize].
    pub fn resize_with(&mut self, new_len: usize, f: impl FnMut() -> T) {
        match new_len.cmp(&self.len) {
            Ordering::Equal => return,
            Ordering::Less => {
                self.truncate(new_len);
                return;
            }
            Ordering::Greater => {}
        }

        // Cannot underflow because new_len > len.
        let additional = new_len.wrapping_sub(self.len);

        if new_len <= self.buffer.capacity() {
            // SAFETY: Slots len..new_len are in bounds and uninitialized. A panic rolls back
            // only the new items, so the live range stays intact.
            unsafe {
                construct_n(self.buffer.slot(self.len).as_ptr(), additional, f);
            }
        } else {
            let new_buffer: RawBuffer<T> = RawBuffer::with_capacity(new_len);

            // SAFETY: The new buffer has room for new_len items, so len..new_len is in bounds
            // and uninitialized. If this panics, the new buffer is dropped during unwinding and
            // the existing items have not been touched.
            unsafe {
                construct_n(new_buffer.slot(self.len).as_ptr(), additional, f);
            }

            self.relocate_into(new_buffer);
        }

        self.len = new_len;

        #[cfg(debug_assertions)]
        self.integrity_check();
    }

    /// Drops all items beyond the first `new_len`. Does nothing if `new_len >= len()`.
    ///
    /// The capacity is unchanged.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }

        // Cannot underflow because new_len < len.
        let surplus = self.len.wrapping_sub(new_len);

        // Shrink the live range first so a panicking destructor cannot cause a double drop.
        self.len = new_len;

        // SAFETY: Slots new_len..new_len + surplus were live and are now outside the live
        // range, so they are dropped exactly once here.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.buffer.slot(new_len).as_ptr(),
                surplus,
            ));
        }
    }

    /// Drops all items. The capacity is unchanged.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Exchanges the contents (buffer and length) of two containers without touching any item.
    ///
    /// This is the move-assignment primitive of the container: afterwards `other` holds what
    /// `self` held before, rather than being empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let mut a = ManualVec::new();
    /// a.push(1);
    /// let mut b = ManualVec::new();
    /// b.push(2);
    /// b.push(3);
    ///
    /// a.swap_contents(&mut b);
    ///
    /// assert_eq!(a.as_slice(), &[2, 3]);
    /// assert_eq!(b.as_slice(), &[1]);
    /// ```
    pub fn swap_contents(&mut self, other: &mut Self) {
        self.buffer.swap(&mut other.buffer);
        mem::swap(&mut self.len, &mut other.len);
    }

    /// The capacity to grow to when inserting into a full buffer.
    fn grown_capacity(&self) -> usize {
        let capacity = self.buffer.capacity();

        if capacity == 0 {
            return 1;
        }

        capacity.checked_mul(2).unwrap_or_else(|| {
            panic!("capacity overflow: cannot grow ManualVec beyond capacity {capacity}")
        })
    }

    /// Moves all live items to the start of `new_buffer` and makes it the active buffer.
    fn relocate_into(&mut self, new_buffer: RawBuffer<T>) {
        debug_assert!(new_buffer.capacity() >= self.len);

        // SAFETY: The new buffer has room for all live items and is distinct from ours.
        unsafe {
            relocate(self.buffer.as_ptr(), new_buffer.as_ptr(), self.len);
        }

        self.adopt_buffer(new_buffer);
    }

    /// Replaces the active buffer with one that already holds the relocated items.
    ///
    /// The old block only contains stale bit copies at this point, so releasing it must not
    /// drop anything, which is exactly what dropping a `RawBuffer` does.
    fn adopt_buffer(&mut self, mut new_buffer: RawBuffer<T>) {
        trace!(
            old_capacity = self.buffer.capacity(),
            new_capacity = new_buffer.capacity(),
            len = self.len,
            "relocated items into new buffer"
        );

        self.buffer.swap(&mut new_buffer);
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    fn integrity_check(&self) {
        assert!(
            self.len <= self.buffer.capacity(),
            "ManualVec length {} exceeds capacity {}",
            self.len,
            self.buffer.capacity()
        );
    }
}

impl<T> Default for ManualVec<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for ManualVec<T> {
    /// Creates a container with capacity exactly `self.len()` holding clones of all items.
    ///
    /// If a clone panics, the clones made so far are dropped in reverse order and the memory
    /// is released.
    fn clone(&self) -> Self {
        let buffer: RawBuffer<T> = RawBuffer::with_capacity(self.len);
        let mut source = self.as_slice().iter();

        // SAFETY: The buffer was just created with room for exactly `len` items, all of them
        // uninitialized. If a clone panics, the clones made so far are dropped and the buffer
        // is released during unwinding.
        unsafe {
            construct_n(buffer.as_ptr(), self.len, || {
                source
                    .next()
                    .expect("source yields exactly as many items as we construct")
                    .clone()
            });
        }

        Self {
            buffer,
            len: self.len,
            _owns: PhantomData,
        }
    }

    /// Replaces the contents of `self` with clones of the items in `source`.
    ///
    /// If `source` does not fit into the current capacity, a full clone is built first and
    /// swapped in, so a panic leaves `self` untouched. Otherwise existing items are assigned
    /// over via [`Clone::clone_from`] and any surplus is dropped or any shortfall is
    /// constructed in the spare capacity.
    fn clone_from(&mut self, source: &Self) {
        if source.len > self.buffer.capacity() {
            // Our previous items end up in `replacement` and are dropped with it.
            let mut replacement = source.clone();
            self.swap_contents(&mut replacement);
            return;
        }

        let overlap = self.len.min(source.len);

        for (target, item) in self.as_mut_slice().iter_mut().zip(source.as_slice()) {
            target.clone_from(item);
        }

        if source.len < self.len {
            self.truncate(source.len);
        } else {
            let mut remaining = source.as_slice().iter().skip(overlap);

            // Cannot underflow because source.len >= len in this branch.
            let shortfall = source.len.wrapping_sub(overlap);

            // SAFETY: source.len <= capacity, so slots len..source.len are in bounds and
            // uninitialized. A panic drops only the items constructed by this call.
            unsafe {
                construct_n(self.buffer.slot(overlap).as_ptr(), shortfall, || {
                    remaining
                        .next()
                        .expect("source yields exactly as many items as we construct")
                        .clone()
                });
            }

            self.len = source.len;
        }

        #[cfg(debug_assertions)]
        self.integrity_check();
    }
}

impl<T> Deref for ManualVec<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for ManualVec<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<'a, T> IntoIterator for &'a ManualVec<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T> IntoIterator for &'a mut ManualVec<T> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T> Extend<T> for ManualVec<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T> FromIterator<T> for ManualVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut items = Self::new();
        items.extend(iter);
        items
    }
}

impl<T: fmt::Debug> fmt::Debug for ManualVec<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualVec")
            .field("items", &self.as_slice())
            .field("capacity", &self.buffer.capacity())
            .finish()
    }
}

impl<T> Drop for ManualVec<T> {
    fn drop(&mut self) {
        // Items are dropped in index order, then the buffer field releases the memory.
        self.clear();
    }
}

/// Relocates `count` items from `source` to `target` by bitwise move.
///
/// Afterwards the source slots hold stale copies that must be treated as uninitialized.
/// A Rust move cannot fail, so relocation never needs to fall back to cloning in order to keep
/// the source intact, and the old items are never dropped.
///
/// # Safety
///
/// `source..source + count` must be live items, `target..target + count` must be
/// uninitialized slots, and the two ranges must not overlap.
unsafe fn relocate<T>(source: *const T, target: *mut T, count: usize) {
    // SAFETY: Forwarding the caller's guarantees.
    unsafe {
        ptr::copy_nonoverlapping(source, target, count);
    }
}

/// Constructs `count` items into consecutive slots starting at `first`, calling `f` for each.
///
/// If `f` panics, the items constructed so far are dropped in reverse order before the panic
/// continues, leaving every slot uninitialized again.
///
/// # Safety
///
/// `first..first + count` must be in bounds of one allocation and uninitialized.
unsafe fn construct_n<T>(first: *mut T, count: usize, mut f: impl FnMut() -> T) {
    let mut constructed = scopeguard::guard(0_usize, |constructed| {
        for index in (0..constructed).rev() {
            // SAFETY: Slots 0..constructed were initialized by the loop below and nothing else
            // owns them yet.
            unsafe {
                first.add(index).drop_in_place();
            }
        }
    });

    while *constructed < count {
        let value = f();

        // SAFETY: The caller guarantees that every slot below `count` is in bounds and
        // uninitialized.
        unsafe {
            first.add(*constructed).write(value);
        }

        // Cannot overflow because it is bounded by `count`.
        *constructed = constructed.wrapping_add(1);
    }

    ScopeGuard::into_inner(constructed);
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    reason = "test code doesn't need the same rigor as production code"
)]
mod tests {
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(ManualVec<u32>: Send, Sync, Clone, Default, fmt::Debug);
    assert_not_impl_any!(ManualVec<Rc<u32>>: Send, Sync);
    assert_not_impl_any!(ManualVec<u32>: Copy);

    #[test]
    fn new_is_empty_and_unallocated() {
        let items = ManualVec::<u32>::new();

        assert_eq!(items.len(), 0);
        assert_eq!(items.capacity(), 0);
        assert!(items.is_empty());
        assert!(items.iter().next().is_none());
    }

    #[test]
    fn push_grows_by_doubling() {
        let mut items = ManualVec::new();
        let mut observed_capacities = Vec::new();

        for value in 0..9_u32 {
            items.push(value);
            observed_capacities.push(items.capacity());
        }

        assert_eq!(observed_capacities, [1, 2, 4, 4, 8, 8, 8, 8, 16]);
        assert_eq!(items.as_slice(), &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn push_returns_reference_to_new_item() {
        let mut items = ManualVec::new();
        items.push(String::from("a"));

        let item = items.push(String::from("b"));
        item.push('!');

        assert_eq!(items.as_slice(), &["a", "b!"]);
    }

    #[test]
    fn push_within_capacity_does_not_reallocate() {
        let mut items = ManualVec::with_capacity(4);
        let base = items.as_ptr();

        items.push(1_u64);
        items.push(2);
        items.push(3);

        assert_eq!(items.as_ptr(), base);
        assert_eq!(items.capacity(), 4);
    }

    #[test]
    fn try_push_with_error_keeps_capacity() {
        let mut items = ManualVec::<u32>::new();

        let result = items.try_push_with(|| Err::<u32, _>("no"));

        assert_eq!(result, Err("no"));
        assert_eq!(items.capacity(), 0);
        assert!(items.is_empty());
    }

    #[test]
    fn try_push_with_error_within_capacity() {
        let mut items = ManualVec::with_capacity(2);
        items.push(1_u32);

        let result = items.try_push_with(|| Err::<u32, _>("no"));

        assert_eq!(result, Err("no"));
        assert_eq!(items.as_slice(), &[1]);
        assert_eq!(items.capacity(), 2);
    }

    #[test]
    fn pop_returns_items_in_reverse() {
        let mut items: ManualVec<_> = (1..=3_u32).collect();

        assert_eq!(items.pop(), Some(3));
        assert_eq!(items.pop(), Some(2));
        assert_eq!(items.pop(), Some(1));
        assert_eq!(items.pop(), None);
        assert_eq!(items.capacity(), 4);
    }

    #[test]
    fn insert_at_front_middle_and_end() {
        let mut items = ManualVec::with_capacity(8);
        items.push(2_u32);

        items.insert(0, 0);
        items.insert(1, 1);
        items.insert(3, 3);

        assert_eq!(items.as_slice(), &[0, 1, 2, 3]);
        assert_eq!(items.capacity(), 8);
    }

    #[test]
    fn insert_with_growth_keeps_order() {
        let mut items = ManualVec::new();
        items.push(10_u32);
        items.push(20);

        let inserted = items.insert(1, 15);
        assert_eq!(*inserted, 15);

        assert_eq!(items.as_slice(), &[10, 15, 20]);
        assert_eq!(items.capacity(), 4);
    }

    #[test]
    fn insert_at_end_of_full_container_grows() {
        let mut items = ManualVec::new();
        items.push(1_u32);

        items.insert(1, 2);

        assert_eq!(items.as_slice(), &[1, 2]);
        assert_eq!(items.capacity(), 2);
    }

    #[test]
    fn insert_into_empty() {
        let mut items = ManualVec::new();

        items.insert(0, "only");

        assert_eq!(items.as_slice(), &["only"]);
        assert_eq!(items.capacity(), 1);
    }

    #[test]
    #[should_panic]
    fn insert_beyond_end_panics() {
        let mut items = ManualVec::new();
        items.push(1_u32);

        items.insert(2, 3);
    }

    #[test]
    fn try_insert_with_error_leaves_items_in_place() {
        let mut items: ManualVec<u32> = [1, 2, 3, 4].into_iter().collect();
        let capacity = items.capacity();

        let result = items.try_insert_with(1, || Err::<u32, _>(()));
        assert!(result.is_err());
        assert_eq!(items.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(items.capacity(), capacity);

        items.push(5);
        let result = items.try_insert_with(2, || Err::<u32, _>(()));
        assert!(result.is_err());
        assert_eq!(items.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn remove_shifts_left_and_keeps_capacity() {
        let mut items: ManualVec<u32> = [1, 2, 3, 4].into_iter().collect();

        assert_eq!(items.remove(1), 2);

        assert_eq!(items.as_slice(), &[1, 3, 4]);
        assert_eq!(items.capacity(), 4);
    }

    #[test]
    fn erase_last_and_first() {
        let mut items: ManualVec<String> = ["a", "b", "c"].into_iter().map(String::from).collect();

        items.erase(2);
        items.erase(0);

        assert_eq!(items.as_slice(), &["b"]);
    }

    #[test]
    #[should_panic]
    fn remove_out_of_bounds_panics() {
        let mut items = ManualVec::new();
        items.push(1_u32);

        _ = items.remove(1);
    }

    #[test]
    fn insert_then_erase_is_identity() {
        let original: ManualVec<u32> = (0..5).collect();

        for index in 0..=original.len() {
            let mut items = original.clone();
            items.insert(index, 99);
            items.erase(index);

            assert_eq!(items.as_slice(), original.as_slice());
        }
    }

    #[test]
    fn reserve_is_exact_and_keeps_items() {
        let mut items: ManualVec<u32> = (0..3).collect();

        items.reserve(17);

        assert_eq!(items.capacity(), 17);
        assert_eq!(items.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn reserve_smaller_is_noop() {
        let mut items = ManualVec::<u32>::with_capacity(8);
        let base = items.as_ptr();

        items.reserve(3);
        items.reserve(8);

        assert_eq!(items.capacity(), 8);
        assert_eq!(items.as_ptr(), base);
    }

    #[test]
    fn try_reserve_overflow_leaves_container_untouched() {
        let mut items: ManualVec<u64> = (0..3).collect();

        let result = items.try_reserve(usize::MAX);

        assert!(matches!(
            result,
            Err(crate::Error::CapacityOverflow { .. })
        ));
        assert_eq!(items.as_slice(), &[0, 1, 2]);
        assert_eq!(items.capacity(), 4);
    }

    #[test]
    fn resize_grows_with_defaults() {
        let mut items = ManualVec::new();
        items.push(5_u32);

        items.resize(4);

        assert_eq!(items.as_slice(), &[5, 0, 0, 0]);
        assert_eq!(items.capacity(), 4);
    }

    #[test]
    fn resize_within_capacity_keeps_buffer() {
        let mut items = ManualVec::<u32>::with_capacity(10);
        let base = items.as_ptr();

        items.resize(6);

        assert_eq!(items.len(), 6);
        assert_eq!(items.as_ptr(), base);
    }

    #[test]
    fn resize_to_zero_keeps_capacity() {
        let mut items: ManualVec<String> = ["x", "y", "z"].into_iter().map(String::from).collect();
        let capacity = items.capacity();

        items.resize(0);

        assert!(items.is_empty());
        assert_eq!(items.capacity(), capacity);
    }

    #[test]
    fn resize_with_uses_closure() {
        let mut next = 0_u32;
        let mut items = ManualVec::new();

        items.resize_with(3, || {
            next += 1;
            next
        });

        assert_eq!(items.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn with_len_default_constructs() {
        let items = ManualVec::<u32>::with_len(5);

        assert_eq!(items.as_slice(), &[0; 5]);
        assert_eq!(items.capacity(), 5);
    }

    #[test]
    fn clone_is_exactly_sized_and_independent() {
        let mut original: ManualVec<String> = ["a", "b", "c"].into_iter().map(String::from).collect();
        assert_eq!(original.capacity(), 4);

        let mut copy = original.clone();
        assert_eq!(copy.capacity(), 3);
        assert_eq!(copy.as_slice(), original.as_slice());

        copy[0].push('!');
        original.push(String::from("d"));

        assert_eq!(copy.as_slice(), &["a!", "b", "c"]);
        assert_eq!(original.as_slice(), &["a", "b", "c", "d"]);
    }

    #[test]
    fn clone_from_larger_source_reallocates() {
        let source: ManualVec<u32> = (0..5).collect();
        let mut target = ManualVec::new();
        target.push(42);

        target.clone_from(&source);

        assert_eq!(target.as_slice(), source.as_slice());
        assert_eq!(target.capacity(), 5);
    }

    #[test]
    fn clone_from_shorter_source_drops_surplus() {
        let source: ManualVec<String> = ["x"].into_iter().map(String::from).collect();
        let mut target: ManualVec<String> = ["a", "b", "c"].into_iter().map(String::from).collect();

        target.clone_from(&source);

        assert_eq!(target.as_slice(), &["x"]);
        assert_eq!(target.capacity(), 4);
    }

    #[test]
    fn clone_from_longer_source_within_capacity() {
        let source: ManualVec<String> = ["x", "y", "z"].into_iter().map(String::from).collect();
        let mut target = ManualVec::with_capacity(8);
        target.push(String::from("a"));

        target.clone_from(&source);

        assert_eq!(target.as_slice(), &["x", "y", "z"]);
        assert_eq!(target.capacity(), 8);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut source: ManualVec<u32> = (0..10).collect();
        let base = source.as_ptr();

        let moved = mem::take(&mut source);

        assert_eq!(moved.len(), 10);
        assert_eq!(moved.as_ptr(), base);
        assert_eq!(source.len(), 0);
        assert_eq!(source.capacity(), 0);
    }

    #[test]
    fn swap_contents_exchanges_buffers_and_lengths() {
        let mut a = ManualVec::<u32>::with_capacity(8);
        let a_base = a.as_ptr();
        let mut b: ManualVec<u32> = (0..3).collect();
        let b_base = b.as_ptr();

        a.swap_contents(&mut b);

        assert_eq!(a.as_slice(), &[0, 1, 2]);
        assert_eq!(a.capacity(), 4);
        assert_eq!(a.as_ptr(), b_base);
        assert!(b.is_empty());
        assert_eq!(b.capacity(), 8);
        assert_eq!(b.as_ptr(), a_base);
    }

    #[test]
    fn iteration_is_in_index_order() {
        let mut items: ManualVec<u32> = (0..4).collect();

        for item in &mut items {
            *item *= 10;
        }

        let collected: Vec<u32> = (&items).into_iter().copied().collect();
        assert_eq!(collected, [0, 10, 20, 30]);
    }

    #[test]
    fn zero_sized_items() {
        let mut items = ManualVec::new();

        for _ in 0..5 {
            items.push(());
        }
        items.insert(2, ());
        items.erase(0);

        assert_eq!(items.len(), 5);
        assert_eq!(items.capacity(), 8);
    }

    #[test]
    fn drops_every_item_exactly_once() {
        let tracker = Rc::new(());

        {
            let mut items = ManualVec::new();
            for _ in 0..10 {
                items.push(Rc::clone(&tracker));
            }
            items.insert(3, Rc::clone(&tracker));
            items.erase(5);
            items.resize_with(20, || Rc::clone(&tracker));
            items.truncate(15);

            assert_eq!(Rc::strong_count(&tracker), 16);
        }

        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn appends_relocate_linear_number_of_items() {
        const APPENDS: usize = 1000;

        let mut items = ManualVec::new();
        let mut relocated = 0;

        for value in 0..APPENDS {
            let capacity_before = items.capacity();
            let len_before = items.len();

            items.push(value);

            if items.capacity() != capacity_before {
                relocated += len_before;
            }
        }

        // 1 + 2 + 4 + ... + 512 items moved across the ten reallocations.
        assert_eq!(relocated, 1023);
        assert!(relocated < 2 * APPENDS);
    }

    #[test]
    fn dropping_non_empty_container_drops_items() {
        let tracker = Rc::new(());

        let mut items = ManualVec::with_capacity(4);
        items.push(Rc::clone(&tracker));
        items.push(Rc::clone(&tracker));
        assert_eq!(Rc::strong_count(&tracker), 3);

        drop(items);

        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn debug_output_lists_items() {
        let items: ManualVec<u32> = (1..=2).collect();

        let output = format!("{items:?}");

        assert!(output.contains("[1, 2]"));
        assert!(output.contains("capacity: 2"));
    }
}
