use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::ManualVec;

/// Builder for creating an instance of [`ManualVec`].
///
/// All settings are optional. Without any settings, the builder creates the same empty,
/// unallocated container as [`ManualVec::new()`].
///
/// # Examples
///
/// ```
/// use manual_vec::ManualVec;
///
/// let items = ManualVec::<u64>::builder().capacity(16).build();
///
/// assert_eq!(items.capacity(), 16);
/// assert!(items.is_empty());
/// ```
#[must_use]
pub struct ManualVecBuilder<T> {
    capacity: usize,

    _item: PhantomData<T>,
}

impl<T> fmt::Debug for ManualVecBuilder<T> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualVecBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> ManualVecBuilder<T> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            capacity: 0,
            _item: PhantomData,
        }
    }

    /// Sets the number of items the container has room for before its first reallocation.
    ///
    /// A capacity of zero (the default) means no memory is allocated until the first insertion.
    ///
    /// # Examples
    ///
    /// ```
    /// use manual_vec::ManualVec;
    ///
    /// let items = ManualVec::<String>::builder().capacity(3).build();
    /// assert_eq!(items.capacity(), 3);
    /// ```
    #[inline]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds the container with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if the requested capacity overflows `isize::MAX` bytes.
    ///
    /// Calls [`std::alloc::handle_alloc_error`] if memory for the requested capacity
    /// cannot be allocated.
    #[must_use]
    #[inline]
    pub fn build(self) -> ManualVec<T> {
        ManualVec::with_capacity(self.capacity)
    }
}
