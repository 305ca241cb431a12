use std::alloc::Layout;

use thiserror::Error;

/// Errors that can occur when reserving memory for a [`ManualVec`][crate::ManualVec] or a
/// [`RawBuffer`][crate::RawBuffer].
///
/// Only the `try_*` family of methods returns these. The infallible counterparts treat the same
/// conditions as fatal, panicking on capacity overflow and calling
/// [`std::alloc::handle_alloc_error`] on allocation failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested capacity cannot be represented as a valid memory layout, either because
    /// the total size in bytes exceeds `isize::MAX` or because growing the capacity overflowed.
    #[error("capacity overflow: cannot reserve memory for {requested} items")]
    CapacityOverflow {
        /// The number of items the caller asked to make room for.
        requested: usize,
    },

    /// The global allocator could not satisfy the request.
    #[error("memory allocation of {} bytes failed", layout.size())]
    AllocationFailed {
        /// The layout that the allocator rejected.
        layout: Layout,
    },
}

/// A specialized `Result` type for memory reservation, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
