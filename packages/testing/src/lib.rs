#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in `manual_vec`.
//!
//! - [`Probe`] is an item type that records every construction, clone and drop on the current
//!   thread and can be told to panic on a chosen construction, to exercise rollback paths.
//! - [`CountingAllocator`] is a global allocator wrapper that tracks the bytes currently
//!   allocated by the current thread, to detect leaked buffers.

mod counting_allocator;
mod probe;

pub use counting_allocator::*;
pub use probe::*;
