#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A growable array that keeps memory ownership and item lifetimes strictly apart.
//!
//! This crate provides two layers:
//!
//! - [`RawBuffer<T>`] owns a block of uninitialized memory with room for a fixed number of
//!   items. It never constructs or drops an item.
//! - [`ManualVec<T>`] owns one raw buffer plus the count of live items. It places items into
//!   the buffer explicitly, relocates them when it grows and drops them explicitly.
//!
//! Separating the two means spare capacity is never filled with placeholder items, and every
//! multi-step operation can be reasoned about in terms of which slots are live at each step.
//!
//! # Key features
//!
//! - **Amortized O(1) append**: capacity doubles when the buffer is full.
//! - **Construct before disturbing**: when an insertion must grow the buffer, the new item is
//!   built in the new buffer before any existing item moves, so a failing constructor leaves
//!   the container untouched.
//! - **Panic safety**: operations that run user code (`Default`, `Clone`, constructor closures)
//!   roll back partially constructed items and release any new memory if that code panics.
//! - **Fallible construction**: `try_push_with()` and `try_insert_with()` accept constructors
//!   that return a `Result` and leave the container unchanged on error.
//! - **Fallible allocation**: [`ManualVec::try_reserve()`] and
//!   [`RawBuffer::try_with_capacity()`] report allocation failure as an [`Error`].
//!
//! # Examples
//!
//! ```
//! use manual_vec::ManualVec;
//!
//! let mut items = ManualVec::new();
//! items.push(10);
//! assert_eq!(items.capacity(), 1);
//!
//! items.push(20);
//! assert_eq!(items.capacity(), 2);
//!
//! items.insert(1, 15);
//! assert_eq!(items.as_slice(), &[10, 15, 20]);
//! assert_eq!(items.capacity(), 4);
//!
//! items.erase(1);
//! assert_eq!(items.as_slice(), &[10, 20]);
//! assert_eq!(items.capacity(), 4);
//! ```
//!
//! Failed construction leaves the container as it was:
//!
//! ```
//! use std::panic::{self, AssertUnwindSafe};
//!
//! use manual_vec::ManualVec;
//!
//! let mut items: ManualVec<String> = ["a", "b"].into_iter().map(String::from).collect();
//!
//! let result = panic::catch_unwind(AssertUnwindSafe(|| {
//!     items.insert_with(1, || panic!("constructor failed"));
//! }));
//!
//! assert!(result.is_err());
//! assert_eq!(items.as_slice(), &["a", "b"]);
//! assert_eq!(items.capacity(), 2);
//! ```
//!
//! # Thread safety
//!
//! The container is a single-owner type without internal synchronization. It is [`Send`] and
//! [`Sync`] exactly when `T` is, like any other owning collection.

mod builder;
mod error;
mod manual_vec;
mod raw_buffer;

pub use builder::*;
pub use error::Error;
pub(crate) use error::Result;
pub use manual_vec::ManualVec;
pub use raw_buffer::RawBuffer;
