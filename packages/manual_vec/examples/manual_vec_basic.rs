//! Walks through the basic lifecycle of a `ManualVec`: growth, insertion, removal and a
//! constructor that fails halfway through an insertion.
//!
//! Buffer relocations are logged at trace level.

use std::panic::{self, AssertUnwindSafe};

use manual_vec::ManualVec;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    println!("=== ManualVec basic example ===");

    let mut names = ManualVec::with_capacity(1);
    names.push(String::from("Alice"));
    println!("len {} capacity {}", names.len(), names.capacity());

    // The buffer is full, so this doubles the capacity.
    names.push(String::from("Bob"));
    println!("len {} capacity {}", names.len(), names.capacity());

    // Full again, so the new item is built in a new buffer and the others move around it.
    names.insert(1, String::from("Charlie"));
    println!("{:?}", names.as_slice());

    // A constructor that panics leaves the container exactly as it was.
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        names.insert_with(0, || panic!("could not produce a name"));
    }));
    println!(
        "insertion failed: {}, items still {:?}, capacity still {}",
        result.is_err(),
        names.as_slice(),
        names.capacity()
    );

    // Fallible constructors report errors without panicking.
    let parsed = names.try_push_with(|| "Dave".parse::<String>());
    println!("parsed name: {parsed:?}");

    names.erase(0);
    println!("after erasing the first item: {:?}", names.as_slice());

    names.resize(0);
    println!("after resizing to zero: len {} capacity {}", names.len(), names.capacity());

    println!("Example completed successfully!");
}
