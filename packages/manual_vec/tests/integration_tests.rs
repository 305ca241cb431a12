//! Integration tests for `manual_vec` exercising the public API the way a consumer would.

use manual_vec::{Error, ManualVec, RawBuffer};

#[test]
fn growth_scenario_from_single_item() {
    let mut items = ManualVec::with_capacity(1);
    items.push(10);
    assert_eq!(items.capacity(), 1);

    items.push(20);
    assert_eq!(items.as_slice(), &[10, 20]);
    assert_eq!(items.len(), 2);
    assert_eq!(items.capacity(), 2);

    let inserted = items.insert(1, 15);
    assert_eq!(*inserted, 15);

    assert_eq!(items.as_slice(), &[10, 15, 20]);
    assert_eq!(items.len(), 3);
    assert_eq!(items.capacity(), 4);
}

#[test]
fn erase_keeps_capacity() {
    let mut items: ManualVec<i32> = [1, 2, 3, 4].into_iter().collect();
    let capacity = items.capacity();

    items.erase(1);

    assert_eq!(items.as_slice(), &[1, 3, 4]);
    assert_eq!(items.len(), 3);
    assert_eq!(items.capacity(), capacity);
}

#[test]
fn resize_to_zero_keeps_capacity() {
    let mut items: ManualVec<String> = ["a", "b", "c"].into_iter().map(String::from).collect();
    let capacity = items.capacity();

    items.resize(0);

    assert!(items.is_empty());
    assert_eq!(items.capacity(), capacity);
}

#[test]
fn appended_values_are_kept_in_order() {
    let mut items = ManualVec::new();

    for value in 0..1000_u32 {
        items.push(value.to_string());
        assert!(items.capacity() >= items.len());
    }

    assert_eq!(items.len(), 1000);
    assert_eq!(items.capacity(), 1024);

    for (index, item) in items.iter().enumerate() {
        assert_eq!(item, &index.to_string());
    }
}

#[test]
fn clone_is_independent_of_source() {
    let source: ManualVec<String> = ["x", "y"].into_iter().map(String::from).collect();
    let mut copy = source.clone();

    copy.as_mut_slice()
        .first_mut()
        .expect("copy has items")
        .push_str("-changed");
    copy.push(String::from("z"));

    assert_eq!(source.as_slice(), &["x", "y"]);
    assert_eq!(copy.as_slice(), &["x-changed", "y", "z"]);
}

#[test]
fn take_transfers_contents_and_empties_source() {
    let mut source: ManualVec<String> = ["a", "b"].into_iter().map(String::from).collect();
    let capacity = source.capacity();
    let base = source.as_ptr();

    let destination = std::mem::take(&mut source);

    assert!(source.is_empty());
    assert_eq!(source.capacity(), 0);
    assert_eq!(destination.as_slice(), &["a", "b"]);
    assert_eq!(destination.capacity(), capacity);
    assert_eq!(destination.as_ptr(), base);
}

#[test]
fn insert_then_erase_restores_every_position() {
    let original: ManualVec<u32> = (0..7).collect();

    for position in 0..=original.len() {
        let mut items = original.clone();

        items.insert(position, 99);
        items.erase(position);

        assert_eq!(items.as_slice(), original.as_slice());
    }
}

#[test]
fn slice_api_is_available_through_deref() {
    let mut items: ManualVec<u32> = [5, 3, 9, 1].into_iter().collect();

    items.sort_unstable();

    assert_eq!(items.first(), Some(&1));
    assert_eq!(items.last(), Some(&9));
    assert!(items.contains(&5));
    assert_eq!(items.get(10), None);
}

#[test]
#[should_panic]
fn indexing_out_of_bounds_panics() {
    let items: ManualVec<u32> = (0..3).collect();

    #[expect(
        clippy::indexing_slicing,
        reason = "we are verifying that out of bounds indexing panics"
    )]
    let _item = items[3];
}

#[test]
fn try_reserve_reports_overflow() {
    let mut items = ManualVec::<u64>::new();

    let error = items
        .try_reserve(usize::MAX)
        .expect_err("reserving usize::MAX items cannot succeed");

    assert!(matches!(error, Error::CapacityOverflow { requested: usize::MAX }));
    assert_eq!(items.capacity(), 0);
}

#[test]
fn raw_buffer_is_usable_on_its_own() {
    let mut buffer = RawBuffer::<u32>::with_capacity(3);

    for (index, value) in [0_u32, 10, 20].into_iter().enumerate() {
        // SAFETY: The slot is in bounds and uninitialized. u32 needs no drop.
        unsafe {
            buffer.slot(index).write(value);
        }
    }

    let mut other = RawBuffer::new();
    buffer.swap(&mut other);

    assert_eq!(buffer.capacity(), 0);
    assert_eq!(other.capacity(), 3);

    // SAFETY: All three slots were initialized above and moved along with the memory block.
    let values = unsafe { std::slice::from_raw_parts(other.as_ptr(), 3) };
    assert_eq!(values, &[0, 10, 20]);
}

#[test]
fn builder_sets_initial_capacity() {
    let mut items = ManualVec::builder().capacity(2).build();
    let base = items.as_ptr();

    items.push(String::from("first"));
    items.push(String::from("second"));

    assert_eq!(items.capacity(), 2);
    assert_eq!(items.as_ptr(), base);
}

#[test]
fn builder_accepts_explicit_item_type() {
    let items = ManualVec::<u8>::builder().build();

    assert_eq!(items.capacity(), 0);
    assert!(items.is_empty());
}

#[test]
fn container_can_move_between_threads() {
    let items: ManualVec<String> = ["a", "b"].into_iter().map(String::from).collect();

    let handle = std::thread::spawn(move || items.iter().map(String::len).sum::<usize>());

    assert_eq!(handle.join().expect("thread completed successfully"), 2);
}
