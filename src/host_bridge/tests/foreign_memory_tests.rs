//! Tests for string ownership and the allocation ledger.

use super::ForeignMemoryBridge;
use crate::host_bridge::memory_utils::Terminator;
use crate::host_bridge::test_support::FakeGuest;
use proptest::prelude::*;

#[test]
fn written_strings_are_nul_terminated_when_requested() {
    let mut guest = FakeGuest::new();
    let mut bridge = ForeignMemoryBridge::new();

    let string = bridge
        .write_string(&mut guest, "KC_A", Terminator::Nul)
        .expect("write should succeed");
    assert_eq!(string.len(), 4);
    assert_eq!(string.capacity(), 5);

    let start = string.ptr() as usize;
    assert_eq!(&guest.memory[start..start + 5], b"KC_A\0");

    bridge.release(&mut guest, string).expect("release should succeed");
}

#[test]
fn release_frees_exactly_once_with_the_allocated_size() {
    let mut guest = FakeGuest::new();
    let mut bridge = ForeignMemoryBridge::new();

    let string = bridge
        .write_string(&mut guest, "hello", Terminator::None)
        .expect("write should succeed");
    let ptr = string.ptr();
    assert_eq!(bridge.outstanding(), 1);

    bridge.release(&mut guest, string).expect("release should succeed");
    assert_eq!(bridge.outstanding(), 0);
    assert_eq!(guest.deallocs, vec![(ptr, 6)]);
    assert_eq!(bridge.stats().strings_written, 1);
    assert_eq!(bridge.stats().strings_released, 1);
}

#[test]
fn taking_a_cstring_frees_it_through_dealloc_str() {
    let mut guest = FakeGuest::new();
    let mut bridge = ForeignMemoryBridge::new();
    let ptr = guest.place(b"<svg></svg>\0");

    let text = bridge
        .take_cstring(&mut guest, ptr)
        .expect("module string should decode");
    assert_eq!(text, "<svg></svg>");
    assert_eq!(guest.dealloc_strs, vec![ptr]);
    assert!(guest.deallocs.is_empty());
    assert_eq!(bridge.stats().strings_consumed, 1);
}

#[test]
fn taking_a_host_owned_pointer_is_rejected() {
    let mut guest = FakeGuest::new();
    let mut bridge = ForeignMemoryBridge::new();
    let string = bridge
        .write_string(&mut guest, "layout", Terminator::Nul)
        .expect("write should succeed");

    let error = bridge
        .take_cstring(&mut guest, string.ptr())
        .expect_err("module cannot hand back host memory as its own");
    assert!(error.is_contract_violation());
    assert!(guest.dealloc_strs.is_empty());

    bridge.release(&mut guest, string).expect("release should succeed");
}

#[test]
fn failed_reads_do_not_free_anything() {
    let mut guest = FakeGuest::with_memory_size(64);
    guest.memory.iter_mut().for_each(|byte| *byte = b'x');
    let mut bridge = ForeignMemoryBridge::new();

    let error = bridge
        .take_cstring(&mut guest, 10)
        .expect_err("string never terminates");
    assert!(error.is_contract_violation());
    assert!(guest.dealloc_strs.is_empty());
}

#[test]
fn strings_too_large_for_memory_are_handed_back() {
    let mut guest = FakeGuest::with_memory_size(4096);
    let mut bridge = ForeignMemoryBridge::new();
    // The allocator hands out a pointer near the end so the copy cannot fit.
    guest.heap_ptr = 4090;

    let error = bridge
        .write_string(&mut guest, "longer than six bytes", Terminator::Nul)
        .expect_err("copy crosses the end of memory");
    assert!(error.is_contract_violation());
    assert_eq!(bridge.outstanding(), 0);
    assert_eq!(guest.deallocs, vec![(4090, 22)]);
}

#[test]
fn borrowed_reads_leave_the_ledger_alone() {
    let mut guest = FakeGuest::new();
    let mut bridge = ForeignMemoryBridge::new();
    let string = bridge
        .write_string(&mut guest, "borrowed", Terminator::None)
        .expect("write should succeed");

    let read = bridge
        .read_string(&guest, string.ptr(), string.len())
        .expect("span should decode");
    assert_eq!(read, "borrowed");
    assert_eq!(bridge.outstanding(), 1);

    bridge.release(&mut guest, string).expect("release should succeed");
}

proptest! {
    #[test]
    fn strings_without_nul_survive_the_trip_through_memory(text in "\\PC{0,200}") {
        let mut guest = FakeGuest::new();
        let mut bridge = ForeignMemoryBridge::new();

        let plain = bridge.write_string(&mut guest, &text, Terminator::None).unwrap();
        let read_back = bridge.read_string(&guest, plain.ptr(), plain.len()).unwrap();
        prop_assert_eq!(&read_back, &text);
        bridge.release(&mut guest, plain).unwrap();

        let terminated = bridge.write_string(&mut guest, &text, Terminator::Nul).unwrap();
        let ptr = terminated.ptr();
        let copy = guest.memory[ptr as usize..(ptr + terminated.capacity()) as usize].to_vec();
        bridge.release(&mut guest, terminated).unwrap();

        let module_copy = guest.place(&copy);
        let consumed = bridge.take_cstring(&mut guest, module_copy).unwrap();
        prop_assert_eq!(consumed, text);
        prop_assert_eq!(bridge.outstanding(), 0);
    }
}
