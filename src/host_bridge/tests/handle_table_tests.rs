use super::{Handle, HandleTable, HostValue};

#[test]
fn added_values_get_even_handles_above_the_singletons() {
    let mut table = HandleTable::new();

    let document = table.add(HostValue::Document);
    let element = table.add(HostValue::Element("keymap".to_string()));

    assert_eq!(document.raw(), 8);
    assert_eq!(element.raw(), 10);
    assert!(!document.is_stack());
    assert_eq!(table.resolve(document).expect("document should resolve"), &HostValue::Document);
    assert_eq!(table.live_count(), 2);
}

#[test]
fn singleton_values_use_their_permanent_handles() {
    let mut table = HandleTable::new();

    assert_eq!(table.add(HostValue::Undefined), Handle::UNDEFINED);
    assert_eq!(table.add(HostValue::Null), Handle::NULL);
    assert_eq!(table.add(HostValue::Bool(true)), Handle::TRUE);
    assert_eq!(table.add(HostValue::Bool(false)), Handle::FALSE);
    assert_eq!(table.live_count(), 0);

    assert_eq!(table.resolve(Handle::NULL).expect("null resolves"), &HostValue::Null);
    assert_eq!(table.resolve(Handle::FALSE).expect("false resolves"), &HostValue::Bool(false));
}

#[test]
fn singletons_are_never_released_or_reused() {
    let mut table = HandleTable::new();

    for _ in 0..3 {
        table.release(Handle::TRUE).expect("releasing a singleton is a no-op");
    }

    let value = table.add(HostValue::Number(1.5));
    assert_ne!(value, Handle::TRUE);
    assert_eq!(table.resolve(Handle::TRUE).expect("true resolves"), &HostValue::Bool(true));
}

#[test]
fn freed_slot_is_reused_after_count_reaches_zero() {
    let mut table = HandleTable::new();

    let first = table.add(HostValue::String("a".to_string()));
    let _second = table.add(HostValue::String("b".to_string()));

    let again = table.clone_ref(first).expect("clone_ref on a live handle");
    assert_eq!(again, first);
    assert_eq!(table.ref_count(first), Some(2));

    table.release(first).expect("first release");
    assert_eq!(
        table.resolve(first).expect("still one reference left"),
        &HostValue::String("a".to_string())
    );

    table.release(first).expect("second release");
    assert!(table.resolve(first).is_err());

    let reused = table.add(HostValue::String("c".to_string()));
    assert_eq!(reused, first);
    assert_eq!(
        table.resolve(reused).expect("reused handle resolves"),
        &HostValue::String("c".to_string())
    );
}

#[test]
fn free_list_hands_out_the_most_recently_released_slot_first() {
    let mut table = HandleTable::new();

    let a = table.add(HostValue::Number(1.0));
    let b = table.add(HostValue::Number(2.0));
    let c = table.add(HostValue::Number(3.0));

    table.release(a).expect("release a");
    table.release(c).expect("release c");

    assert_eq!(table.add(HostValue::Number(4.0)), c);
    assert_eq!(table.add(HostValue::Number(5.0)), a);
    assert_eq!(table.live_count(), 3);
    assert_eq!(table.resolve(b).expect("b untouched"), &HostValue::Number(2.0));
}

#[test]
fn releasing_a_stale_handle_is_a_contract_violation() {
    let mut table = HandleTable::new();

    let handle = table.add(HostValue::Document);
    table.release(handle).expect("first release");

    let err = table.release(handle).expect_err("double release must fail");
    assert!(err.is_contract_violation());

    let never_issued = Handle::from_raw(400);
    assert!(table.resolve(never_issued).is_err());
}

#[test]
fn odd_handles_address_the_transient_stack() {
    let mut table = HandleTable::new();

    let borrowed = table.push_stack(HostValue::String("kmtext".to_string()));
    assert!(borrowed.is_stack());
    assert_eq!(borrowed.raw(), 1);
    assert_eq!(
        table.resolve(borrowed).expect("stack value resolves"),
        &HostValue::String("kmtext".to_string())
    );

    assert!(table.release(borrowed).is_err());

    // Keeping a borrowed value copies it into the slab
    let kept = table.clone_ref(borrowed).expect("clone of a stack value");
    assert!(!kept.is_stack());

    assert_eq!(table.pop_stack(), Some(HostValue::String("kmtext".to_string())));
    assert!(table.resolve(borrowed).is_err());
    assert_eq!(
        table.resolve(kept).expect("kept copy outlives the stack"),
        &HostValue::String("kmtext".to_string())
    );
}
