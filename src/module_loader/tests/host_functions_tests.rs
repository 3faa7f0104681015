use super::{HostFunctionId, resolve_import, strip_bindgen_hash};
use wasmer::Type;

#[test]
fn bindgen_hash_suffix_is_stripped() {
    assert_eq!(
        strip_bindgen_hash("__wbg_getElementById_8c4314de7fabbd92"),
        "__wbg_getElementById"
    );
    assert_eq!(
        strip_bindgen_hash("__wbg_set_inner_html_fc05625f561eb4f2"),
        "__wbg_set_inner_html"
    );
}

#[test]
fn names_without_a_hash_are_left_alone() {
    assert_eq!(strip_bindgen_hash("__wbindgen_throw"), "__wbindgen_throw");
    assert_eq!(
        strip_bindgen_hash("__wbg_static_accessor_document_document"),
        "__wbg_static_accessor_document_document"
    );
    // Fifteen digits is not a wasm-bindgen hash
    assert_eq!(strip_bindgen_hash("thing_8c4314de7fabbd9"), "thing_8c4314de7fabbd9");
}

#[test]
fn imports_resolve_to_host_functions() {
    let get_element = resolve_import("__wbg_getElementById_0123456789abcdef")
        .expect("getElementById should resolve");
    assert_eq!(get_element.id, HostFunctionId::GetElementById);
    assert!(get_element.matches_signature(&[Type::I32, Type::I32, Type::I32], &[Type::I32]));
    assert!(!get_element.matches_signature(&[Type::I32, Type::I32], &[Type::I32]));

    let drop_ref = resolve_import("__wbindgen_object_drop_ref").expect("drop_ref should resolve");
    assert_eq!(drop_ref.id, HostFunctionId::ObjectDropRef);

    assert!(resolve_import("__wbg_alert_0123456789abcdef").is_none());
}
