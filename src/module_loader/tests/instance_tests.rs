use super::KeymapClient;
use crate::dom::page::Page;
use crate::dom::viewer_template::VIEWER_TEMPLATE;
use crate::host_bridge::bridge_errors::{ErrorMetaDataKey, ErrorType};
use crate::module_loader::contract::EntryAbi;
use crate::module_loader::stub_module::{StubKind, build_stub_module};
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, Instruction, MemArg, MemorySection, MemoryType, Module,
    TypeSection, ValType,
};

// C-string module whose svg always returns a null pointer, optionally importing one function
fn null_returning_module(import_name: Option<&str>) -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function(vec![ValType::I32], vec![ValType::I32]); // 0: alloc, svg
    types.ty().function(vec![ValType::I32, ValType::I32], vec![]); // 1: dealloc, import
    types.ty().function(vec![ValType::I32], vec![]); // 2: dealloc_str

    let mut imports = ImportSection::new();
    let import_count = match import_name {
        Some(name) => {
            imports.import("./ergoweb", name, EntityType::Function(1));
            1
        }
        None => 0,
    };

    let mut functions = FunctionSection::new();
    let mut code = CodeSection::new();
    let mut exports = ExportSection::new();

    let bodies: [(&str, u32, i32); 4] = [
        ("alloc", 0, 1024),
        ("dealloc", 1, -1),
        ("dealloc_str", 2, -1),
        ("svg", 0, 0),
    ];
    for (index, (name, type_index, result)) in bodies.into_iter().enumerate() {
        functions.function(type_index);

        let mut func = Function::new(vec![]);
        if result >= 0 {
            func.instruction(&Instruction::I32Const(result));
        }
        func.instruction(&Instruction::End);
        code.function(&func);

        exports.export(name, ExportKind::Func, import_count + index as u32);
    }
    exports.export("memory", ExportKind::Memory, 0);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: 1,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });

    let mut module = Module::new();
    module.section(&types);
    if import_count > 0 {
        module.section(&imports);
    }
    module.section(&functions);
    module.section(&memories);
    module.section(&exports);
    module.section(&code);
    module.finish()
}

const OUTPUT_PTR: i32 = 2048;
const DEALLOC_STR_MARKER: u64 = 0;

// C-string module whose dealloc traps. dealloc_str leaves a 1 at address 0 so the host's
// call can be observed, and svg always returns the string "ok" stored at OUTPUT_PTR.
fn trapping_dealloc_module() -> Vec<u8> {
    let mut types = TypeSection::new();
    types.ty().function(vec![ValType::I32], vec![ValType::I32]); // 0: alloc, svg
    types.ty().function(vec![ValType::I32, ValType::I32], vec![]); // 1: dealloc
    types.ty().function(vec![ValType::I32], vec![]); // 2: dealloc_str

    let mut functions = FunctionSection::new();
    let mut code = CodeSection::new();
    let mut exports = ExportSection::new();

    let mut alloc = Function::new(vec![]);
    alloc.instruction(&Instruction::I32Const(1024));
    alloc.instruction(&Instruction::End);

    let mut dealloc = Function::new(vec![]);
    dealloc.instruction(&Instruction::Unreachable);
    dealloc.instruction(&Instruction::End);

    let mut dealloc_str = Function::new(vec![]);
    dealloc_str.instruction(&Instruction::I32Const(DEALLOC_STR_MARKER as i32));
    dealloc_str.instruction(&Instruction::I32Const(1));
    dealloc_str.instruction(&Instruction::I32Store(MemArg {
        offset: 0,
        align: 2,
        memory_index: 0,
    }));
    dealloc_str.instruction(&Instruction::End);

    let mut svg = Function::new(vec![]);
    svg.instruction(&Instruction::I32Const(OUTPUT_PTR));
    svg.instruction(&Instruction::End);

    let bodies = [
        ("alloc", 0, alloc),
        ("dealloc", 1, dealloc),
        ("dealloc_str", 2, dealloc_str),
        ("svg", 0, svg),
    ];
    for (index, (name, type_index, body)) in bodies.iter().enumerate() {
        functions.function(*type_index);
        code.function(body);
        exports.export(name, ExportKind::Func, index as u32);
    }
    exports.export("memory", ExportKind::Memory, 0);

    let mut memories = MemorySection::new();
    memories.memory(MemoryType {
        minimum: 1,
        maximum: None,
        memory64: false,
        shared: false,
        page_size_log2: None,
    });

    let mut data = DataSection::new();
    data.active(0, &ConstExpr::i32_const(OUTPUT_PTR), b"ok\0".iter().copied());

    let mut module = Module::new();
    module.section(&types);
    module.section(&functions);
    module.section(&memories);
    module.section(&exports);
    module.section(&code);
    module.section(&data);
    module.finish()
}

fn client(kind: StubKind) -> KeymapClient {
    KeymapClient::instantiate(&build_stub_module(kind), None, Page::parse(VIEWER_TEMPLATE))
        .expect("stub module should instantiate")
}

#[test]
fn c_string_render_round_trips_unicode() {
    let mut client = client(StubKind::CString);
    assert_eq!(client.abi(), EntryAbi::CString);

    let text = "<text>Ünïcödé ⌘ layer</text>";
    assert_eq!(client.render_markup(text).expect("render should succeed"), text);
    assert_eq!(client.outstanding_allocations(), 0);

    // The stub's heap grows past the first page
    let long = "x".repeat(100_000);
    assert_eq!(client.render_markup(&long).expect("large render"), long);
}

#[test]
fn bindgen_modules_only_render_into_the_page() {
    let mut client = client(StubKind::Bindgen);
    assert_eq!(client.abi(), EntryAbi::Bindgen);

    let err = client.render_markup("KC_A").expect_err("no markup to hand back");
    assert_eq!(err.error_type, ErrorType::Module);

    client.render_into("<b id=\"done\">KC_A</b>", "keymap").expect("render should succeed");
    assert!(client.document().contains("done"));
    assert_eq!(client.live_handles(), 0);
}

#[test]
fn missing_target_is_reported_before_calling_the_module() {
    let mut client = client(StubKind::Bindgen);

    let err = client.render_into("KC_A", "nowhere").expect_err("no such element");
    assert!(err.is_config_error());
    assert_eq!(err.metadata(ErrorMetaDataKey::ElementId), Some("nowhere"));
    assert_eq!(client.outstanding_allocations(), 0);
}

#[test]
fn null_result_is_a_contract_violation() {
    let bytes = null_returning_module(None);
    let mut client = KeymapClient::instantiate(&bytes, None, Page::parse(VIEWER_TEMPLATE))
        .expect("module should instantiate");

    let err = client.render_markup("KC_A").expect_err("null pointer");
    assert!(err.is_contract_violation());
    assert_eq!(client.outstanding_allocations(), 0);
}

#[test]
fn unknown_imports_reject_instantiation() {
    let bytes = null_returning_module(Some("__wbg_alert_0123456789abcdef"));
    let err = KeymapClient::instantiate(&bytes, None, Page::parse(VIEWER_TEMPLATE))
        .err()
        .expect("unknown import must be rejected");

    assert_eq!(err.error_type, ErrorType::Module);
    assert_eq!(
        err.metadata(ErrorMetaDataKey::ImportName),
        Some("./ergoweb.__wbg_alert_0123456789abcdef")
    );
}

#[test]
fn imports_with_the_wrong_signature_are_rejected() {
    // __wbindgen_object_drop_ref takes one argument, this import declares two
    let bytes = null_returning_module(Some("__wbindgen_object_drop_ref"));
    let err = KeymapClient::instantiate(&bytes, None, Page::parse(VIEWER_TEMPLATE))
        .err()
        .expect("mismatched import must be rejected");

    assert!(err.msg.contains("signature"));
}

#[test]
fn known_imports_with_matching_signatures_are_wired() {
    let bytes = null_returning_module(Some("__wbindgen_throw"));
    let client = KeymapClient::instantiate(&bytes, None, Page::parse(VIEWER_TEMPLATE))
        .expect("throw import should be provided");

    assert_eq!(client.contract().imports.len(), 1);
}

#[test]
fn module_output_is_freed_when_releasing_the_input_fails() {
    let bytes = trapping_dealloc_module();
    let mut client = KeymapClient::instantiate(&bytes, None, Page::parse(VIEWER_TEMPLATE))
        .expect("module should instantiate");

    let err = client.render_markup("KC_A").expect_err("dealloc traps");
    assert_eq!(err.error_type, ErrorType::Module);
    assert_eq!(err.metadata(ErrorMetaDataKey::ExportName), Some("dealloc"));

    let marker = client
        .memory
        .view(&client.store)
        .read_u8(DEALLOC_STR_MARKER)
        .expect("marker is in memory");
    assert_eq!(marker, 1);
}
