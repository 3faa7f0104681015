//! Stub keymap modules
//!
//! Small modules that follow the same contracts as the real compiled keymap module but echo
//! their input back instead of rendering it. They let the loader, the bridge and the viewer be
//! exercised end to end without the real artifact.
//!
//! ## Memory Layout
//!
//! ```text
//! +------------------+ 0
//! | Static data      |  (error message of the throwing variant)
//! +------------------+ STUB_HEAP_START
//! | Heap (grows up)  |  (bump allocator, grows memory on demand)
//! +------------------+
//! ```

use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection,
    Function, FunctionSection, GlobalSection, GlobalType, ImportSection, Instruction, MemArg,
    MemorySection, MemoryType, Module, TypeSection, ValType,
};

pub const STUB_HEAP_START: i32 = 1024;
pub const STUB_THROW_MESSAGE: &str = "stub keymap module failure";
pub const BINDGEN_IMPORT_MODULE: &str = "./ergoweb";

const MESSAGE_OFFSET: i32 = 16;
const ALLOCATION_ALIGNMENT: i32 = 8;
const PAGE_SHIFT: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubKind {
    /// `svg(cstr) -> cstr` returning a copy of its input
    CString,
    /// `make_svg` setting the target element's markup to its input through host callbacks
    Bindgen,
    /// `make_svg` that always reports an error through `__wbindgen_throw`
    Throwing,
}

pub fn build_stub_module(kind: StubKind) -> Vec<u8> {
    match kind {
        StubKind::CString => build_cstring_stub(),
        StubKind::Bindgen => build_bindgen_stub(false),
        StubKind::Throwing => build_bindgen_stub(true),
    }
}

const BYTE: MemArg = MemArg {
    offset: 0,
    align: 0,
    memory_index: 0,
};

struct StubBuilder {
    types: TypeSection,
    imports: ImportSection,
    functions: FunctionSection,
    exports: ExportSection,
    code: CodeSection,
    type_count: u32,
    import_count: u32,
    function_count: u32,
}

impl StubBuilder {
    fn new() -> Self {
        StubBuilder {
            types: TypeSection::new(),
            imports: ImportSection::new(),
            functions: FunctionSection::new(),
            exports: ExportSection::new(),
            code: CodeSection::new(),
            type_count: 0,
            import_count: 0,
            function_count: 0,
        }
    }

    fn add_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        self.types.ty().function(params, results);
        self.type_count += 1;
        self.type_count - 1
    }

    /// Imports must all be added before any defined function
    fn add_import(&mut self, name: &str, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let type_index = self.add_type(params, results);
        self.imports
            .import(BINDGEN_IMPORT_MODULE, name, EntityType::Function(type_index));
        self.import_count += 1;
        self.import_count - 1
    }

    fn add_exported_function(
        &mut self,
        name: &str,
        params: Vec<ValType>,
        results: Vec<ValType>,
        body: Function,
    ) -> u32 {
        let type_index = self.add_type(params, results);
        self.functions.function(type_index);
        self.code.function(&body);

        let function_index = self.import_count + self.function_count;
        self.exports.export(name, ExportKind::Func, function_index);
        self.function_count += 1;
        function_index
    }

    /// The index the next defined function will get
    fn next_function_index(&self) -> u32 {
        self.import_count + self.function_count
    }

    fn finish(mut self, data: Option<&[u8]>) -> Vec<u8> {
        let mut memories = MemorySection::new();
        memories.memory(MemoryType {
            minimum: 1,
            maximum: None,
            memory64: false,
            shared: false,
            page_size_log2: None,
        });

        let mut globals = GlobalSection::new();
        globals.global(
            GlobalType {
                val_type: ValType::I32,
                mutable: true,
                shared: false,
            },
            &ConstExpr::i32_const(STUB_HEAP_START),
        );

        self.exports.export("memory", ExportKind::Memory, 0);

        let mut module = Module::new();
        module.section(&self.types);
        if self.import_count > 0 {
            module.section(&self.imports);
        }
        module.section(&self.functions);
        module.section(&memories);
        module.section(&globals);
        module.section(&self.exports);
        module.section(&self.code);

        if let Some(bytes) = data {
            let mut data_section = DataSection::new();
            data_section.active(
                0,
                &ConstExpr::i32_const(MESSAGE_OFFSET),
                bytes.iter().copied(),
            );
            module.section(&data_section);
        }

        module.finish()
    }
}

fn build_cstring_stub() -> Vec<u8> {
    let mut builder = StubBuilder::new();

    let alloc_index = builder.next_function_index();
    builder.add_exported_function(
        "alloc",
        vec![ValType::I32],
        vec![ValType::I32],
        bump_alloc_function(),
    );
    builder.add_exported_function(
        "dealloc",
        vec![ValType::I32, ValType::I32],
        vec![],
        no_op_function(),
    );
    builder.add_exported_function("dealloc_str", vec![ValType::I32], vec![], no_op_function());
    builder.add_exported_function(
        "svg",
        vec![ValType::I32],
        vec![ValType::I32],
        echo_cstring_function(alloc_index),
    );

    builder.finish(None)
}

fn build_bindgen_stub(throwing: bool) -> Vec<u8> {
    let mut builder = StubBuilder::new();

    let document = builder.add_import(
        "__wbg_static_accessor_document_document",
        vec![],
        vec![ValType::I32],
    );
    let get_element = builder.add_import(
        "__wbg_getElementById_8c4314de7fabbd92",
        vec![ValType::I32, ValType::I32, ValType::I32],
        vec![ValType::I32],
    );
    let set_inner_html = builder.add_import(
        "__wbg_set_inner_html_fc05625f561eb4f2",
        vec![ValType::I32, ValType::I32, ValType::I32],
        vec![],
    );
    let drop_ref = builder.add_import("__wbindgen_object_drop_ref", vec![ValType::I32], vec![]);
    let throw = builder.add_import("__wbindgen_throw", vec![ValType::I32, ValType::I32], vec![]);

    builder.add_exported_function(
        "__wbindgen_malloc",
        vec![ValType::I32],
        vec![ValType::I32],
        bump_alloc_function(),
    );
    builder.add_exported_function(
        "__wbindgen_free",
        vec![ValType::I32, ValType::I32],
        vec![],
        no_op_function(),
    );

    let make_svg = if throwing {
        throwing_function(throw)
    } else {
        set_markup_function(document, get_element, set_inner_html, drop_ref)
    };
    builder.add_exported_function(
        "make_svg",
        vec![ValType::I32, ValType::I32, ValType::I32, ValType::I32],
        vec![],
        make_svg,
    );

    let data = throwing.then_some(STUB_THROW_MESSAGE.as_bytes());
    builder.finish(data)
}

/// (size) -> ptr, growing memory when the heap runs past the end
fn bump_alloc_function() -> Function {
    let mut func = Function::new(vec![
        (1, ValType::I32), // local 1: result (old heap ptr)
        (1, ValType::I32), // local 2: new heap end
    ]);

    func.instruction(&Instruction::GlobalGet(0));
    func.instruction(&Instruction::LocalSet(1));

    // new_end = heap + ((size + 7) & ~7)
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::LocalGet(0));
    func.instruction(&Instruction::I32Const(ALLOCATION_ALIGNMENT - 1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::I32Const(!(ALLOCATION_ALIGNMENT - 1)));
    func.instruction(&Instruction::I32And);
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::LocalSet(2));

    // Grow by the missing pages when new_end is past the current size
    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::MemorySize(0));
    func.instruction(&Instruction::I32Const(PAGE_SHIFT));
    func.instruction(&Instruction::I32Shl);
    func.instruction(&Instruction::I32GtU);
    func.instruction(&Instruction::If(BlockType::Empty));
    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::I32Const((1 << PAGE_SHIFT) - 1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::I32Const(PAGE_SHIFT));
    func.instruction(&Instruction::I32ShrU);
    func.instruction(&Instruction::MemorySize(0));
    func.instruction(&Instruction::I32Sub);
    func.instruction(&Instruction::MemoryGrow(0));
    func.instruction(&Instruction::I32Const(-1));
    func.instruction(&Instruction::I32Eq);
    func.instruction(&Instruction::If(BlockType::Empty));
    func.instruction(&Instruction::Unreachable);
    func.instruction(&Instruction::End);
    func.instruction(&Instruction::End);

    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::GlobalSet(0));

    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::End);
    func
}

fn no_op_function() -> Function {
    let mut func = Function::new(vec![]);
    func.instruction(&Instruction::End);
    func
}

/// (cptr) -> cptr, a freshly allocated copy of the nul-terminated input
fn echo_cstring_function(alloc_index: u32) -> Function {
    let mut func = Function::new(vec![
        (1, ValType::I32), // local 1: len
        (1, ValType::I32), // local 2: out
        (1, ValType::I32), // local 3: i
    ]);

    // while input[len] != 0 { len += 1 }
    func.instruction(&Instruction::Block(BlockType::Empty));
    func.instruction(&Instruction::Loop(BlockType::Empty));
    func.instruction(&Instruction::LocalGet(0));
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::I32Load8U(BYTE));
    func.instruction(&Instruction::I32Eqz);
    func.instruction(&Instruction::BrIf(1));
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::I32Const(1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::LocalSet(1));
    func.instruction(&Instruction::Br(0));
    func.instruction(&Instruction::End);
    func.instruction(&Instruction::End);

    // out = alloc(len + 1)
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::I32Const(1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::Call(alloc_index));
    func.instruction(&Instruction::LocalSet(2));

    // Copy len + 1 bytes so the terminator comes along
    func.instruction(&Instruction::Block(BlockType::Empty));
    func.instruction(&Instruction::Loop(BlockType::Empty));
    func.instruction(&Instruction::LocalGet(3));
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::I32GtU);
    func.instruction(&Instruction::BrIf(1));
    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::LocalGet(3));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::LocalGet(0));
    func.instruction(&Instruction::LocalGet(3));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::I32Load8U(BYTE));
    func.instruction(&Instruction::I32Store8(BYTE));
    func.instruction(&Instruction::LocalGet(3));
    func.instruction(&Instruction::I32Const(1));
    func.instruction(&Instruction::I32Add);
    func.instruction(&Instruction::LocalSet(3));
    func.instruction(&Instruction::Br(0));
    func.instruction(&Instruction::End);
    func.instruction(&Instruction::End);

    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::End);
    func
}

/// (ptr, len, id_ptr, id_len): document.getElementById(id).innerHTML = markup
fn set_markup_function(
    document: u32,
    get_element: u32,
    set_inner_html: u32,
    drop_ref: u32,
) -> Function {
    let mut func = Function::new(vec![
        (1, ValType::I32), // local 4: document handle
        (1, ValType::I32), // local 5: element handle
    ]);

    func.instruction(&Instruction::Call(document));
    func.instruction(&Instruction::LocalSet(4));

    func.instruction(&Instruction::LocalGet(4));
    func.instruction(&Instruction::LocalGet(2));
    func.instruction(&Instruction::LocalGet(3));
    func.instruction(&Instruction::Call(get_element));
    func.instruction(&Instruction::LocalSet(5));

    func.instruction(&Instruction::LocalGet(5));
    func.instruction(&Instruction::LocalGet(0));
    func.instruction(&Instruction::LocalGet(1));
    func.instruction(&Instruction::Call(set_inner_html));

    func.instruction(&Instruction::LocalGet(5));
    func.instruction(&Instruction::Call(drop_ref));
    func.instruction(&Instruction::LocalGet(4));
    func.instruction(&Instruction::Call(drop_ref));

    func.instruction(&Instruction::End);
    func
}

fn throwing_function(throw: u32) -> Function {
    let mut func = Function::new(vec![]);

    func.instruction(&Instruction::I32Const(MESSAGE_OFFSET));
    func.instruction(&Instruction::I32Const(STUB_THROW_MESSAGE.len() as i32));
    func.instruction(&Instruction::Call(throw));
    func.instruction(&Instruction::Unreachable);
    func.instruction(&Instruction::End);
    func
}

#[cfg(test)]
#[path = "tests/stub_module_tests.rs"]
mod tests;
