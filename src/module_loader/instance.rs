//! A running keymap module and the host state its callbacks operate on.

use crate::dom::page::Page;
use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use crate::host_bridge::foreign_memory::{ForeignMemoryBridge, ForeignString};
use crate::host_bridge::guest::{Guest, LinearMemory};
use crate::host_bridge::handle_table::{Handle, HandleTable, HostValue};
use crate::host_bridge::memory_utils::{Terminator, read_string_from_memory};
use crate::module_loader::contract::{EntryAbi, ModuleContract, validate_module_bytes};
use crate::module_loader::fetch::Fetcher;
use crate::module_loader::host_functions::{HostFunctionId, resolve_import};
use crate::{host_call_log, return_contract_violation, timer_log};
use std::time::Instant;
use wasmer::{
    ExternType, Function, FunctionEnv, FunctionEnvMut, Imports, Instance, Memory, Module,
    RuntimeError, Store, TypedFunction,
};

/// Everything the host callbacks can reach while the module runs
pub struct HostEnv {
    memory: Option<Memory>,
    handles: HandleTable,
    document: Page,
    // Message passed to __wbindgen_throw during the current call
    thrown: Option<String>,
    // Host side failure that aborted the current call
    host_error: Option<BridgeError>,
}

impl HostEnv {
    fn new(document: Page) -> Self {
        HostEnv {
            memory: None,
            handles: HandleTable::new(),
            document,
            thrown: None,
            host_error: None,
        }
    }
}

struct Allocator {
    alloc: TypedFunction<i32, i32>,
    dealloc: TypedFunction<(i32, i32), ()>,
    dealloc_str: Option<TypedFunction<i32, ()>>,
}

enum Entry {
    CString(TypedFunction<i32, i32>),
    Bindgen(TypedFunction<(i32, i32, i32, i32), ()>),
}

struct GuestExports {
    allocator: Allocator,
    entry: Entry,
}

impl GuestExports {
    fn from_instance(
        instance: &Instance,
        store: &Store,
        contract: &ModuleContract,
    ) -> Result<Self, BridgeError> {
        let abi = contract.abi;

        let alloc = typed_export(instance, store, abi.alloc_export())?;
        let dealloc = typed_export(instance, store, abi.dealloc_export())?;
        let (dealloc_str, entry) = match abi {
            EntryAbi::CString => (
                Some(typed_export(instance, store, "dealloc_str")?),
                Entry::CString(typed_export(instance, store, &contract.entry)?),
            ),
            EntryAbi::Bindgen => (
                None,
                Entry::Bindgen(typed_export(instance, store, &contract.entry)?),
            ),
        };

        Ok(GuestExports {
            allocator: Allocator {
                alloc,
                dealloc,
                dealloc_str,
            },
            entry,
        })
    }
}

fn typed_export<Args, Rets>(
    instance: &Instance,
    store: &Store,
    name: &str,
) -> Result<TypedFunction<Args, Rets>, BridgeError>
where
    Args: wasmer::WasmTypeList,
    Rets: wasmer::WasmTypeList,
{
    instance
        .exports
        .get_typed_function::<Args, Rets>(store, name)
        .map_err(|e| {
            BridgeError::module_error(format!("Export '{name}' is not usable: {e}"))
                .with_metadata(ErrorMetaDataKey::ExportName, name)
        })
}

/// The bridge's view of the module while the client is borrowed for a single call
struct WasmerGuest<'a> {
    store: &'a mut Store,
    memory: &'a Memory,
    allocator: &'a Allocator,
}

impl LinearMemory for WasmerGuest<'_> {
    fn size_bytes(&self) -> u64 {
        self.memory.view(&*self.store).data_size()
    }

    fn read_bytes(&self, offset: u32, buf: &mut [u8]) -> Result<(), BridgeError> {
        let view = self.memory.view(&*self.store);
        LinearMemory::read_bytes(&view, offset, buf)
    }

    fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), BridgeError> {
        let mut view = self.memory.view(&*self.store);
        LinearMemory::write_bytes(&mut view, offset, bytes)
    }
}

impl Guest for WasmerGuest<'_> {
    fn alloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        let ptr = self
            .allocator
            .alloc
            .call(&mut *self.store, size as i32)
            .map_err(|e| allocator_trap("alloc", e))?;
        Ok(ptr as u32)
    }

    fn dealloc(&mut self, ptr: u32, size: u32) -> Result<(), BridgeError> {
        self.allocator
            .dealloc
            .call(&mut *self.store, ptr as i32, size as i32)
            .map_err(|e| allocator_trap("dealloc", e).with_metadata(ErrorMetaDataKey::Pointer, ptr))
    }

    fn dealloc_str(&mut self, ptr: u32) -> Result<(), BridgeError> {
        let Some(dealloc_str) = &self.allocator.dealloc_str else {
            return_contract_violation!(
                "Module returned an owned string but exports no dealloc_str",
                { Pointer => ptr, ExportName => "dealloc_str" }
            );
        };

        dealloc_str
            .call(&mut *self.store, ptr as i32)
            .map_err(|e| allocator_trap("dealloc_str", e).with_metadata(ErrorMetaDataKey::Pointer, ptr))
    }
}

fn allocator_trap(export: &str, trap: RuntimeError) -> BridgeError {
    BridgeError::module_error(format!("Module trapped in '{export}': {trap}"))
        .with_metadata(ErrorMetaDataKey::ExportName, export)
}

/// A compiled keymap module instantiated against the viewer page
pub struct KeymapClient {
    store: Store,
    // Keeps the exports alive
    _instance: Instance,
    env: FunctionEnv<HostEnv>,
    memory: Memory,
    exports: GuestExports,
    bridge: ForeignMemoryBridge,
    contract: ModuleContract,
}

impl KeymapClient {
    /// Validate, compile and instantiate a module, wiring its imports to the host callbacks
    pub fn instantiate(
        bytes: &[u8],
        entry_override: Option<&str>,
        document: Page,
    ) -> Result<Self, BridgeError> {
        let start = Instant::now();
        validate_module_bytes(bytes)?;

        let mut store = Store::default();
        let module = Module::new(&store, bytes).map_err(|e| {
            BridgeError::module_error(format!("Failed to compile keymap module: {e}"))
        })?;
        let contract = ModuleContract::read(&module, bytes, entry_override)?;

        let env = FunctionEnv::new(&mut store, HostEnv::new(document));
        let imports = build_imports(&mut store, &env, &module)?;

        let instance = Instance::new(&mut store, &module, &imports).map_err(|e| {
            BridgeError::module_error(format!("Failed to instantiate keymap module: {e}"))
        })?;

        let memory = instance
            .exports
            .get_memory("memory")
            .map_err(|e| {
                BridgeError::module_error(format!("Module memory is not usable: {e}"))
                    .with_metadata(ErrorMetaDataKey::ExportName, "memory")
            })?
            .clone();
        env.as_mut(&mut store).memory = Some(memory.clone());

        let exports = GuestExports::from_instance(&instance, &store, &contract)?;
        timer_log!(start, "Keymap module instantiated in: ");

        Ok(KeymapClient {
            store,
            _instance: instance,
            env,
            memory,
            exports,
            bridge: ForeignMemoryBridge::new(),
            contract,
        })
    }

    /// Fetch a module binary from a path or URL and instantiate it
    pub fn load(
        fetcher: &impl Fetcher,
        location: &str,
        entry_override: Option<&str>,
        document: Page,
    ) -> Result<Self, BridgeError> {
        let bytes = fetcher.fetch_bytes(location)?;
        Self::instantiate(&bytes, entry_override, document)
    }

    pub fn contract(&self) -> &ModuleContract {
        &self.contract
    }

    pub fn abi(&self) -> EntryAbi {
        self.contract.abi
    }

    pub fn document(&self) -> &Page {
        &self.env.as_ref(&self.store).document
    }

    pub fn document_mut(&mut self) -> &mut Page {
        &mut self.env.as_mut(&mut self.store).document
    }

    /// Host strings still allocated inside the module
    pub fn outstanding_allocations(&self) -> usize {
        self.bridge.outstanding()
    }

    /// Host values the module still holds handles to
    pub fn live_handles(&self) -> usize {
        self.env.as_ref(&self.store).handles.live_count()
    }

    /// Run the C-string entry point and return the markup it produced
    pub fn render_markup(&mut self, text: &str) -> Result<String, BridgeError> {
        let KeymapClient {
            store,
            env,
            memory,
            exports,
            bridge,
            contract,
            ..
        } = self;

        let Entry::CString(svg) = &exports.entry else {
            return Err(BridgeError::module_error(format!(
                "'{}' writes into the page itself, render it into an element instead",
                contract.entry
            ))
            .with_metadata(ErrorMetaDataKey::ExportName, &contract.entry));
        };

        begin_call(store, env);
        let mut guest = WasmerGuest {
            store,
            memory,
            allocator: &exports.allocator,
        };

        let input = bridge.write_string(&mut guest, text, Terminator::Nul)?;
        let called = svg.call(&mut *guest.store, input.ptr() as i32);
        let released = bridge.release(&mut guest, input);

        let output = match called {
            Ok(output) => output,
            Err(trap) => return Err(trap_to_error(guest.store, env, &contract.entry, trap)),
        };

        if output == 0 {
            released?;
            return_contract_violation!(
                format!("'{}' returned a null pointer", contract.entry),
                { ExportName => &contract.entry }
            );
        }

        // The module's string is freed even when handing back the input failed
        let markup = bridge.take_cstring(&mut guest, output as u32);
        released?;
        markup
    }

    /// Render `text` and put the resulting markup inside the element with id `target_id`
    pub fn render_into(&mut self, text: &str, target_id: &str) -> Result<(), BridgeError> {
        if !self.document().contains(target_id) {
            return Err(BridgeError::missing_element(target_id));
        }

        if matches!(self.exports.entry, Entry::CString(_)) {
            let markup = self.render_markup(text)?;
            return self.document_mut().set_inner_html(target_id, &markup);
        }

        let KeymapClient {
            store,
            env,
            memory,
            exports,
            bridge,
            contract,
            ..
        } = self;

        // C-string modules returned above
        let Entry::Bindgen(make_svg) = &exports.entry else {
            return Ok(());
        };

        begin_call(store, env);
        let mut guest = WasmerGuest {
            store,
            memory,
            allocator: &exports.allocator,
        };

        let contents = bridge.write_string(&mut guest, text, Terminator::None)?;
        let id = match bridge.write_string(&mut guest, target_id, Terminator::None) {
            Ok(id) => id,
            Err(error) => {
                bridge.release(&mut guest, contents)?;
                return Err(error);
            }
        };

        let called = make_svg.call(
            &mut *guest.store,
            contents.ptr() as i32,
            contents.len() as i32,
            id.ptr() as i32,
            id.len() as i32,
        );
        let released = release_all(bridge, &mut guest, [contents, id]);

        if let Err(trap) = called {
            return Err(trap_to_error(guest.store, env, &contract.entry, trap));
        }
        released
    }
}

fn release_all<const N: usize>(
    bridge: &mut ForeignMemoryBridge,
    guest: &mut WasmerGuest<'_>,
    strings: [ForeignString; N],
) -> Result<(), BridgeError> {
    let mut first_error = None;
    for string in strings {
        if let Err(error) = bridge.release(guest, string) {
            first_error.get_or_insert(error);
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn begin_call(store: &mut Store, env: &FunctionEnv<HostEnv>) {
    let state = env.as_mut(store);
    state.thrown = None;
    state.host_error = None;
    state.handles.clear_stack();
}

/// Work out why a call into the module failed.
///
/// A host callback that failed left its error behind, `__wbindgen_throw` left the module's
/// message behind, anything else is a plain trap.
fn trap_to_error(
    store: &mut Store,
    env: &FunctionEnv<HostEnv>,
    export: &str,
    trap: RuntimeError,
) -> BridgeError {
    let state = env.as_mut(store);
    state.handles.clear_stack();

    if let Some(error) = state.host_error.take() {
        return error;
    }

    if let Some(message) = state.thrown.take() {
        return BridgeError::module_reported(message)
            .with_metadata(ErrorMetaDataKey::ExportName, export);
    }

    BridgeError::module_error(format!("Module trapped in '{export}': {trap}"))
        .with_metadata(ErrorMetaDataKey::ExportName, export)
}

fn build_imports(
    store: &mut Store,
    env: &FunctionEnv<HostEnv>,
    module: &Module,
) -> Result<Imports, BridgeError> {
    let mut imports = Imports::new();

    for import in module.imports() {
        let qualified = format!("{}.{}", import.module(), import.name());

        let ExternType::Function(ty) = import.ty() else {
            return Err(BridgeError::module_error(format!(
                "Module imports '{qualified}', the host only provides functions"
            ))
            .with_metadata(ErrorMetaDataKey::ImportName, &qualified));
        };

        let Some(def) = resolve_import(import.name()) else {
            return Err(BridgeError::module_error(format!(
                "Module imports '{qualified}', which the host does not provide"
            ))
            .with_metadata(ErrorMetaDataKey::ImportName, &qualified));
        };

        if !def.matches_signature(ty.params(), ty.results()) {
            return Err(BridgeError::module_error(format!(
                "Import '{qualified}' has signature {:?} -> {:?}, the host provides {}",
                ty.params(),
                ty.results(),
                def.signature_string()
            ))
            .with_metadata(ErrorMetaDataKey::ImportName, &qualified));
        }

        imports.define(import.module(), import.name(), host_function(store, env, def.id));
    }

    Ok(imports)
}

fn host_function(store: &mut Store, env: &FunctionEnv<HostEnv>, id: HostFunctionId) -> Function {
    match id {
        HostFunctionId::DocumentAccessor => {
            Function::new_typed_with_env(store, env, document_accessor)
        }
        HostFunctionId::GetElementById => {
            Function::new_typed_with_env(store, env, get_element_by_id)
        }
        HostFunctionId::SetInnerHtml => Function::new_typed_with_env(store, env, set_inner_html),
        HostFunctionId::ObjectDropRef => Function::new_typed_with_env(store, env, object_drop_ref),
        HostFunctionId::ObjectCloneRef => {
            Function::new_typed_with_env(store, env, object_clone_ref)
        }
        HostFunctionId::Throw => Function::new_typed_with_env(store, env, throw),
    }
}

// HOST CALLBACKS

fn document_accessor(mut env: FunctionEnvMut<HostEnv>) -> i32 {
    let handle = env.data_mut().handles.add(HostValue::Document);
    host_call_log!(Cyan "document -> ", handle.raw());
    handle.to_abi()
}

fn get_element_by_id(
    mut env: FunctionEnvMut<HostEnv>,
    document: i32,
    ptr: i32,
    len: i32,
) -> Result<i32, RuntimeError> {
    let result = lookup_element(&mut env, document, ptr, len);
    into_trap(&mut env, result)
}

fn lookup_element(
    env: &mut FunctionEnvMut<HostEnv>,
    document: i32,
    ptr: i32,
    len: i32,
) -> Result<i32, BridgeError> {
    match env.data().handles.resolve(Handle::from_abi(document))? {
        HostValue::Document => {}
        other => {
            return_contract_violation!(
                format!("getElementById called on {other:?} instead of the document"),
                { Handle => document }
            );
        }
    }

    let id = read_guest_string(env, ptr, len)?;
    let state = env.data_mut();
    let value = if state.document.contains(&id) {
        HostValue::Element(id)
    } else {
        HostValue::Null
    };

    let handle = state.handles.add(value);
    host_call_log!(Cyan "getElementById -> ", handle.raw());
    Ok(handle.to_abi())
}

fn set_inner_html(
    mut env: FunctionEnvMut<HostEnv>,
    element: i32,
    ptr: i32,
    len: i32,
) -> Result<(), RuntimeError> {
    let result = write_inner_html(&mut env, element, ptr, len);
    into_trap(&mut env, result)
}

fn write_inner_html(
    env: &mut FunctionEnvMut<HostEnv>,
    element: i32,
    ptr: i32,
    len: i32,
) -> Result<(), BridgeError> {
    let target = match env.data().handles.resolve(Handle::from_abi(element))? {
        HostValue::Element(id) => id.clone(),
        HostValue::Null => {
            return Err(BridgeError::config_error(
                "Module set innerHTML on an element that is not in the page",
            )
            .with_metadata(ErrorMetaDataKey::Handle, element));
        }
        other => {
            return_contract_violation!(
                format!("innerHTML set on {other:?}, which is not an element"),
                { Handle => element }
            );
        }
    };

    let markup = read_guest_string(env, ptr, len)?;
    host_call_log!(Cyan "set innerHTML of #", target, " (", markup.len(), " bytes)");
    env.data_mut().document.set_inner_html(&target, &markup)
}

fn object_drop_ref(mut env: FunctionEnvMut<HostEnv>, handle: i32) -> Result<(), RuntimeError> {
    let result = env.data_mut().handles.release(Handle::from_abi(handle));
    into_trap(&mut env, result)
}

fn object_clone_ref(mut env: FunctionEnvMut<HostEnv>, handle: i32) -> Result<i32, RuntimeError> {
    let result = env
        .data_mut()
        .handles
        .clone_ref(Handle::from_abi(handle))
        .map(Handle::to_abi);
    into_trap(&mut env, result)
}

fn throw(mut env: FunctionEnvMut<HostEnv>, ptr: i32, len: i32) -> Result<(), RuntimeError> {
    let message = read_guest_string(&mut env, ptr, len);
    let message = into_trap(&mut env, message)?;

    host_call_log!(Red "Module threw: ", message);
    env.data_mut().thrown = Some(message.clone());
    Err(RuntimeError::new(message))
}

fn read_guest_string(
    env: &mut FunctionEnvMut<HostEnv>,
    ptr: i32,
    len: i32,
) -> Result<String, BridgeError> {
    let Some(memory) = env.data().memory.clone() else {
        return Err(BridgeError::contract_violation(
            "Module called the host before its memory was available",
        ));
    };

    let view = memory.view(&*env);
    read_string_from_memory(&view, ptr as u32, len as u32)
}

fn into_trap<T>(
    env: &mut FunctionEnvMut<HostEnv>,
    result: Result<T, BridgeError>,
) -> Result<T, RuntimeError> {
    result.map_err(|error| {
        let trap = RuntimeError::new(error.msg.clone());
        env.data_mut().host_error = Some(error);
        trap
    })
}

#[cfg(test)]
#[path = "tests/instance_tests.rs"]
mod tests;
