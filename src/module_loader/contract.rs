//! What a compiled keymap module exports and imports, and which entry convention it follows.

use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use crate::module_loader::host_functions::{HostFunctionId, resolve_import};
use serde::Serialize;
use wasmer::{ExternType, Module, Store};
use wasmparser::{Parser, Payload};

/// The calling convention of the render entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryAbi {
    /// `svg(cstr) -> cstr` with `alloc`, `dealloc` and `dealloc_str` exports
    CString,
    /// `make_svg(ptr, len, id_ptr, id_len)`, the module writes into the page itself
    Bindgen,
}

impl EntryAbi {
    pub fn default_entry(self) -> &'static str {
        match self {
            EntryAbi::CString => "svg",
            EntryAbi::Bindgen => "make_svg",
        }
    }

    pub fn alloc_export(self) -> &'static str {
        match self {
            EntryAbi::CString => "alloc",
            EntryAbi::Bindgen => "__wbindgen_malloc",
        }
    }

    pub fn dealloc_export(self) -> &'static str {
        match self {
            EntryAbi::CString => "dealloc",
            EntryAbi::Bindgen => "__wbindgen_free",
        }
    }

    fn required_exports(self) -> &'static [&'static str] {
        match self {
            EntryAbi::CString => &["memory", "alloc", "dealloc", "dealloc_str"],
            EntryAbi::Bindgen => &["memory", "__wbindgen_malloc", "__wbindgen_free"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportInfo {
    pub name: String,
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportInfo {
    pub module: String,
    pub name: String,
    pub kind: &'static str,
    /// `None` when the host has no callback for this import
    pub host_function: Option<HostFunctionId>,
    pub description: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomSectionInfo {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleContract {
    pub abi: EntryAbi,
    pub entry: String,
    pub exports: Vec<ExportInfo>,
    pub imports: Vec<ImportInfo>,
    pub custom_sections: Vec<CustomSectionInfo>,
}

impl ModuleContract {
    /// Work out the contract of a compiled module.
    ///
    /// `entry_override` replaces the default render export name of the detected convention.
    pub fn read(
        module: &Module,
        bytes: &[u8],
        entry_override: Option<&str>,
    ) -> Result<Self, BridgeError> {
        let exports: Vec<ExportInfo> = module
            .exports()
            .map(|export| ExportInfo {
                name: export.name().to_string(),
                kind: extern_kind(export.ty()),
            })
            .collect();

        let imports = module
            .imports()
            .map(|import| {
                let host = resolve_import(import.name());
                ImportInfo {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                    kind: extern_kind(import.ty()),
                    host_function: host.map(|def| def.id),
                    description: host.map(|def| def.description),
                }
            })
            .collect();

        let abi = detect_abi(&exports)?;
        let entry = entry_override
            .unwrap_or(abi.default_entry())
            .to_string();

        if !exports
            .iter()
            .any(|export| export.name == entry && export.kind == "function")
        {
            return Err(BridgeError::module_error(format!(
                "Module does not export the render function '{entry}'"
            ))
            .with_metadata(ErrorMetaDataKey::ExportName, &entry));
        }

        Ok(ModuleContract {
            abi,
            entry,
            exports,
            imports,
            custom_sections: custom_sections(bytes)?,
        })
    }

    /// Validate and compile a binary on its own, only to report its contract
    pub fn inspect(bytes: &[u8], entry_override: Option<&str>) -> Result<Self, BridgeError> {
        validate_module_bytes(bytes)?;
        let store = Store::default();
        let module = Module::new(&store, bytes).map_err(|e| {
            BridgeError::module_error(format!("Failed to compile keymap module: {e}"))
        })?;
        Self::read(&module, bytes, entry_override)
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            BridgeError::module_error(format!("Could not serialise the module contract: {e}"))
        })
    }
}

fn detect_abi(exports: &[ExportInfo]) -> Result<EntryAbi, BridgeError> {
    let has = |name: &str| exports.iter().any(|export| export.name == name);

    let abi = if has("__wbindgen_malloc") {
        EntryAbi::Bindgen
    } else {
        EntryAbi::CString
    };

    let missing: Vec<&str> = abi
        .required_exports()
        .iter()
        .copied()
        .filter(|name| !has(name))
        .collect();

    if !missing.is_empty() {
        return Err(BridgeError::module_error(format!(
            "Module is missing required exports: {}",
            missing.join(", ")
        ))
        .with_metadata(ErrorMetaDataKey::ExportName, missing.join(", ")));
    }

    Ok(abi)
}

/// Check the binary before handing it to the compiler
pub fn validate_module_bytes(bytes: &[u8]) -> Result<(), BridgeError> {
    wasmparser::Validator::new()
        .validate_all(bytes)
        .map(|_| ())
        .map_err(|e| BridgeError::module_error(format!("Invalid WebAssembly module: {e}")))
}

pub fn custom_sections(bytes: &[u8]) -> Result<Vec<CustomSectionInfo>, BridgeError> {
    let mut sections = Vec::new();

    for payload in Parser::new(0).parse_all(bytes) {
        let payload = payload
            .map_err(|e| BridgeError::module_error(format!("Invalid WebAssembly module: {e}")))?;

        if let Payload::CustomSection(reader) = payload {
            sections.push(CustomSectionInfo {
                name: reader.name().to_string(),
                size: reader.data().len(),
            });
        }
    }

    Ok(sections)
}

fn extern_kind(ty: &ExternType) -> &'static str {
    match ty {
        ExternType::Function(_) => "function",
        ExternType::Memory(_) => "memory",
        ExternType::Global(_) => "global",
        ExternType::Table(_) => "table",
        #[allow(unreachable_patterns)]
        _ => "other",
    }
}

#[cfg(test)]
#[path = "tests/contract_tests.rs"]
mod tests;
