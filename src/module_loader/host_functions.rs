use serde::Serialize;
use wasmer::Type;

/// Callbacks the host can provide to a keymap module.
///
/// wasm-bindgen names its imports after the shim it generated, adding a hash to anything that
/// wraps a method (`__wbg_getElementById_8c4314de7fabbd92`), so imports are matched on the
/// stem with that suffix stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HostFunctionId {
    DocumentAccessor,
    GetElementById,
    SetInnerHtml,
    ObjectDropRef,
    ObjectCloneRef,
    Throw,
}

#[derive(Debug, Clone)]
pub struct HostFunctionDef {
    pub id: HostFunctionId,
    /// Import name without any hash suffix
    pub import_stem: &'static str,
    pub parameters: &'static [Type],
    pub returns: &'static [Type],
    pub description: &'static str,
}

const I32: Type = Type::I32;

static HOST_FUNCTIONS: [HostFunctionDef; 6] = [
    HostFunctionDef {
        id: HostFunctionId::DocumentAccessor,
        import_stem: "__wbg_static_accessor_document_document",
        parameters: &[],
        returns: &[I32],
        description: "Returns a new handle to the page document",
    },
    HostFunctionDef {
        id: HostFunctionId::GetElementById,
        import_stem: "__wbg_getElementById",
        parameters: &[I32, I32, I32],
        returns: &[I32],
        description: "document.getElementById(ptr, len), null when the element is absent",
    },
    HostFunctionDef {
        id: HostFunctionId::SetInnerHtml,
        import_stem: "__wbg_set_inner_html",
        parameters: &[I32, I32, I32],
        returns: &[],
        description: "element.innerHTML = string(ptr, len)",
    },
    HostFunctionDef {
        id: HostFunctionId::ObjectDropRef,
        import_stem: "__wbindgen_object_drop_ref",
        parameters: &[I32],
        returns: &[],
        description: "Drops one reference to a handle",
    },
    HostFunctionDef {
        id: HostFunctionId::ObjectCloneRef,
        import_stem: "__wbindgen_object_clone_ref",
        parameters: &[I32],
        returns: &[I32],
        description: "Takes another reference to a handle",
    },
    HostFunctionDef {
        id: HostFunctionId::Throw,
        import_stem: "__wbindgen_throw",
        parameters: &[I32, I32],
        returns: &[],
        description: "Aborts the current call with the message at (ptr, len)",
    },
];

pub fn host_functions() -> &'static [HostFunctionDef] {
    &HOST_FUNCTIONS
}

/// Remove a trailing `_<16 hex digits>` added by wasm-bindgen
pub fn strip_bindgen_hash(import_name: &str) -> &str {
    let Some((stem, suffix)) = import_name.rsplit_once('_') else {
        return import_name;
    };

    if suffix.len() == 16 && suffix.bytes().all(|b| b.is_ascii_hexdigit()) {
        stem
    } else {
        import_name
    }
}

pub fn resolve_import(import_name: &str) -> Option<&'static HostFunctionDef> {
    let stem = strip_bindgen_hash(import_name);
    HOST_FUNCTIONS.iter().find(|def| def.import_stem == stem)
}

impl HostFunctionDef {
    pub fn matches_signature(&self, parameters: &[Type], returns: &[Type]) -> bool {
        self.parameters == parameters && self.returns == returns
    }

    pub fn signature_string(&self) -> String {
        format!("{:?} -> {:?}", self.parameters, self.returns)
    }
}

#[cfg(test)]
#[path = "tests/host_functions_tests.rs"]
mod tests;
