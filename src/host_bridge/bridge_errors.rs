use saying::say;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

// Every failure the host can surface while loading the module, marshalling
// strings or driving the viewer page.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeError {
    pub msg: String,
    pub error_type: ErrorType,

    // Structured detail about the failure (pointers, element ids, urls)
    pub metadata: HashMap<ErrorMetaDataKey, String>,
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ErrorMetaDataKey {
    ElementId,
    Pointer,
    Length,
    MemorySize,
    Handle,
    ExportName,
    ImportName,
    Url,
    Path,

    // Optional suggestion text
    PrimarySuggestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Missing DOM element or malformed settings
    Config,
    /// The module and the host disagree about memory, handles or ownership
    ContractViolation,
    Network,
    /// The module called back into the host to throw an error message
    ModuleReported,
    /// Validation, compilation, instantiation or a trap inside the module
    Module,
    File,
    DevServer,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::Config => "Configuration Error",
        ErrorType::ContractViolation => "Module Contract Violation",
        ErrorType::Network => "Network Error",
        ErrorType::ModuleReported => "Keymap Module Error",
        ErrorType::Module => "Module Load Error",
        ErrorType::File => "File Error",
        ErrorType::DevServer => "Dev Server Issue",
    }
}

impl BridgeError {
    pub fn new(msg: impl Into<String>, error_type: ErrorType) -> Self {
        BridgeError {
            msg: msg.into(),
            error_type,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: ErrorMetaDataKey, value: impl ToString) -> Self {
        self.metadata.insert(key, value.to_string());
        self
    }

    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = error_type;
        self
    }

    pub fn metadata(&self, key: ErrorMetaDataKey) -> Option<&str> {
        self.metadata.get(&key).map(String::as_str)
    }

    /// A DOM element the page contract requires could not be found
    pub fn missing_element(id: &str) -> Self {
        BridgeError::new(
            format!("Element with id '{id}' does not exist in the page"),
            ErrorType::Config,
        )
        .with_metadata(ErrorMetaDataKey::ElementId, id)
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::Config)
    }

    pub fn contract_violation(msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::ContractViolation)
    }

    pub fn network_error(url: &str, msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::Network).with_metadata(ErrorMetaDataKey::Url, url)
    }

    pub fn module_reported(msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::ModuleReported)
    }

    pub fn module_error(msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::Module)
    }

    pub fn file_error(path: &Path, msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::File)
            .with_metadata(ErrorMetaDataKey::Path, path.display())
    }

    pub fn dev_server_error(msg: impl Into<String>) -> Self {
        BridgeError::new(msg, ErrorType::DevServer)
    }

    pub fn is_contract_violation(&self) -> bool {
        self.error_type == ErrorType::ContractViolation
    }

    pub fn is_config_error(&self) -> bool {
        self.error_type == ErrorType::Config
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", error_type_to_str(&self.error_type), self.msg)
    }
}

impl std::error::Error for BridgeError {}

/// Returns a new ContractViolation error.
///
/// Usage:
/// `return_contract_violation!("Tried to read undef mem", { Pointer => ptr, MemorySize => size })`;
#[macro_export]
macro_rules! return_contract_violation {
    ($msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::host_bridge::bridge_errors::BridgeError::contract_violation($msg)
            $( .with_metadata($crate::host_bridge::bridge_errors::ErrorMetaDataKey::$key, $value) )*
        )
    };
    ($msg:expr) => {
        return Err($crate::host_bridge::bridge_errors::BridgeError::contract_violation($msg))
    };
}

/// Returns a new Config error.
///
/// Usage: `return_config_error!("Malformed settings file", { Path => path.display() })`;
#[macro_export]
macro_rules! return_config_error {
    ($msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::host_bridge::bridge_errors::BridgeError::config_error($msg)
            $( .with_metadata($crate::host_bridge::bridge_errors::ErrorMetaDataKey::$key, $value) )*
        )
    };
    ($msg:expr) => {
        return Err($crate::host_bridge::bridge_errors::BridgeError::config_error($msg))
    };
}

pub fn print_bridge_error(e: &BridgeError) {
    let label = error_type_to_str(&e.error_type);
    match e.error_type {
        ErrorType::ContractViolation | ErrorType::Module => {
            say!(Red label, Red ": ", e.msg);
        }
        ErrorType::Network | ErrorType::File | ErrorType::DevServer => {
            say!(Yellow label, Yellow ": ", e.msg);
        }
        ErrorType::Config | ErrorType::ModuleReported => {
            say!(Dark Magenta label, Dark Magenta ": ", e.msg);
        }
    }

    let mut details: Vec<(&ErrorMetaDataKey, &String)> = e.metadata.iter().collect();
    details.sort_by_key(|(key, _)| format!("{key:?}"));
    for (key, value) in details {
        let key_name = format!("{key:?}");
        say!(Bright Black "  ", key_name, ": ", value);
    }
}

#[cfg(test)]
#[path = "tests/bridge_errors_tests.rs"]
mod tests;
