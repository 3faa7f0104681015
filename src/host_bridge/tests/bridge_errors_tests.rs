//! Tests for error construction, metadata and display labels.

use super::{BridgeError, ErrorMetaDataKey, ErrorType, error_type_to_str};
use std::path::Path;

fn read_past_end() -> Result<(), BridgeError> {
    let ptr = 70_000u32;
    crate::return_contract_violation!("Tried to read undef mem", {
        Pointer => ptr,
        MemorySize => 65_536,
    });
}

#[test]
fn missing_element_is_a_config_error_with_the_element_id() {
    let error = BridgeError::missing_element("layer0");
    assert!(error.is_config_error());
    assert!(!error.is_contract_violation());
    assert_eq!(error.metadata(ErrorMetaDataKey::ElementId), Some("layer0"));
    assert!(error.msg.contains("layer0"));
}

#[test]
fn contract_violation_macro_attaches_metadata() {
    let error = read_past_end().expect_err("macro should return an error");
    assert_eq!(error.error_type, ErrorType::ContractViolation);
    assert_eq!(error.metadata(ErrorMetaDataKey::Pointer), Some("70000"));
    assert_eq!(error.metadata(ErrorMetaDataKey::MemorySize), Some("65536"));
}

#[test]
fn display_prefixes_the_error_label() {
    let error = BridgeError::network_error("http://example.com/km.txt", "connection refused");
    assert_eq!(
        error.to_string(),
        format!("[{}] connection refused", error_type_to_str(&ErrorType::Network))
    );
    assert_eq!(
        error.metadata(ErrorMetaDataKey::Url),
        Some("http://example.com/km.txt")
    );
}

#[test]
fn file_errors_record_the_path() {
    let error = BridgeError::file_error(Path::new("keymaps/km.txt"), "not found");
    assert_eq!(error.error_type, ErrorType::File);
    assert_eq!(error.metadata(ErrorMetaDataKey::Path), Some("keymaps/km.txt"));

    let retyped = error.with_error_type(ErrorType::DevServer);
    assert_eq!(retyped.error_type, ErrorType::DevServer);
}
