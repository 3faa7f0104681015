//! The surface of an instantiated keymap module that the bridge relies on.
//!
//! `LinearMemory` is the byte-addressable memory the module exports and `Guest` adds the
//! allocator exports used to move strings across the boundary.

use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use wasmer::MemoryView;

pub trait LinearMemory {
    /// Current size of the memory in bytes. Anything at or past this offset is undefined.
    fn size_bytes(&self) -> u64;

    fn read_bytes(&self, offset: u32, buf: &mut [u8]) -> Result<(), BridgeError>;

    fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), BridgeError>;
}

pub trait Guest: LinearMemory {
    /// Reserve `size` bytes inside the module and return the pointer
    fn alloc(&mut self, size: u32) -> Result<u32, BridgeError>;

    /// Free a buffer previously returned by `alloc`
    fn dealloc(&mut self, ptr: u32, size: u32) -> Result<(), BridgeError>;

    /// Free a nul-terminated string the module handed to the host
    fn dealloc_str(&mut self, ptr: u32) -> Result<(), BridgeError>;
}

impl LinearMemory for MemoryView<'_> {
    fn size_bytes(&self) -> u64 {
        self.data_size()
    }

    fn read_bytes(&self, offset: u32, buf: &mut [u8]) -> Result<(), BridgeError> {
        self.read(offset as u64, buf).map_err(|e| {
            BridgeError::contract_violation(format!(
                "Failed to read from module memory at {offset}: {e}"
            ))
            .with_metadata(ErrorMetaDataKey::Pointer, offset)
            .with_metadata(ErrorMetaDataKey::Length, buf.len())
        })
    }

    fn write_bytes(&mut self, offset: u32, bytes: &[u8]) -> Result<(), BridgeError> {
        self.write(offset as u64, bytes).map_err(|e| {
            BridgeError::contract_violation(format!(
                "Failed to write to module memory at {offset}: {e}"
            ))
            .with_metadata(ErrorMetaDataKey::Pointer, offset)
            .with_metadata(ErrorMetaDataKey::Length, bytes.len())
        })
    }
}
