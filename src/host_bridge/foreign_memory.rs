//! Foreign memory bridge between host strings and module linear memory.
//!
//! Strings the host passes into the module are allocated through the module's own allocator and
//! tracked in a ledger until they are released. Each allocation is handed out as an owning
//! [`ForeignString`] that must be given back to [`ForeignMemoryBridge::release`] exactly once.
//! Strings the module hands back are either borrowed spans (read only) or nul-terminated buffers
//! the host consumes and frees through `dealloc_str`.

use crate::host_bridge::bridge_errors::{BridgeError, ErrorMetaDataKey};
use crate::host_bridge::guest::Guest;
use crate::host_bridge::memory_utils::{
    Terminator, read_cstring_from_memory, read_string_from_memory, write_string_to_memory,
};
use crate::{bridge_log, return_contract_violation};
use rustc_hash::FxHashMap;

/// A caller-owned allocation inside module memory that holds a UTF-8 string.
///
/// Callee-owned strings never get one of these: they are read and freed in a single
/// [`ForeignMemoryBridge::take_cstring`] step.
#[must_use = "foreign strings must be released back to the bridge"]
#[derive(Debug, PartialEq, Eq)]
pub struct ForeignString {
    ptr: u32,
    len: u32,
    capacity: u32,
    terminator: Terminator,
}

impl ForeignString {
    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    /// Length of the string in bytes, without the terminator
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes reserved by the allocation
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    pub strings_written: u64,
    pub strings_released: u64,
    pub strings_consumed: u64,
}

#[derive(Debug, Default)]
pub struct ForeignMemoryBridge {
    // ptr -> capacity of every caller-owned allocation that is still live
    live: FxHashMap<u32, u32>,
    stats: BridgeStats,
}

impl ForeignMemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `text`, allocate `len + 1` bytes inside the module and copy it in.
    ///
    /// The trailing zero is only written for [`Terminator::Nul`], but the extra byte is always
    /// reserved so both kinds of string free with the same size.
    pub fn write_string(
        &mut self,
        guest: &mut impl Guest,
        text: &str,
        terminator: Terminator,
    ) -> Result<ForeignString, BridgeError> {
        let Ok(len) = u32::try_from(text.len()) else {
            return_contract_violation!(format!(
                "String of {} bytes does not fit in 32-bit module memory",
                text.len()
            ));
        };
        let capacity = len + 1;
        let ptr = guest.alloc(capacity)?;

        if self.live.contains_key(&ptr) {
            return_contract_violation!(
                format!("Module allocator returned pointer {ptr} which is still in use"),
                { Pointer => ptr }
            );
        }

        if let Err(error) = write_string_to_memory(guest, ptr, text, terminator) {
            // The allocation is unusable, hand it straight back
            guest.dealloc(ptr, capacity)?;
            return Err(error);
        }

        self.live.insert(ptr, capacity);
        self.stats.strings_written += 1;
        bridge_log!(Cyan "Wrote string at ", ptr, " (", len, " bytes)");

        Ok(ForeignString {
            ptr,
            len,
            capacity,
            terminator,
        })
    }

    /// Free a string previously created by [`Self::write_string`]
    pub fn release(
        &mut self,
        guest: &mut impl Guest,
        string: ForeignString,
    ) -> Result<(), BridgeError> {
        match self.live.remove(&string.ptr) {
            Some(capacity) if capacity == string.capacity => {}
            Some(capacity) => {
                return_contract_violation!(
                    format!(
                        "Releasing pointer {} with capacity {} but it was allocated with {}",
                        string.ptr, string.capacity, capacity
                    ),
                    { Pointer => string.ptr, Length => string.capacity }
                );
            }
            None => {
                return_contract_violation!(
                    format!("Pointer {} was already released", string.ptr),
                    { Pointer => string.ptr }
                );
            }
        }

        guest.dealloc(string.ptr, string.capacity)?;
        self.stats.strings_released += 1;
        bridge_log!(Cyan "Released string at ", string.ptr);
        Ok(())
    }

    /// Decode a borrowed span of module memory. Nothing is freed.
    pub fn read_string(
        &self,
        guest: &impl Guest,
        ptr: u32,
        len: u32,
    ) -> Result<String, BridgeError> {
        read_string_from_memory(guest, ptr, len)
    }

    /// Decode a nul-terminated string returned by the module and free it with `dealloc_str`.
    ///
    /// The pointer must not be used again afterwards.
    pub fn take_cstring(&mut self, guest: &mut impl Guest, ptr: u32) -> Result<String, BridgeError> {
        if self.live.contains_key(&ptr) {
            return_contract_violation!(
                format!("Module returned pointer {ptr} which the host still owns"),
                { Pointer => ptr }
            );
        }

        let text = read_cstring_from_memory(&*guest, ptr)?;
        guest
            .dealloc_str(ptr)
            .map_err(|e| e.with_metadata(ErrorMetaDataKey::Pointer, ptr))?;

        self.stats.strings_consumed += 1;
        bridge_log!(Cyan "Consumed module string at ", ptr, " (", text.len(), " bytes)");
        Ok(text)
    }

    /// Number of caller-owned strings that have not been released yet
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }
}

#[cfg(test)]
#[path = "tests/foreign_memory_tests.rs"]
mod tests;
