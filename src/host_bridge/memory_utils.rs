// Memory utilities for moving strings in and out of module memory
//
// Every read is bounds checked against the current memory size first.
// Bytes past the end of memory have never been initialised by the module,
// so touching them is a contract violation rather than something to retry.

use crate::host_bridge::bridge_errors::BridgeError;
use crate::host_bridge::guest::LinearMemory;
use crate::return_contract_violation;

// How many bytes are pulled out of memory per step while looking for a nul terminator
const CSTRING_SCAN_CHUNK: u32 = 256;

/// Whether a string written into memory is followed by a zero byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    None,
    Nul,
}

/// Validate that a memory range is accessible
///
/// # Returns
/// * `Ok(())` - Range is valid
/// * `Err(BridgeError)` - Range overflows or reaches past the end of memory
pub fn validate_memory_range(
    memory: &impl LinearMemory,
    ptr: u32,
    len: u32,
) -> Result<(), BridgeError> {
    if len == 0 {
        return Ok(());
    }

    let Some(end_ptr) = ptr.checked_add(len) else {
        return_contract_violation!(format!("Memory range overflow: ptr={ptr}, len={len}"), {
            Pointer => ptr,
            Length => len,
        });
    };

    let memory_size = memory.size_bytes();
    if end_ptr as u64 > memory_size {
        return_contract_violation!(
            format!(
                "Tried to read undefined memory: {ptr}..{end_ptr}, memory size is {memory_size}"
            ),
            {
                Pointer => ptr,
                Length => len,
                MemorySize => memory_size,
            }
        );
    }

    Ok(())
}

/// Read a string from module memory using pointer and length
///
/// # Returns
/// * `Ok(String)` - The decoded UTF-8 string
/// * `Err(BridgeError)` - If the range is out of bounds or the bytes are not UTF-8
pub fn read_string_from_memory(
    memory: &impl LinearMemory,
    ptr: u32,
    len: u32,
) -> Result<String, BridgeError> {
    if len == 0 {
        return Ok(String::new());
    }

    validate_memory_range(memory, ptr, len)?;

    let mut bytes = vec![0u8; len as usize];
    memory.read_bytes(ptr, &mut bytes)?;

    decode_utf8(bytes, ptr)
}

/// Read a nul-terminated string from module memory
///
/// Scans forward from `ptr` until a zero byte. Running off the end of memory
/// before the terminator is found is a contract violation.
///
/// # Returns
/// * `Ok(String)` - The decoded UTF-8 string (without the terminator)
pub fn read_cstring_from_memory(
    memory: &impl LinearMemory,
    ptr: u32,
) -> Result<String, BridgeError> {
    let memory_size = memory.size_bytes();
    let mut collected: Vec<u8> = Vec::new();
    let mut cursor = ptr as u64;

    loop {
        if cursor >= memory_size {
            return_contract_violation!(
                format!(
                    "Tried to read undefined memory at {cursor} while looking for the end of the string at {ptr}"
                ),
                {
                    Pointer => ptr,
                    MemorySize => memory_size,
                }
            );
        }

        let chunk_len = (memory_size - cursor).min(CSTRING_SCAN_CHUNK as u64) as usize;
        let mut chunk = vec![0u8; chunk_len];
        memory.read_bytes(cursor as u32, &mut chunk)?;

        if let Some(nul_index) = chunk.iter().position(|byte| *byte == 0) {
            collected.extend_from_slice(&chunk[..nul_index]);
            break;
        }

        collected.extend_from_slice(&chunk);
        cursor += chunk_len as u64;
    }

    decode_utf8(collected, ptr)
}

/// Write a string into module memory at the specified location
///
/// # Returns
/// * `Ok(u32)` - Number of bytes written (including the terminator when there is one)
pub fn write_string_to_memory(
    memory: &mut impl LinearMemory,
    ptr: u32,
    data: &str,
    terminator: Terminator,
) -> Result<u32, BridgeError> {
    let mut bytes = data.as_bytes().to_vec();
    if terminator == Terminator::Nul {
        bytes.push(0);
    }

    let len = bytes.len() as u32;
    if len == 0 {
        return Ok(0);
    }

    validate_memory_range(memory, ptr, len)?;
    memory.write_bytes(ptr, &bytes)?;

    Ok(len)
}

fn decode_utf8(bytes: Vec<u8>, ptr: u32) -> Result<String, BridgeError> {
    String::from_utf8(bytes).map_err(|e| {
        BridgeError::contract_violation(format!(
            "Invalid UTF-8 string in module memory at {ptr}: {e}"
        ))
        .with_metadata(
            crate::host_bridge::bridge_errors::ErrorMetaDataKey::Pointer,
            ptr,
        )
    })
}

#[cfg(test)]
#[path = "tests/memory_utils_tests.rs"]
mod tests;
