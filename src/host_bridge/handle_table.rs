//! Integer handles for host values the module refers to.
//!
//! The module cannot hold host references directly, so every value it sees is an `i32`.
//! Even handles address either the permanent singletons (`undefined`, `null`, `true`, `false`)
//! or the reference-counted arena; odd handles address the transient stack used for values that
//! only live for the duration of one call.
//!
//! The singleton table is immutable and separate from the arena, and the arena keeps its free list
//! in vacant slots, so a released slot is the first to be handed out again.

use crate::host_bridge::bridge_errors::BridgeError;
use crate::{handle_log, return_contract_violation};

/// Slab indices below this are reserved for the singletons
pub const RESERVED_SLOTS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    pub const UNDEFINED: Handle = Handle(0);
    pub const NULL: Handle = Handle(2);
    pub const TRUE: Handle = Handle(4);
    pub const FALSE: Handle = Handle(6);

    pub fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    pub fn from_abi(raw: i32) -> Self {
        Handle(raw as u32)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn to_abi(self) -> i32 {
        self.0 as i32
    }

    pub fn is_stack(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn is_singleton(self) -> bool {
        !self.is_stack() && self.index() < RESERVED_SLOTS
    }

    fn index(self) -> u32 {
        self.0 >> 1
    }

    fn slab(index: u32) -> Self {
        Handle(index << 1)
    }

    fn stack(index: u32) -> Self {
        Handle((index << 1) | 1)
    }
}

/// A host value the module can hold a handle to
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Document,
    /// An element of the page, addressed by its id
    Element(String),
}

impl HostValue {
    fn singleton_handle(&self) -> Option<Handle> {
        match self {
            HostValue::Undefined => Some(Handle::UNDEFINED),
            HostValue::Null => Some(Handle::NULL),
            HostValue::Bool(true) => Some(Handle::TRUE),
            HostValue::Bool(false) => Some(Handle::FALSE),
            _ => None,
        }
    }
}

const SINGLETONS: [HostValue; RESERVED_SLOTS as usize] = [
    HostValue::Undefined,
    HostValue::Null,
    HostValue::Bool(true),
    HostValue::Bool(false),
];

#[derive(Debug)]
enum Slot {
    Occupied { value: HostValue, count: u32 },
    Vacant { next_free: Option<u32> },
}

#[derive(Debug, Default)]
pub struct HandleTable {
    // arena[i] is slab index i + RESERVED_SLOTS
    arena: Vec<Slot>,
    free_head: Option<u32>,
    stack: Vec<HostValue>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value and return a new even handle with a count of one.
    ///
    /// Singleton values are never stored, their permanent handle is returned instead.
    pub fn add(&mut self, value: HostValue) -> Handle {
        if let Some(handle) = value.singleton_handle() {
            return handle;
        }

        let arena_index = match self.free_head {
            Some(free_index) => {
                self.free_head = match self.arena[free_index as usize] {
                    Slot::Vacant { next_free } => next_free,
                    // The free list only ever links vacant slots
                    Slot::Occupied { .. } => None,
                };
                self.arena[free_index as usize] = Slot::Occupied { value, count: 1 };
                free_index
            }
            None => {
                self.arena.push(Slot::Occupied { value, count: 1 });
                (self.arena.len() - 1) as u32
            }
        };

        let handle = Handle::slab(arena_index + RESERVED_SLOTS);
        handle_log!(Blue "Added handle ", handle.raw());
        handle
    }

    pub fn resolve(&self, handle: Handle) -> Result<&HostValue, BridgeError> {
        if handle.is_stack() {
            return match self.stack.get(handle.index() as usize) {
                Some(value) => Ok(value),
                None => stale_handle(handle),
            };
        }

        if handle.is_singleton() {
            return Ok(&SINGLETONS[handle.index() as usize]);
        }

        match self.arena.get((handle.index() - RESERVED_SLOTS) as usize) {
            Some(Slot::Occupied { value, .. }) => Ok(value),
            _ => stale_handle(handle),
        }
    }

    /// Take another reference to a slab entry
    pub fn clone_ref(&mut self, handle: Handle) -> Result<Handle, BridgeError> {
        if handle.is_singleton() {
            return Ok(handle);
        }

        if handle.is_stack() {
            // A borrowed value outlives the call once the module keeps it, so it moves to the slab
            let value = self.resolve(handle)?.clone();
            return Ok(self.add(value));
        }

        match self.arena.get_mut((handle.index() - RESERVED_SLOTS) as usize) {
            Some(Slot::Occupied { count, .. }) => {
                *count += 1;
                Ok(handle)
            }
            _ => stale_handle(handle),
        }
    }

    /// Drop one reference. The slot goes back on the free list when the count reaches zero.
    pub fn release(&mut self, handle: Handle) -> Result<(), BridgeError> {
        if handle.is_singleton() {
            return Ok(());
        }

        if handle.is_stack() {
            return_contract_violation!(
                format!("Stack handle {} cannot be released", handle.raw()),
                { Handle => handle.raw() }
            );
        }

        let arena_index = handle.index() - RESERVED_SLOTS;
        let Some(slot) = self.arena.get_mut(arena_index as usize) else {
            return stale_handle(handle);
        };

        match slot {
            Slot::Occupied { count, .. } if *count > 1 => {
                *count -= 1;
            }
            Slot::Occupied { .. } => {
                *slot = Slot::Vacant {
                    next_free: self.free_head,
                };
                self.free_head = Some(arena_index);
                handle_log!(Blue "Reclaimed handle ", handle.raw());
            }
            Slot::Vacant { .. } => return stale_handle(handle),
        }

        Ok(())
    }

    /// Push a value that only lives until the matching [`Self::pop_stack`]
    pub fn push_stack(&mut self, value: HostValue) -> Handle {
        self.stack.push(value);
        Handle::stack((self.stack.len() - 1) as u32)
    }

    pub fn pop_stack(&mut self) -> Option<HostValue> {
        self.stack.pop()
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    pub fn ref_count(&self, handle: Handle) -> Option<u32> {
        if handle.is_stack() || handle.is_singleton() {
            return None;
        }

        match self.arena.get((handle.index() - RESERVED_SLOTS) as usize) {
            Some(Slot::Occupied { count, .. }) => Some(*count),
            _ => None,
        }
    }

    /// Number of occupied slab entries, singletons excluded
    pub fn live_count(&self) -> usize {
        self.arena
            .iter()
            .filter(|slot| matches!(slot, Slot::Occupied { .. }))
            .count()
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }
}

fn stale_handle<T>(handle: Handle) -> Result<T, BridgeError> {
    return_contract_violation!(
        format!("Handle {} does not refer to a live host value", handle.raw()),
        { Handle => handle.raw() }
    );
}

#[cfg(test)]
#[path = "tests/handle_table_tests.rs"]
mod tests;
