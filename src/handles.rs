//! The wire-handle registry used to resolve back-references.

use crate::descriptor::DescId;
use crate::entity::EntityId;
use crate::error::{ScanError, ScanResult};
use crate::wire;

/// What a wire handle can point at: entities and class descriptors share
/// one numbering sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandleTarget {
    Entity(EntityId),
    Desc(DescId),
}

/// Append-only registry mapping sequential wire handles to decoded items.
///
/// Handles are assigned in first-encounter order starting at
/// [`wire::BASE_WIRE_HANDLE`]. A stream reset clears the table entirely;
/// handles issued afterwards restart from the base and are unrelated to
/// anything registered before the reset.
#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    entries: Vec<HandleTarget>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append `target` and return the wire handle assigned to it.
    pub fn register(&mut self, target: HandleTarget) -> u32 {
        let handle = wire::BASE_WIRE_HANDLE + self.entries.len() as u32;
        self.entries.push(target);
        handle
    }

    /// Resolve a handle read from the stream.
    pub fn resolve(&self, handle: i32) -> ScanResult<HandleTarget> {
        let index = i64::from(handle) - i64::from(wire::BASE_WIRE_HANDLE);
        if index < 0 || index >= self.entries.len() as i64 {
            return Err(ScanError::BadHandle(handle));
        }
        Ok(self.entries[index as usize])
    }

    /// Drop every registration. Numbering restarts from the base.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
