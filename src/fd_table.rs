//! Capability-table boundary contract.
//!
//! The byte stream names descriptors by slot index only; authority lives in
//! the side-channel descriptor array. A receiving process registers slots
//! `0..count-1` contiguously before interpreting any descriptor value, and
//! treats any slot it never registered as absent authority. The codec core
//! never touches this table — it belongs to the embedding process, which is
//! why insertion is specified thread-safe here and nowhere else.

use std::sync::Mutex;

use crate::FastHashMap;

/// Slot-to-descriptor resolution as seen by the embedding process.
pub trait CapabilityTable {
    /// Registers the real descriptor behind `slot`.
    fn insert(&self, slot: u32, fd: u32);

    /// Resolves `slot`, or `None` for a slot never registered.
    fn lookup(&self, slot: u32) -> Option<u32>;
}

/// A `Mutex`-protected table; insertion may happen from multiple threads.
#[derive(Debug, Default)]
pub struct FdTable {
    slots: Mutex<FastHashMap<u32, u32>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the whole descriptor array emitted by the serializer,
    /// occupying slots `0..fds.len()` contiguously.
    pub fn register_all(&self, fds: &[u32]) {
        for (slot, &fd) in fds.iter().enumerate() {
            self.insert(slot as u32, fd);
        }
    }
}

impl CapabilityTable for FdTable {
    fn insert(&self, slot: u32, fd: u32) {
        let mut slots = self.slots.lock().expect("fd table poisoned");
        if let Some(old) = slots.insert(slot, fd) {
            log::warn!("slot {slot} re-registered: descriptor {old} replaced by {fd}");
        }
    }

    fn lookup(&self, slot: u32) -> Option<u32> {
        self.slots.lock().expect("fd table poisoned").get(&slot).copied()
    }
}
