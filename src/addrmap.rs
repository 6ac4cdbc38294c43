use std::collections::HashMap;

use bitflags::bitflags;

use crate::error::DisasmError;

bitflags! {
    /// What is currently known about a single VMA of an in-scope section.
    ///
    /// `UNMAPPED` (the empty set) is never stored explicitly: an address with
    /// no flags lives only in [`AddressMap`]'s unmapped bag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AddrFlags: u8 {
        const CODE      = 0b0001;
        const DATA      = 0b0010;
        const BB_START  = 0b0100;
        const INS_START = 0b1000;
    }
}

/// Per-section map from VMA to region flags, plus the bag of addresses that
/// are tracked but not yet claimed by any committed block.
///
/// Exactly one of "mapped" or "in the unmapped bag" holds for every tracked
/// address; the bag supports O(1) random access (for strategies that sample
/// it) and O(1) removal via swap-with-back-and-pop.
#[derive(Debug, Default)]
pub struct AddressMap {
    mapped: HashMap<u64, AddrFlags>,
    unmapped: Vec<u64>,
    unmapped_index: HashMap<u64, usize>,
}

impl AddressMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `addr` as unmapped. Idempotent: a no-op if `addr` is
    /// already tracked, mapped or not.
    pub fn insert(&mut self, addr: u64) {
        if self.contains(addr) {
            return;
        }
        self.unmapped_index.insert(addr, self.unmapped.len());
        self.unmapped.push(addr);
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.mapped.contains_key(&addr) || self.unmapped_index.contains_key(&addr)
    }

    /// Precondition: `self.contains(addr)`.
    pub fn addr_type(&self, addr: u64) -> Result<AddrFlags, DisasmError> {
        if let Some(flags) = self.mapped.get(&addr) {
            return Ok(*flags);
        }
        if self.unmapped_index.contains_key(&addr) {
            return Ok(AddrFlags::empty());
        }
        Err(DisasmError::AddressNotTracked(addr))
    }

    /// Precondition: `self.contains(addr)`. Assigns `flags` outright; if
    /// `flags` is non-empty, `addr` is removed from the unmapped bag.
    pub fn set_addr_type(&mut self, addr: u64, flags: AddrFlags) -> Result<(), DisasmError> {
        if !self.contains(addr) {
            return Err(DisasmError::AddressNotTracked(addr));
        }
        if flags.is_empty() {
            self.mapped.remove(&addr);
            if !self.unmapped_index.contains_key(&addr) {
                self.unmapped_index.insert(addr, self.unmapped.len());
                self.unmapped.push(addr);
            }
            return Ok(());
        }
        self.remove_unmapped(addr);
        self.mapped.insert(addr, flags);
        Ok(())
    }

    /// Precondition: `self.contains(addr)`. OR-combines `flag` into whatever
    /// `addr` currently carries.
    pub fn add_addr_flag(&mut self, addr: u64, flag: AddrFlags) -> Result<(), DisasmError> {
        let current = self.addr_type(addr)?;
        self.set_addr_type(addr, current | flag)
    }

    /// Stops tracking `addr` entirely.
    pub fn erase(&mut self, addr: u64) {
        self.mapped.remove(&addr);
        self.remove_unmapped(addr);
    }

    pub fn unmapped_count(&self) -> usize {
        self.unmapped.len()
    }

    pub fn get_unmapped(&self, index: usize) -> Option<u64> {
        self.unmapped.get(index).copied()
    }

    fn remove_unmapped(&mut self, addr: u64) {
        let Some(idx) = self.unmapped_index.remove(&addr) else {
            return;
        };
        let last = self.unmapped.len() - 1;
        self.unmapped.swap(idx, last);
        self.unmapped.pop();
        if idx < self.unmapped.len() {
            let moved = self.unmapped[idx];
            self.unmapped_index.insert(moved, idx);
        }
    }
}
