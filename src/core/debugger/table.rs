//! Breakpoint Table (§4.2): the fixed-size registry of slot records.

use crate::core::config::MAX_SLOT;

pub const EMPTY_SLOT_INDEX: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Empty,
    SwThumb,
    SwArm,
    HwBreak,
    WpRead,
    WpWrite,
    WpReadWrite,
    SingleStep,
}

impl SlotKind {
    pub fn is_software(self) -> bool {
        matches!(self, SlotKind::SwThumb | SlotKind::SwArm)
    }

    pub fn is_watchpoint(self) -> bool {
        matches!(self, SlotKind::WpRead | SlotKind::WpWrite | SlotKind::WpReadWrite)
    }

    /// Width in bytes of the patched encoding for SW kinds.
    pub fn width(self) -> usize {
        match self {
            SlotKind::SwThumb => 2,
            SlotKind::SwArm => 4,
            _ => 0,
        }
    }
}

/// One breakpoint entry (§3). `saved_word` holds the original bytes a SW slot overwrote, stored
/// little-endian in the low `kind.width()` bytes.
#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub kind: SlotKind,
    pub pid: u32,
    pub address: u32,
    pub slot_index: u8,
    pub saved_word: u32,
}

impl Slot {
    const fn empty() -> Self {
        Slot { kind: SlotKind::Empty, pid: 0, address: 0, slot_index: EMPTY_SLOT_INDEX, saved_word: 0 }
    }
}

/// Ordered sequence of `MAX_SLOT` slots. Invariant: `slot_index == position` for every
/// non-Empty entry (enforced by construction — callers never set `slot_index` directly).
pub struct BreakpointTable {
    slots: [Slot; MAX_SLOT],
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self { slots: [Slot::empty(); MAX_SLOT] }
    }

    /// Scans a half-open index range for the first Empty slot.
    pub fn find_empty(&self, range: std::ops::Range<usize>) -> Option<usize> {
        range.into_iter().find(|&i| self.slots[i].kind == SlotKind::Empty)
    }

    pub fn find_by_address(&self, addr: u32, pid: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.kind != SlotKind::Empty && s.pid == pid && s.address == addr)
    }

    pub fn get(&self, i: usize) -> &Slot {
        &self.slots[i]
    }

    /// Fills a slot that `find_empty` previously identified as Empty. Panics on an out-of-range
    /// index — an internal-programming-error condition, not a caller-facing one.
    pub fn fill(&mut self, i: usize, kind: SlotKind, pid: u32, address: u32, saved_word: u32) {
        self.slots[i] = Slot { kind, pid, address, slot_index: i as u8, saved_word };
    }

    /// Resets a slot to Empty with `slot_index = 0xFF`.
    pub fn clear(&mut self, i: usize) {
        self.slots[i] = Slot::empty();
    }

    /// Clears every slot owned by `pid` (process-kill teardown), returning their prior contents
    /// for the caller to best-effort restore.
    pub fn clear_owned_by(&mut self, pid: u32) -> Vec<Slot> {
        let mut cleared = Vec::new();
        for i in 0..self.slots.len() {
            if self.slots[i].kind != SlotKind::Empty && self.slots[i].pid == pid {
                cleared.push(self.slots[i]);
                self.slots[i] = Slot::empty();
            }
        }
        cleared
    }

    /// Read-only copy for UI consumption.
    pub fn snapshot(&self) -> [Slot; MAX_SLOT] {
        self.slots
    }

    pub fn count_non_empty_in(&self, range: std::ops::Range<usize>) -> usize {
        range.into_iter().filter(|&i| self.slots[i].kind != SlotKind::Empty).count()
    }
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{MAX_HW_BKPT, SINGLE_STEP_SLOT};

    #[test]
    fn find_empty_scans_range() {
        let mut t = BreakpointTable::new();
        assert_eq!(t.find_empty(0..MAX_HW_BKPT), Some(0));
        t.fill(0, SlotKind::HwBreak, 1, 0x1000, 0);
        assert_eq!(t.find_empty(0..MAX_HW_BKPT), Some(1));
    }

    #[test]
    fn full_range_returns_none() {
        let mut t = BreakpointTable::new();
        for i in 0..SINGLE_STEP_SLOT {
            t.fill(i, SlotKind::HwBreak, 1, 0x1000 + i as u32, 0);
        }
        assert_eq!(t.find_empty(0..SINGLE_STEP_SLOT), None);
    }

    #[test]
    fn clear_resets_slot_index() {
        let mut t = BreakpointTable::new();
        t.fill(2, SlotKind::SwArm, 1, 0x2000, 0xE1200070);
        t.clear(2);
        assert_eq!(t.get(2).kind, SlotKind::Empty);
        assert_eq!(t.get(2).slot_index, EMPTY_SLOT_INDEX);
    }

    #[test]
    fn find_by_address_matches_pid() {
        let mut t = BreakpointTable::new();
        t.fill(0, SlotKind::HwBreak, 7, 0x3000, 0);
        assert_eq!(t.find_by_address(0x3000, 7), Some(0));
        assert_eq!(t.find_by_address(0x3000, 9), None);
    }

    #[test]
    fn clear_owned_by_only_touches_matching_pid() {
        let mut t = BreakpointTable::new();
        t.fill(0, SlotKind::HwBreak, 1, 0x1000, 0);
        t.fill(1, SlotKind::HwBreak, 2, 0x2000, 0);
        let cleared = t.clear_owned_by(1);
        assert_eq!(cleared.len(), 1);
        assert_eq!(t.get(0).kind, SlotKind::Empty);
        assert_eq!(t.get(1).kind, SlotKind::HwBreak);
    }
}
