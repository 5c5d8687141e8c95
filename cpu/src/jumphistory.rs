//! The jump history: a ring of the virtual addresses from which
//! control was most recently transferred.
use serde::Serialize;

use base::prelude::*;

pub const JUMP_HISTORY_CAPACITY: usize = 512;

/// Storing an entry which leaves this many or more in the ring raises
/// the jump-history-full interrupt.
pub const JUMP_HISTORY_THRESHOLD: usize = 480;

#[derive(Debug, Clone, Serialize)]
pub struct JumpHistory {
    entries: Vec<VirtualAddress>,
    /// The slot the next entry is written to.
    next: usize,
    wrapped: bool,
    interrupt_latched: bool,
}

impl Default for JumpHistory {
    fn default() -> Self {
        JumpHistory::new()
    }
}

impl JumpHistory {
    #[must_use]
    pub fn new() -> JumpHistory {
        JumpHistory {
            entries: vec![VirtualAddress::default(); JUMP_HISTORY_CAPACITY],
            next: 0,
            wrapped: false,
            interrupt_latched: false,
        }
    }

    /// Empty the ring and re-arm the full interrupt.
    pub fn clear(&mut self) {
        self.next = 0;
        self.wrapped = false;
        self.interrupt_latched = false;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.wrapped {
            JUMP_HISTORY_CAPACITY
        } else {
            self.next
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a jump.  Returns the jump-history-full interrupt the
    /// first time the threshold is reached after a clear.
    pub fn store_entry(&mut self, address: VirtualAddress) -> Option<Interrupt> {
        self.entries[self.next] = address;
        self.next += 1;
        if self.next == JUMP_HISTORY_CAPACITY {
            self.next = 0;
            self.wrapped = true;
        }
        if self.len() >= JUMP_HISTORY_THRESHOLD && !self.interrupt_latched {
            self.interrupt_latched = true;
            Some(Interrupt::JumpHistoryFull)
        } else {
            None
        }
    }

    /// The recorded addresses, oldest first.  The ring is cleared.
    pub fn take_entries(&mut self) -> Vec<VirtualAddress> {
        let result = if self.wrapped {
            let mut v = self.entries[self.next..].to_vec();
            v.extend_from_slice(&self.entries[..self.next]);
            v
        } else {
            self.entries[..self.next].to_vec()
        };
        self.clear();
        result
    }
}
