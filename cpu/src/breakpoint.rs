//! The breakpoint register.
use serde::Serialize;

use base::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BreakpointComparison {
    Fetch,
    Read,
    Write,
}

/// A single absolute address, the kinds of access which match it, and
/// whether a match halts the engine (rather than interrupting it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BreakpointRegister {
    pub address: Option<AbsoluteAddress>,
    pub fetch: bool,
    pub read: bool,
    pub write: bool,
    pub halt: bool,
}

impl BreakpointRegister {
    #[must_use]
    pub const fn new(address: AbsoluteAddress, fetch: bool, read: bool, write: bool, halt: bool) -> Self {
        BreakpointRegister {
            address: Some(address),
            fetch,
            read,
            write,
            halt,
        }
    }

    pub fn clear(&mut self) {
        *self = BreakpointRegister::default();
    }

    const fn compares(&self, comparison: BreakpointComparison) -> bool {
        match comparison {
            BreakpointComparison::Fetch => self.fetch,
            BreakpointComparison::Read => self.read,
            BreakpointComparison::Write => self.write,
        }
    }

    #[must_use]
    pub fn matches(&self, comparison: BreakpointComparison, address: AbsoluteAddress) -> bool {
        self.compares(comparison) && self.address == Some(address)
    }

    /// Whether any of the `count` words starting at `start` match.
    #[must_use]
    pub fn matches_range(&self, comparison: BreakpointComparison, start: AbsoluteAddress, count: u64) -> bool {
        match self.address {
            Some(bp) if self.compares(comparison) => {
                bp.segment == start.segment && bp.offset >= start.offset && bp.offset < start.offset + count
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_needs_the_right_comparison() {
        let addr = AbsoluteAddress::new(1, 0o1005);
        let bp = BreakpointRegister::new(addr, false, true, false, false);
        assert!(bp.matches(BreakpointComparison::Read, addr));
        assert!(!bp.matches(BreakpointComparison::Write, addr));
        assert!(!bp.matches(BreakpointComparison::Read, addr.add_offset(1)));
        assert!(!BreakpointRegister::default().matches(BreakpointComparison::Fetch, addr));
    }

    #[test]
    fn test_range_match() {
        let bp = BreakpointRegister::new(AbsoluteAddress::new(1, 0o1005), false, false, true, true);
        let start = AbsoluteAddress::new(1, 0o1000);
        assert!(bp.matches_range(BreakpointComparison::Write, start, 6));
        assert!(!bp.matches_range(BreakpointComparison::Write, start, 5));
        assert!(!bp.matches_range(BreakpointComparison::Write, AbsoluteAddress::new(2, 0o1000), 8));
    }
}
