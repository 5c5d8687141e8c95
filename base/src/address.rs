//! Absolute and virtual addresses.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::onescomplement::word36::Word36;

/// A location in backing storage, independent of any bank binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct AbsoluteAddress {
    /// 21 bits.
    pub segment: u64,
    /// 33 bits.
    pub offset: u64,
}

impl AbsoluteAddress {
    pub const SEGMENT_MASK: u64 = 0o7_777_777;
    pub const OFFSET_MASK: u64 = 0o77_777_777_777;

    #[must_use]
    pub const fn new(segment: u64, offset: u64) -> AbsoluteAddress {
        AbsoluteAddress {
            segment: segment & AbsoluteAddress::SEGMENT_MASK,
            offset: offset & AbsoluteAddress::OFFSET_MASK,
        }
    }

    /// The address `count` words further on in the same segment.
    #[must_use]
    pub const fn add_offset(self, count: u64) -> AbsoluteAddress {
        AbsoluteAddress::new(self.segment, self.offset + count)
    }
}

impl Display for AbsoluteAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:07o}:{:011o}", self.segment, self.offset)
    }
}

/// A bank name: level (3 bits) and bank descriptor index (15 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct LevelBdi {
    pub level: u64,
    pub bdi: u64,
}

impl LevelBdi {
    pub const VOID: LevelBdi = LevelBdi { level: 0, bdi: 0 };

    #[must_use]
    pub const fn new(level: u64, bdi: u64) -> LevelBdi {
        LevelBdi {
            level: level & 0o7,
            bdi: bdi & 0o77_777,
        }
    }

    /// Decode from the 18-bit L,BDI composite.
    #[must_use]
    pub const fn from_composite(value: u64) -> LevelBdi {
        LevelBdi::new(value >> 15, value)
    }

    #[must_use]
    pub const fn composite(&self) -> u64 {
        (self.level << 15) | self.bdi
    }

    #[must_use]
    pub const fn is_void(&self) -> bool {
        self.level == 0 && self.bdi == 0
    }

    /// Level 0 BDIs 1 through 31 name interrupt vectors rather than
    /// banks, and may not be the source of a bank transfer.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        self.level == 0 && self.bdi > 0 && self.bdi < 32
    }
}

impl Display for LevelBdi {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:o},{:05o}", self.level, self.bdi)
    }
}

/// An extended mode virtual address: level, BDI, offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct VirtualAddress {
    pub lbdi: LevelBdi,
    pub offset: u64,
}

impl VirtualAddress {
    #[must_use]
    pub const fn new(level: u64, bdi: u64, offset: u64) -> VirtualAddress {
        VirtualAddress {
            lbdi: LevelBdi::new(level, bdi),
            offset: offset & 0o777_777,
        }
    }

    #[must_use]
    pub const fn from_word(w: Word36) -> VirtualAddress {
        let bits = w.bits();
        VirtualAddress::new(bits >> 33, bits >> 18, bits)
    }

    #[must_use]
    pub const fn composite(&self) -> Word36 {
        Word36::masked((self.lbdi.level << 33) | (self.lbdi.bdi << 18) | self.offset)
    }

    /// The basic-mode encoding of this address.
    #[must_use]
    pub const fn to_basic(&self) -> BasicVirtualAddress {
        BasicVirtualAddress::translate(self.lbdi.level, self.lbdi.bdi, self.offset)
    }
}

impl Display for VirtualAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{:06o}", self.lbdi, self.offset)
    }
}

/// A basic mode virtual address, which encodes the level in two
/// flags: exec (E) and level-specifier (LS).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct BasicVirtualAddress {
    pub exec: bool,
    pub level_specifier: bool,
    /// 12 bits.
    pub bdi: u64,
    pub offset: u64,
}

impl BasicVirtualAddress {
    const EXEC_FLAG: u64 = 0o400_000_000_000;
    const LEVEL_FLAG: u64 = 0o040_000_000_000;

    #[must_use]
    pub const fn new(exec: bool, level_specifier: bool, bdi: u64, offset: u64) -> Self {
        BasicVirtualAddress {
            exec,
            level_specifier,
            bdi: bdi & 0o7777,
            offset: offset & 0o777_777,
        }
    }

    /// Encode an extended L,BDI,offset.  Only levels which have a
    /// basic mode equivalent survive the trip intact.
    #[must_use]
    pub const fn translate(level: u64, bdi: u64, offset: u64) -> BasicVirtualAddress {
        BasicVirtualAddress::new(
            level & 0o4 == 0,
            (level & 0o6 == 0) || level == 6,
            bdi,
            offset,
        )
    }

    /// The level implied by the E and LS flags.
    #[must_use]
    pub const fn level(&self) -> u64 {
        match (self.exec, self.level_specifier) {
            (true, true) => 0,
            (true, false) => 2,
            (false, true) => 6,
            (false, false) => 4,
        }
    }

    #[must_use]
    pub const fn lbdi(&self) -> LevelBdi {
        LevelBdi::new(self.level(), self.bdi)
    }

    #[must_use]
    pub const fn composite(&self) -> Word36 {
        let mut v = (self.bdi << 18) | self.offset;
        if self.exec {
            v |= BasicVirtualAddress::EXEC_FLAG;
        }
        if self.level_specifier {
            v |= BasicVirtualAddress::LEVEL_FLAG;
        }
        Word36::masked(v)
    }

    #[must_use]
    pub const fn from_word(w: Word36) -> BasicVirtualAddress {
        let bits = w.bits();
        BasicVirtualAddress::new(
            bits & BasicVirtualAddress::EXEC_FLAG != 0,
            bits & BasicVirtualAddress::LEVEL_FLAG != 0,
            bits >> 18,
            bits,
        )
    }
}

/// The X(a) register operand of LBJ, LDJ and LIJ.  Its layout is that
/// of a basic mode virtual address with the bank selector in bits 1-2
/// and the interface specification in bits 4-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LxjRegister {
    pub address: BasicVirtualAddress,
    /// Selects B12..B15 for LBJ.
    pub bank_selector: u64,
    /// 0 and 1 are normal/call, 2 is return, 3 is invalid.
    pub interface_spec: u64,
}

impl LxjRegister {
    #[must_use]
    pub const fn from_word(w: Word36) -> LxjRegister {
        let bits = w.bits();
        LxjRegister {
            address: BasicVirtualAddress::from_word(w),
            bank_selector: (bits >> 33) & 0o3,
            interface_spec: (bits >> 30) & 0o3,
        }
    }

    #[must_use]
    pub const fn composite(&self) -> Word36 {
        Word36::masked(
            self.address.composite().bits()
                | ((self.bank_selector & 0o3) << 33)
                | ((self.interface_spec & 0o3) << 30),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        for (level, exec, ls) in [(0, true, true), (2, true, false), (4, false, false), (6, false, true)] {
            let b = BasicVirtualAddress::translate(level, 0o123, 0o4567);
            assert_eq!((b.exec, b.level_specifier), (exec, ls));
            assert_eq!(b.level(), level);
        }
        assert_eq!(BasicVirtualAddress::translate(1, 0, 0).level(), 0);
    }

    #[test]
    fn test_basic_composite() {
        let b = BasicVirtualAddress::new(true, true, 0o1234, 0o1000);
        assert_eq!(b.composite(), Word36::masked(0o441234_001000));
        assert_eq!(BasicVirtualAddress::from_word(b.composite()), b);
    }

    #[test]
    fn test_extended_composite() {
        let v = VirtualAddress::new(3, 0o12345, 0o1000);
        assert_eq!(v.composite(), Word36::masked(0o312345_001000));
        assert_eq!(VirtualAddress::from_word(v.composite()), v);
    }

    #[test]
    fn test_lxj_register() {
        let x = LxjRegister {
            address: BasicVirtualAddress::new(false, true, 0o17, 0o2000),
            bank_selector: 2,
            interface_spec: 1,
        };
        let decoded = LxjRegister::from_word(x.composite());
        assert_eq!(decoded, x);
    }

    #[test]
    fn test_reserved_lbdi() {
        assert!(LevelBdi::new(0, 1).is_reserved());
        assert!(LevelBdi::new(0, 31).is_reserved());
        assert!(!LevelBdi::new(0, 32).is_reserved());
        assert!(!LevelBdi::new(1, 1).is_reserved());
        assert!(LevelBdi::VOID.is_void());
    }
}
