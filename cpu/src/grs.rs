//! The general register set.
//!
//! | Registers | GRS index |
//! |---|---|
//! | X0..X15 | 000..017 |
//! | A0..A15 | 014..033 (A0..A3 overlap X12..X15) |
//! | R0..R15 | 0100..0117 |
//! | ER0..ER15 | 0120..0137 |
//! | EX0..EX15 | 0140..0157 |
//! | EA0..EA15 | 0154..0173 (EA0..EA3 overlap EX12..EX15) |
//!
//! Locations 040..077 are reserved.
use serde::Serialize;

use base::prelude::*;

pub const GRS_SIZE: u64 = 0o200;

pub const X0: u64 = 0;
pub const A0: u64 = 0o14;
pub const R0: u64 = 0o100;
pub const ER0: u64 = 0o120;
pub const EX0: u64 = 0o140;
pub const EA0: u64 = 0o154;

pub const R1: u64 = R0 + 1;
pub const R2: u64 = R0 + 2;
pub const X11: u64 = X0 + 11;
pub const EX1: u64 = EX0 + 1;

/// The GRS index of Xn, An or Rn in either the user or the exec set.
#[must_use]
pub const fn x_index(n: u64, exec: bool) -> u64 {
    (if exec { EX0 } else { X0 }) + (n & 0o17)
}

#[must_use]
pub const fn a_index(n: u64, exec: bool) -> u64 {
    (if exec { EA0 } else { A0 }) + (n & 0o17)
}

#[must_use]
pub const fn r_index(n: u64, exec: bool) -> u64 {
    (if exec { ER0 } else { R0 }) + (n & 0o17)
}

/// Whether a program at `privilege` may read GRS location `index`.
#[must_use]
pub const fn is_readable(index: u64, privilege: u64) -> bool {
    match index {
        0..=0o37 | 0o100..=0o117 => true,
        0o40..=0o77 => false,
        0o120..=0o177 => privilege <= 2,
        _ => false,
    }
}

/// Whether a program at `privilege` may write GRS location `index`.
#[must_use]
pub const fn is_writable(index: u64, privilege: u64) -> bool {
    match index {
        0..=0o37 | 0o100..=0o117 => true,
        0o40..=0o77 => false,
        0o120..=0o177 => privilege == 0,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralRegisterSet {
    registers: Vec<Word36>,
}

impl Default for GeneralRegisterSet {
    fn default() -> Self {
        GeneralRegisterSet::new()
    }
}

impl GeneralRegisterSet {
    #[must_use]
    pub fn new() -> GeneralRegisterSet {
        GeneralRegisterSet {
            registers: vec![Word36::ZERO; GRS_SIZE as usize],
        }
    }

    pub fn clear(&mut self) {
        self.registers.fill(Word36::ZERO);
    }

    /// Indices wrap modulo the size of the set.
    #[must_use]
    pub fn get(&self, index: u64) -> Word36 {
        self.registers[(index % GRS_SIZE) as usize]
    }

    pub fn set(&mut self, index: u64, value: Word36) {
        self.registers[(index % GRS_SIZE) as usize] = value;
    }

    #[must_use]
    pub fn x(&self, n: u64, exec: bool) -> Word36 {
        self.get(x_index(n, exec))
    }

    #[must_use]
    pub fn a(&self, n: u64, exec: bool) -> Word36 {
        self.get(a_index(n, exec))
    }

    #[must_use]
    pub fn r(&self, n: u64, exec: bool) -> Word36 {
        self.get(r_index(n, exec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_windows() {
        let mut grs = GeneralRegisterSet::new();
        grs.set(a_index(0, false), Word36::masked(0o7));
        assert_eq!(grs.x(12, false), Word36::masked(0o7));
        grs.set(x_index(13, true), Word36::masked(0o11));
        assert_eq!(grs.a(1, true), Word36::masked(0o11));
        assert_eq!(r_index(2, true), 0o122);
        grs.set(GRS_SIZE + 1, Word36::ONE);
        assert_eq!(grs.get(1), Word36::ONE);
    }

    #[test]
    fn test_accessibility() {
        assert!(is_writable(0o37, 3));
        assert!(!is_writable(0o40, 0));
        assert!(!is_readable(0o77, 0));
        assert!(is_readable(0o117, 3));
        assert!(is_readable(0o120, 2));
        assert!(!is_readable(0o120, 3));
        assert!(is_writable(0o177, 0));
        assert!(!is_writable(0o177, 1));
    }
}
