//! This module implements the 36-bit one's complement word on which
//! the whole instruction set rests, plus a 72-bit double word for the
//! double-precision instructions.

pub mod double;
pub mod error;
pub mod word36;

#[cfg(test)]
mod tests;

/// The sign of a number.  Although in a one's-complement system all
/// values have a sign, we treat zero specially in order to simplify
/// working with native types and one's-complement types together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Negative = -1, // <= -1
    Zero = 0,      // +0 or -0
    Positive = 1,  // >= +1
}

/// Trait common to the single and double word types.
pub trait WordCommon {
    fn signum(&self) -> Sign;
}

/// Sign-extend the low 12 bits of `value` to 36 bits.
#[must_use]
pub const fn sign_extend_12(value: u64) -> u64 {
    let v = value & 0o7777;
    if v & 0o4000 == 0 {
        v
    } else {
        v | 0o777_777_770_000
    }
}

/// Sign-extend the low 18 bits of `value` to 36 bits.
#[must_use]
pub const fn sign_extend_18(value: u64) -> u64 {
    let v = value & 0o777_777;
    if v & 0o400_000 == 0 {
        v
    } else {
        v | 0o777_777_000_000
    }
}

/// Sign-extend the low 24 bits of `value` to 36 bits.
#[must_use]
pub const fn sign_extend_24(value: u64) -> u64 {
    let v = value & 0o77_777_777;
    if v & 0o40_000_000 == 0 {
        v
    } else {
        v | 0o777_700_000_000
    }
}
