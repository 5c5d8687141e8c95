//! The 36-bit one's complement machine word.
//!
//! Bit numbering follows the architecture documents: bit 0 is the
//! most significant (sign) bit and bit 35 is the least significant.
//! The value is held right-justified in a `u64`; the bits above bit
//! 35 of the container are always zero.
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter, Octal};
use std::ops::{BitAnd, BitOr, BitXor, Not};

use serde::Serialize;

use super::error::ConversionFailed;
use super::{Sign, WordCommon};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Word36 {
    bits: u64,
}

/// The outcome of a single-precision addition, including the values
/// the designator register's carry and overflow bits take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddResult {
    pub sum: Word36,
    pub carry: bool,
    pub overflow: bool,
}

// Generates a getter returning the raw field value and a builder
// returning a copy of the word with the field replaced.
macro_rules! partial_word_field {
    ($get:ident, $with:ident, $shift:expr, $mask:expr, $name:literal) => {
        #[doc = concat!("Returns the ", $name, " field, right-justified.")]
        #[must_use]
        pub const fn $get(&self) -> u64 {
            (self.bits >> $shift) & $mask
        }

        #[doc = concat!("Returns a copy of this word with the ", $name, " field replaced.")]
        #[must_use]
        pub const fn $with(self, value: u64) -> Word36 {
            let cleared = self.bits & !(($mask as u64) << $shift) & Word36::MASK;
            Word36 {
                bits: cleared | ((value & $mask) << $shift),
            }
        }
    };
}

// Sign-extended getters for the half and third fields.
macro_rules! sign_extended_field {
    ($get:ident, $raw:ident, $width:expr, $name:literal) => {
        #[doc = concat!("Returns the ", $name, " field sign-extended to 36 bits.")]
        #[must_use]
        pub const fn $get(&self) -> Word36 {
            let raw = self.$raw();
            let sign = 1u64 << ($width - 1);
            if raw & sign == 0 {
                Word36 { bits: raw }
            } else {
                Word36 {
                    bits: (raw | (Word36::MASK & !((1u64 << $width) - 1))) & Word36::MASK,
                }
            }
        }
    };
}

impl Word36 {
    pub const MASK: u64 = 0o777_777_777_777;
    pub const SIGN_BIT: u64 = 0o400_000_000_000;

    pub const ZERO: Word36 = Word36 { bits: 0 };
    pub const NEGATIVE_ZERO: Word36 = Word36 { bits: Word36::MASK };
    pub const ONE: Word36 = Word36 { bits: 1 };
    pub const NEGATIVE_ONE: Word36 = Word36 {
        bits: 0o777_777_777_776,
    };
    /// The largest positive value, 2^35-1.
    pub const MAX: Word36 = Word36 {
        bits: 0o377_777_777_777,
    };
    /// The most negative value, -(2^35-1).
    pub const MIN: Word36 = Word36 {
        bits: 0o400_000_000_000,
    };

    /// Construct a word from a compile-time constant, rejecting
    /// out-of-range constants at compile time.  Normally used via the
    /// `w36!` macro.
    #[must_use]
    pub const fn new<const N: u64>() -> Word36 {
        struct Helper<const M: u64>;
        impl<const M: u64> Helper<M> {
            const W: Word36 = {
                if M > Word36::MASK {
                    panic!("input value is out of range")
                } else {
                    Word36 { bits: M }
                }
            };
        }
        Helper::<N>::W
    }

    /// Construct a word from the low 36 bits of `bits`; any higher
    /// bits are discarded.
    #[must_use]
    pub const fn masked(bits: u64) -> Word36 {
        Word36 {
            bits: bits & Word36::MASK,
        }
    }

    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.bits & Word36::SIGN_BIT != 0
    }

    #[must_use]
    pub const fn is_positive(&self) -> bool {
        !self.is_negative()
    }

    /// True for both positive and negative zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.bits == 0 || self.bits == Word36::MASK
    }

    #[must_use]
    pub const fn is_positive_zero(&self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub const fn is_negative_zero(&self) -> bool {
        self.bits == Word36::MASK
    }

    /// The additive inverse (bitwise complement of the 36 bits).
    #[must_use]
    pub const fn negate(self) -> Word36 {
        Word36 {
            bits: self.bits ^ Word36::MASK,
        }
    }

    /// The absolute value.  The magnitude of negative zero is
    /// positive zero.
    #[must_use]
    pub const fn magnitude(self) -> u64 {
        if self.is_negative() {
            (!self.bits) & Word36::MASK
        } else {
            self.bits
        }
    }

    #[must_use]
    pub const fn abs(self) -> Word36 {
        Word36 {
            bits: self.magnitude(),
        }
    }

    /// Converts negative zero to positive zero; other values are
    /// unchanged.
    #[must_use]
    pub const fn eliminate_negative_zero(self) -> Word36 {
        if self.is_negative_zero() {
            Word36::ZERO
        } else {
            self
        }
    }

    /// The value as a native two's complement integer.  Both zeroes
    /// map to 0.
    #[must_use]
    pub const fn to_i64(self) -> i64 {
        if self.is_negative() {
            -(self.magnitude() as i64)
        } else {
            self.bits as i64
        }
    }

    /// Convert a native integer to one's complement, keeping only
    /// the low 36 bits of the magnitude's representation.  Values
    /// outside the 36-bit range wrap rather than fail.
    #[must_use]
    pub const fn from_i64_wrapping(value: i64) -> Word36 {
        if value < 0 {
            Word36 {
                bits: !(value.unsigned_abs()) & Word36::MASK,
            }
        } else {
            Word36 {
                bits: (value as u64) & Word36::MASK,
            }
        }
    }

    /// Ones-complement addition.  Adding negative zero to negative
    /// zero yields negative zero; all other sums are computed in two's
    /// complement and converted back, so that `x + -x` is positive
    /// zero.
    #[must_use]
    pub const fn add_simple(self, rhs: Word36) -> Word36 {
        if self.is_negative_zero() && rhs.is_negative_zero() {
            Word36::NEGATIVE_ZERO
        } else {
            Word36::from_i64_wrapping(self.to_i64() + rhs.to_i64())
        }
    }

    /// Addition which also reports carry and overflow in the way the
    /// arithmetic instructions record them in the designator register.
    #[must_use]
    pub const fn add_with_flags(self, rhs: Word36) -> AddResult {
        let sum = self.add_simple(rhs);
        let a_positive = self.is_positive();
        let b_positive = rhs.is_positive();
        let sum_positive = sum.is_positive();
        let signs_agree = a_positive == b_positive;
        AddResult {
            sum,
            carry: (!a_positive && !b_positive) || (!signs_agree && sum_positive),
            overflow: signs_agree && (a_positive != sum_positive),
        }
    }

    /// The number of one bits.
    #[must_use]
    pub const fn count_bits(&self) -> u32 {
        self.bits.count_ones()
    }

    /// Shift left, filling with zeroes.  Counts of 36 or more produce
    /// zero.
    #[must_use]
    pub const fn left_shift_logical(self, count: u32) -> Word36 {
        if count >= 36 {
            Word36::ZERO
        } else {
            Word36::masked(self.bits << count)
        }
    }

    /// Rotate left; the count is taken modulo 36.
    #[must_use]
    pub const fn left_shift_circular(self, count: u32) -> Word36 {
        let c = count % 36;
        if c == 0 {
            self
        } else {
            Word36::masked((self.bits << c) | (self.bits >> (36 - c)))
        }
    }

    /// Shift right, filling with zeroes.  Counts of 36 or more produce
    /// zero.
    #[must_use]
    pub const fn right_shift_logical(self, count: u32) -> Word36 {
        if count >= 36 {
            Word36::ZERO
        } else {
            Word36 {
                bits: self.bits >> count,
            }
        }
    }

    /// Shift right, propagating the sign bit.  Counts of 35 or more
    /// leave only copies of the sign.
    #[must_use]
    pub const fn right_shift_algebraic(self, count: u32) -> Word36 {
        let negative = self.is_negative();
        if count >= 35 {
            if negative {
                Word36::NEGATIVE_ZERO
            } else {
                Word36::ZERO
            }
        } else if count == 0 {
            self
        } else if negative {
            Word36::masked((self.bits >> count) | (Word36::MASK << (36 - count)))
        } else {
            Word36 {
                bits: self.bits >> count,
            }
        }
    }

    /// Rotate right; the count is taken modulo 36.
    #[must_use]
    pub const fn right_shift_circular(self, count: u32) -> Word36 {
        let c = count % 36;
        if c == 0 {
            self
        } else {
            Word36::masked((self.bits >> c) | (self.bits << (36 - c)))
        }
    }

    partial_word_field!(h1, with_h1, 18, 0o777_777, "H1 (upper half)");
    partial_word_field!(h2, with_h2, 0, 0o777_777, "H2 (lower half)");
    partial_word_field!(q1, with_q1, 27, 0o777, "Q1 (first quarter)");
    partial_word_field!(q2, with_q2, 18, 0o777, "Q2");
    partial_word_field!(q3, with_q3, 9, 0o777, "Q3");
    partial_word_field!(q4, with_q4, 0, 0o777, "Q4 (last quarter)");
    partial_word_field!(s1, with_s1, 30, 0o77, "S1 (first sixth)");
    partial_word_field!(s2, with_s2, 24, 0o77, "S2");
    partial_word_field!(s3, with_s3, 18, 0o77, "S3");
    partial_word_field!(s4, with_s4, 12, 0o77, "S4");
    partial_word_field!(s5, with_s5, 6, 0o77, "S5");
    partial_word_field!(s6, with_s6, 0, 0o77, "S6 (last sixth)");
    partial_word_field!(t1, with_t1, 24, 0o7777, "T1 (first third)");
    partial_word_field!(t2, with_t2, 12, 0o7777, "T2");
    partial_word_field!(t3, with_t3, 0, 0o7777, "T3 (last third)");

    sign_extended_field!(xh1, h1, 18, "H1");
    sign_extended_field!(xh2, h2, 18, "H2");
    sign_extended_field!(xt1, t1, 12, "T1");
    sign_extended_field!(xt2, t2, 12, "T2");
    sign_extended_field!(xt3, t3, 12, "T3");

    /// Builds a word from two 18-bit halves.
    #[must_use]
    pub const fn from_halves(h1: u64, h2: u64) -> Word36 {
        Word36 {
            bits: ((h1 & 0o777_777) << 18) | (h2 & 0o777_777),
        }
    }

    // std::ops traits cannot be called in const context, so these
    // work-alikes exist for building constants.
    #[must_use]
    pub const fn and(self, mask: u64) -> Word36 {
        Word36 {
            bits: self.bits & mask,
        }
    }

    #[must_use]
    pub const fn or(self, mask: u64) -> Word36 {
        Word36 {
            bits: (self.bits | mask) & Word36::MASK,
        }
    }
}

impl WordCommon for Word36 {
    fn signum(&self) -> Sign {
        if self.is_zero() {
            Sign::Zero
        } else if self.is_negative() {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

// Conversions from native types which always fit.
macro_rules! from_native_type_to_self {
    ($($from:ty)*) => {
        $(
            impl From<$from> for Word36 {
                fn from(n: $from) -> Self {
                    Self { bits: u64::from(n) }
                }
            }
        )*
    }
}

from_native_type_to_self!(u8 u16 u32 bool);

impl TryFrom<u64> for Word36 {
    type Error = ConversionFailed;
    fn try_from(n: u64) -> Result<Word36, ConversionFailed> {
        if n > Word36::MASK {
            Err(ConversionFailed::TooLarge)
        } else {
            Ok(Word36 { bits: n })
        }
    }
}

impl TryFrom<i64> for Word36 {
    type Error = ConversionFailed;
    fn try_from(n: i64) -> Result<Word36, ConversionFailed> {
        let limit = Word36::MAX.bits as i64;
        if n > limit {
            Err(ConversionFailed::TooLarge)
        } else if n < -limit {
            Err(ConversionFailed::TooSmall)
        } else {
            Ok(Word36::from_i64_wrapping(n))
        }
    }
}

impl From<Word36> for u64 {
    fn from(w: Word36) -> u64 {
        w.bits
    }
}

impl From<Word36> for i64 {
    fn from(w: Word36) -> i64 {
        w.to_i64()
    }
}

impl Display for Word36 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:012o}", self.bits)
    }
}

impl Octal for Word36 {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        Octal::fmt(&self.bits, f)
    }
}

impl Debug for Word36 {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Word36{{bits: {:#o}}}", self.bits)
    }
}

impl PartialOrd for Word36 {
    fn partial_cmp(&self, other: &Word36) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordering is by signed value, except that negative zero sorts
/// immediately below positive zero.
impl Ord for Word36 {
    fn cmp(&self, other: &Word36) -> Ordering {
        match (self.is_zero(), other.is_zero()) {
            (true, true) => match (self.is_negative_zero(), other.is_negative_zero()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            _ => self.to_i64().cmp(&other.to_i64()),
        }
    }
}

impl Not for Word36 {
    type Output = Self;
    fn not(self) -> Self {
        self.negate()
    }
}

impl BitAnd<u64> for Word36 {
    type Output = Self;
    fn bitand(self, mask: u64) -> Self {
        Word36 {
            bits: self.bits & mask,
        }
    }
}

impl BitAnd for Word36 {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.bitand(rhs.bits)
    }
}

impl BitOr<u64> for Word36 {
    type Output = Self;
    fn bitor(self, mask: u64) -> Self {
        Word36::masked(self.bits | mask)
    }
}

impl BitOr for Word36 {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.bitor(rhs.bits)
    }
}

impl BitXor<u64> for Word36 {
    type Output = Self;
    fn bitxor(self, mask: u64) -> Self {
        Word36::masked(self.bits ^ mask)
    }
}

impl BitXor for Word36 {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        self.bitxor(rhs.bits)
    }
}
