//! 72-bit one's complement values held as two words, most
//! significant first, together with the multiply and divide
//! primitives which produce or consume them.
use serde::Serialize;

use super::word36::Word36;
use super::{Sign, WordCommon};

const MASK72: u128 = (1u128 << 72) - 1;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Debug)]
pub struct DoubleWord36 {
    pub high: Word36,
    pub low: Word36,
}

/// The result of [`DoubleWord36::divide`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DivideResult {
    pub quotient: Word36,
    pub remainder: Word36,
    pub divide_by_zero: bool,
    pub overflow: bool,
}

impl DoubleWord36 {
    pub const ZERO: DoubleWord36 = DoubleWord36 {
        high: Word36::ZERO,
        low: Word36::ZERO,
    };

    #[must_use]
    pub const fn new(high: Word36, low: Word36) -> DoubleWord36 {
        DoubleWord36 { high, low }
    }

    /// The 72 bits as a native unsigned integer.
    #[must_use]
    pub const fn bits(&self) -> u128 {
        ((self.high.bits() as u128) << 36) | (self.low.bits() as u128)
    }

    #[must_use]
    pub const fn from_bits(bits: u128) -> DoubleWord36 {
        let b = bits & MASK72;
        DoubleWord36 {
            high: Word36::masked((b >> 36) as u64),
            low: Word36::masked(b as u64),
        }
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.high.is_negative()
    }

    /// True when both words are positive zero or both are negative
    /// zero.  Mixed zero words are not a double-precision zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        (self.high.is_positive_zero() && self.low.is_positive_zero())
            || (self.high.is_negative_zero() && self.low.is_negative_zero())
    }

    #[must_use]
    pub const fn negate(self) -> DoubleWord36 {
        DoubleWord36 {
            high: self.high.negate(),
            low: self.low.negate(),
        }
    }

    #[must_use]
    pub const fn magnitude(&self) -> u128 {
        if self.is_negative() {
            (!self.bits()) & MASK72
        } else {
            self.bits()
        }
    }

    #[must_use]
    pub const fn to_i128(self) -> i128 {
        if self.is_negative() {
            -(self.magnitude() as i128)
        } else {
            self.bits() as i128
        }
    }

    #[must_use]
    pub const fn from_i128_wrapping(value: i128) -> DoubleWord36 {
        if value < 0 {
            DoubleWord36::from_bits(!value.unsigned_abs() & MASK72)
        } else {
            DoubleWord36::from_bits(value as u128)
        }
    }

    /// Double-precision addition, with the same negative zero rule
    /// as [`Word36::add_simple`].  Returns the sum and the overflow
    /// condition.
    #[must_use]
    pub fn add(self, rhs: DoubleWord36) -> (DoubleWord36, bool) {
        let both_negative_zero = |d: &DoubleWord36| {
            d.high.is_negative_zero() && d.low.is_negative_zero()
        };
        if both_negative_zero(&self) && both_negative_zero(&rhs) {
            return (self, false);
        }
        let sum = DoubleWord36::from_i128_wrapping(self.to_i128() + rhs.to_i128());
        let overflow = self.is_negative() == rhs.is_negative()
            && self.is_negative() != sum.is_negative();
        (sum, overflow)
    }

    /// Shift left, filling with zeroes; counts of 72 or more produce
    /// zero.
    #[must_use]
    pub const fn left_shift_logical(self, count: u32) -> DoubleWord36 {
        if count >= 72 {
            DoubleWord36::ZERO
        } else {
            DoubleWord36::from_bits(self.bits() << count)
        }
    }

    /// Rotate the 72-bit value left by `count` modulo 72.
    #[must_use]
    pub const fn left_shift_circular(self, count: u32) -> DoubleWord36 {
        let c = count % 72;
        if c == 0 {
            self
        } else {
            let b = self.bits();
            DoubleWord36::from_bits((b << c) | (b >> (72 - c)))
        }
    }

    #[must_use]
    pub const fn right_shift_logical(self, count: u32) -> DoubleWord36 {
        if count >= 72 {
            DoubleWord36::ZERO
        } else {
            DoubleWord36::from_bits(self.bits() >> count)
        }
    }

    /// Rotate the 72-bit value right by `count` modulo 72.
    #[must_use]
    pub const fn right_shift_circular(self, count: u32) -> DoubleWord36 {
        let c = count % 72;
        if c == 0 {
            self
        } else {
            let b = self.bits();
            DoubleWord36::from_bits((b >> c) | (b << (72 - c)))
        }
    }

    /// Shift right propagating the sign; counts of 71 or more leave
    /// only copies of the sign.
    #[must_use]
    pub const fn right_shift_algebraic(self, count: u32) -> DoubleWord36 {
        let negative = self.is_negative();
        if count >= 71 {
            if negative {
                DoubleWord36::from_bits(MASK72)
            } else {
                DoubleWord36::ZERO
            }
        } else if count == 0 {
            self
        } else if negative {
            DoubleWord36::from_bits((self.bits() >> count) | (MASK72 << (72 - count)))
        } else {
            DoubleWord36::from_bits(self.bits() >> count)
        }
    }

    /// Signed 36x36 bit multiply giving a 72-bit product.
    #[must_use]
    pub const fn multiply(a: Word36, b: Word36) -> DoubleWord36 {
        let product = (a.magnitude() as u128) * (b.magnitude() as u128);
        let result = DoubleWord36::from_bits(product);
        if a.is_negative() != b.is_negative() {
            result.negate()
        } else {
            result
        }
    }

    /// Signed 72/36 bit divide.  The quotient takes the sign of the
    /// exclusive-or of the operand signs, the remainder the sign of
    /// the dividend.
    #[must_use]
    pub const fn divide(self, divisor: Word36) -> DivideResult {
        let divisor_magnitude = divisor.magnitude() as u128;
        if divisor_magnitude == 0 {
            return DivideResult {
                quotient: Word36::ZERO,
                remainder: Word36::ZERO,
                divide_by_zero: true,
                overflow: false,
            };
        }
        let dividend_magnitude = self.magnitude();
        let q = dividend_magnitude / divisor_magnitude;
        let r = dividend_magnitude % divisor_magnitude;
        if q > Word36::MAX.bits() as u128 {
            return DivideResult {
                quotient: Word36::ZERO,
                remainder: Word36::ZERO,
                divide_by_zero: false,
                overflow: true,
            };
        }
        let mut quotient = Word36::masked(q as u64);
        let mut remainder = Word36::masked(r as u64);
        if self.is_negative() != divisor.is_negative() {
            quotient = quotient.negate();
        }
        if self.is_negative() {
            remainder = remainder.negate();
        }
        DivideResult {
            quotient,
            remainder,
            divide_by_zero: false,
            overflow: false,
        }
    }
}

impl WordCommon for DoubleWord36 {
    fn signum(&self) -> Sign {
        if self.magnitude() == 0 {
            Sign::Zero
        } else if self.is_negative() {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }
}

impl From<(Word36, Word36)> for DoubleWord36 {
    fn from((high, low): (Word36, Word36)) -> DoubleWord36 {
        DoubleWord36 { high, low }
    }
}

#[test]
fn sign_bit_is_bit_71() {
    let d = DoubleWord36::from_bits(1u128 << 71);
    assert!(d.is_negative());
    assert!(d.high.is_negative());
}
