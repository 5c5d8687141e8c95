//! Instruction word and index register field layouts.
//!
//! | Field | Bits | Width | Meaning |
//! |---|---|---|---|
//! | f | 0..5 | 6 | function code |
//! | j | 6..9 | 4 | partial word or sub-function |
//! | a | 10..13 | 4 | register or sub-function |
//! | x | 14..17 | 4 | index register |
//! | h | 18 | 1 | index increment |
//! | i | 19 | 1 | indirect, or the high bit of b |
//! | b | 20..23 | 4 | base register (extended mode) |
//! | d | 24..35 | 12 | displacement (extended mode) |
//! | u | 20..35 | 16 | displacement (basic mode, jumps) |
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

#[cfg(test)]
use test_strategy::{proptest, Arbitrary};

use crate::onescomplement::word36::Word36;
use crate::onescomplement::{sign_extend_12, sign_extend_18, sign_extend_24};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct InstructionWord(Word36);

impl InstructionWord {
    #[must_use]
    pub const fn new(word: Word36) -> InstructionWord {
        InstructionWord(word)
    }

    /// Assemble an instruction from its fields, using the 16-bit `u`
    /// form for the address.
    #[must_use]
    pub const fn from_fields_u(f: u64, j: u64, a: u64, x: u64, h: u64, i: u64, u: u64) -> Self {
        InstructionWord(Word36::masked(
            ((f & 0o77) << 30)
                | ((j & 0o17) << 26)
                | ((a & 0o17) << 22)
                | ((x & 0o17) << 18)
                | ((h & 1) << 17)
                | ((i & 1) << 16)
                | (u & 0o177_777),
        ))
    }

    /// Assemble an instruction from its fields, using the extended
    /// mode `b` and `d` form for the address.
    #[must_use]
    pub const fn from_fields_bd(
        f: u64,
        j: u64,
        a: u64,
        x: u64,
        h: u64,
        i: u64,
        b: u64,
        d: u64,
    ) -> Self {
        InstructionWord::from_fields_u(f, j, a, x, h, i, ((b & 0o17) << 12) | (d & 0o7777))
    }

    #[must_use]
    pub const fn word(&self) -> Word36 {
        self.0
    }

    #[must_use]
    pub const fn f(&self) -> u64 {
        (self.0.bits() >> 30) & 0o77
    }

    #[must_use]
    pub const fn j(&self) -> u64 {
        (self.0.bits() >> 26) & 0o17
    }

    #[must_use]
    pub const fn a(&self) -> u64 {
        (self.0.bits() >> 22) & 0o17
    }

    #[must_use]
    pub const fn x(&self) -> u64 {
        (self.0.bits() >> 18) & 0o17
    }

    #[must_use]
    pub const fn h(&self) -> u64 {
        (self.0.bits() >> 17) & 0o1
    }

    #[must_use]
    pub const fn i(&self) -> u64 {
        (self.0.bits() >> 16) & 0o1
    }

    #[must_use]
    pub const fn b(&self) -> u64 {
        (self.0.bits() >> 12) & 0o17
    }

    /// The 5-bit base register field used in extended mode at
    /// processor privilege 0 or 1.
    #[must_use]
    pub const fn ib(&self) -> u64 {
        (self.i() << 4) | self.b()
    }

    #[must_use]
    pub const fn d(&self) -> u64 {
        self.0.bits() & 0o7777
    }

    #[must_use]
    pub const fn u(&self) -> u64 {
        self.0.bits() & 0o177_777
    }

    /// The h, i and u fields taken together as an 18-bit value.
    #[must_use]
    pub const fn hiu(&self) -> u64 {
        self.0.bits() & 0o777_777
    }

    /// Replace x, h, i and u from the corresponding fields of an
    /// indirect word.
    #[must_use]
    pub const fn with_xhiu(self, indirect: Word36) -> InstructionWord {
        let keep = self.0.bits() & 0o777_760_000_000;
        let take = indirect.bits() & 0o000_017_777_777;
        InstructionWord(Word36::masked(keep | take))
    }

    /// The same instruction with a different j field.
    #[must_use]
    pub const fn with_j(self, j: u64) -> InstructionWord {
        let keep = self.0.bits() & !(0o17 << 26) & Word36::MASK;
        InstructionWord(Word36::masked(keep | ((j & 0o17) << 26)))
    }
}

impl From<Word36> for InstructionWord {
    fn from(w: Word36) -> InstructionWord {
        InstructionWord(w)
    }
}

impl From<InstructionWord> for Word36 {
    fn from(i: InstructionWord) -> Word36 {
        i.0
    }
}

impl Display for InstructionWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f={:02o} j={:02o} a={:02o} x={:02o} h={} i={} u={:06o}",
            self.f(),
            self.j(),
            self.a(),
            self.x(),
            self.h(),
            self.i(),
            self.u()
        )
    }
}

/// Views of an index register.  The modifier occupies the low 18
/// (or, in 24-bit indexing, 24) bits and the increment the high 18
/// (or 12) bits.
pub trait IndexRegister {
    fn xm(&self) -> u64;
    fn xi(&self) -> u64;
    fn xm24(&self) -> u64;
    fn xi12(&self) -> u64;
    #[must_use]
    fn with_xm(self, modifier: u64) -> Self;
    #[must_use]
    fn with_xi(self, increment: u64) -> Self;
    #[must_use]
    fn with_xm24(self, modifier: u64) -> Self;
    #[must_use]
    fn with_xi12(self, increment: u64) -> Self;
    /// Add the signed increment to the signed modifier.
    #[must_use]
    fn increment_modifier(self) -> Self;
    #[must_use]
    fn increment_modifier24(self) -> Self;
}

impl IndexRegister for Word36 {
    fn xm(&self) -> u64 {
        self.h2()
    }

    fn xi(&self) -> u64 {
        self.h1()
    }

    fn xm24(&self) -> u64 {
        self.bits() & 0o77_777_777
    }

    fn xi12(&self) -> u64 {
        self.t1()
    }

    fn with_xm(self, modifier: u64) -> Self {
        self.with_h2(modifier)
    }

    fn with_xi(self, increment: u64) -> Self {
        self.with_h1(increment)
    }

    fn with_xm24(self, modifier: u64) -> Self {
        Word36::masked((self.bits() & 0o777_700_000_000) | (modifier & 0o77_777_777))
    }

    fn with_xi12(self, increment: u64) -> Self {
        self.with_t1(increment)
    }

    fn increment_modifier(self) -> Self {
        let m = Word36::masked(sign_extend_18(self.xm()));
        let i = Word36::masked(sign_extend_18(self.xi()));
        self.with_xm(m.add_simple(i).bits() & 0o777_777)
    }

    fn increment_modifier24(self) -> Self {
        let m = Word36::masked(sign_extend_24(self.xm24()));
        let i = Word36::masked(sign_extend_12(self.xi12()));
        self.with_xm24(m.add_simple(i).bits() & 0o77_777_777)
    }
}

#[test]
fn test_fields() {
    let iw = InstructionWord::from_fields_u(0o74, 0o13, 0o5, 0o11, 1, 0, 0o1234);
    assert_eq!(iw.f(), 0o74);
    assert_eq!(iw.j(), 0o13);
    assert_eq!(iw.a(), 0o5);
    assert_eq!(iw.x(), 0o11);
    assert_eq!(iw.h(), 1);
    assert_eq!(iw.i(), 0);
    assert_eq!(iw.u(), 0o1234);
    assert_eq!(iw.hiu(), 0o401234);

    let bd = InstructionWord::from_fields_bd(0o10, 0, 1, 0, 0, 1, 0o15, 0o7654);
    assert_eq!(bd.b(), 0o15);
    assert_eq!(bd.d(), 0o7654);
    assert_eq!(bd.ib(), 0o35);
}

#[test]
fn test_with_xhiu() {
    let iw = InstructionWord::from_fields_u(0o10, 0o1, 0o2, 0o3, 0, 1, 0o1000);
    let indirect = Word36::masked(0o777_745_002000);
    let updated = iw.with_xhiu(indirect);
    assert_eq!(updated.f(), 0o10);
    assert_eq!(updated.j(), 0o1);
    assert_eq!(updated.a(), 0o2);
    assert_eq!(updated.x(), 0o5);
    assert_eq!(updated.h(), 0);
    assert_eq!(updated.i(), 0);
    assert_eq!(updated.u(), 0o2000);
}

#[test]
fn test_increment_modifier() {
    let x = Word36::from_halves(0o2, 0o100);
    assert_eq!(x.increment_modifier().xm(), 0o102);
    // An increment of -1 (ones complement 18-bit) steps downwards.
    let x = Word36::from_halves(0o777_776, 0o100);
    assert_eq!(x.increment_modifier().xm(), 0o77);
    let x = Word36::masked(0o0001_00000010);
    assert_eq!(x.increment_modifier24().xm24(), 0o11);
}

#[cfg(test)]
#[derive(Debug, Arbitrary)]
struct Fields {
    #[strategy(0..0o100u64)]
    f: u64,
    #[strategy(0..0o20u64)]
    j: u64,
    #[strategy(0..0o20u64)]
    a: u64,
    #[strategy(0..0o20u64)]
    x: u64,
    #[strategy(0..2u64)]
    h: u64,
    #[strategy(0..2u64)]
    i: u64,
    #[strategy(0..0o200000u64)]
    u: u64,
}

#[cfg(test)]
#[proptest]
fn fields_survive_assembly(input: Fields) {
    let iw = InstructionWord::from_fields_u(input.f, input.j, input.a, input.x, input.h, input.i, input.u);
    assert_eq!(
        (iw.f(), iw.j(), iw.a(), iw.x(), iw.h(), iw.i(), iw.u()),
        (input.f, input.j, input.a, input.x, input.h, input.i, input.u)
    );
}
