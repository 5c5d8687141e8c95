//! Shifts.
//!
//! The shift count is the low seven bits of U; no storage is
//! referenced.  The plain shifts move right, the L-prefixed ones move
//! left.  Single shifts act on Aa, double shifts on Aa and Aa+1 as
//! one 72-bit value.
use base::prelude::*;

use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};

/// The number of places a word must be rotated left to bring it to
/// the normalized form where bit 0 differs from bit 1.  A word of all
/// ones or all zeroes normalizes after 35 places.
fn normalizing_count(value: Word36) -> u32 {
    let mut word = value;
    for count in 0..35 {
        let bits = word.bits();
        if ((bits >> 35) ^ (bits >> 34)) & 1 != 0 {
            return count;
        }
        word = word.left_shift_circular(1);
    }
    35
}

fn normalizing_count_double(value: DoubleWord36) -> u32 {
    let mut dw = value;
    for count in 0..71 {
        let bits = dw.bits();
        if ((bits >> 71) ^ (bits >> 70)) & 1 != 0 {
            return count;
        }
        dw = dw.left_shift_circular(1);
    }
    71
}

/// ## Shift opcodes
///
/// - SSC, DSC, SSL, DSL, SSA, DSA: right shifts
/// - LSSC, LDSC, LSSL, LDSL: left shifts
/// - LSC, DLSC: [`InstructionEngine::op_lsc`], [`InstructionEngine::op_dlsc`]
impl InstructionEngine {
    /// Develop U and return the shift count it encodes.
    fn shift_count(&mut self) -> Result<Option<u32>, Interrupt> {
        Ok(self.immediate_address()?.map(|relative| (relative & 0o177) as u32))
    }

    fn shift_single(&mut self, shift: fn(Word36, u32) -> Word36) -> OpResult {
        let Some(count) = self.shift_count()? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let value = shift(self.a_register(a), count);
        self.set_a_register(a, value);
        Ok(Completion::Complete)
    }

    fn shift_double(&mut self, shift: fn(DoubleWord36, u32) -> DoubleWord36) -> OpResult {
        let Some(count) = self.shift_count()? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let value = shift(DoubleWord36::new(self.a_register(a), self.a_register(a + 1)), count);
        self.set_a_register(a, value.high);
        self.set_a_register(a + 1, value.low);
        Ok(Completion::Complete)
    }

    pub(crate) fn op_ssc(&mut self) -> OpResult {
        self.shift_single(Word36::right_shift_circular)
    }

    pub(crate) fn op_dsc(&mut self) -> OpResult {
        self.shift_double(DoubleWord36::right_shift_circular)
    }

    pub(crate) fn op_ssl(&mut self) -> OpResult {
        self.shift_single(Word36::right_shift_logical)
    }

    pub(crate) fn op_dsl(&mut self) -> OpResult {
        self.shift_double(DoubleWord36::right_shift_logical)
    }

    pub(crate) fn op_ssa(&mut self) -> OpResult {
        self.shift_single(Word36::right_shift_algebraic)
    }

    pub(crate) fn op_dsa(&mut self) -> OpResult {
        self.shift_double(DoubleWord36::right_shift_algebraic)
    }

    pub(crate) fn op_lssc(&mut self) -> OpResult {
        self.shift_single(Word36::left_shift_circular)
    }

    pub(crate) fn op_ldsc(&mut self) -> OpResult {
        self.shift_double(DoubleWord36::left_shift_circular)
    }

    pub(crate) fn op_lssl(&mut self) -> OpResult {
        self.shift_single(Word36::left_shift_logical)
    }

    pub(crate) fn op_ldsl(&mut self) -> OpResult {
        self.shift_double(DoubleWord36::left_shift_logical)
    }

    /// LSC: load U into Aa, normalize it by rotating left, and put
    /// the number of places rotated in Aa+1.
    pub(crate) fn op_lsc(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let count = normalizing_count(operand);
        let a = self.current_instruction().a();
        self.set_a_register(a, operand.left_shift_circular(count));
        self.set_a_register(a + 1, Word36::masked(u64::from(count)));
        Ok(Completion::Complete)
    }

    /// DLSC: as LSC for the 72-bit value at U and U+1; the count goes
    /// to Aa+2.
    pub(crate) fn op_dlsc(&mut self) -> OpResult {
        let Some(words) = self.get_consecutive_operands(true, 2, false)? else {
            return Ok(Completion::Incomplete);
        };
        let value = DoubleWord36::new(words[0], words[1]);
        let count = normalizing_count_double(value);
        let shifted = value.left_shift_circular(count);
        let a = self.current_instruction().a();
        self.set_a_register(a, shifted.high);
        self.set_a_register(a + 1, shifted.low);
        self.set_a_register(a + 2, Word36::masked(u64::from(count)));
        Ok(Completion::Complete)
    }
}
