//! Fixed-point binary arithmetic.
//!
//! The add family records carry (DB18) and overflow (DB19) in the
//! designator register.  An overflow with operation traps enabled
//! (DB24) posts an operation trap interrupt, which is taken once the
//! instruction has completed.  Divide check (DB23) is latched for a
//! zero divisor or a quotient too large to represent, and raises an
//! arithmetic exception when DB29 is set.
use base::prelude::*;

use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};

/// Ones-complement add of two `width`-bit fields with end-around
/// carry.  Adding negative zero to negative zero gives negative zero.
fn add_field(a: u64, b: u64, width: u32) -> u64 {
    let mask = (1u64 << width) - 1;
    let sum = (a & mask) + (b & mask);
    if sum > mask {
        (sum & mask) + 1
    } else {
        sum
    }
}

fn negate_field(v: u64, width: u32) -> u64 {
    !v & ((1u64 << width) - 1)
}

/// ## Fixed-point binary opcodes
///
/// - AA, ANA, AMA, ANMA, AU, ANU: [`InstructionEngine::op_aa`] and friends
/// - AX, ANX: [`InstructionEngine::op_ax`], [`InstructionEngine::op_anx`]
/// - MI, MSI, MF: [`InstructionEngine::op_mi`] and friends
/// - DI, DSF, DF: [`InstructionEngine::op_di`] and friends
/// - DA, DAN: [`InstructionEngine::op_da`], [`InstructionEngine::op_dan`]
/// - AH, ANH, AT, ANT: [`InstructionEngine::op_ah`] and friends
impl InstructionEngine {
    fn record_add(&mut self, carry: bool, overflow: bool) {
        self.asp.dr.set_carry(carry);
        self.asp.dr.set_overflow(overflow);
        if overflow && self.asp.dr.operation_trap_enabled() {
            self.post_interrupt(Interrupt::OperationTrap(OperationTrapReason::FixedPointBinaryOverflow));
        }
    }

    fn divide_check(&mut self) {
        self.asp.dr.set_divide_check(true);
        if self.asp.dr.arithmetic_exception_enabled() {
            self.post_interrupt(Interrupt::ArithmeticException(ArithmeticExceptionReason::DivideCheck));
        }
    }

    /// Add `transform(U)` to Aa and put the sum in Aa+`dest_offset`.
    fn add_to_a(&mut self, transform: fn(Word36) -> Word36, dest_offset: u64) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let result = self.a_register(a).add_with_flags(transform(operand));
        self.set_a_register(a + dest_offset, result.sum);
        self.record_add(result.carry, result.overflow);
        Ok(Completion::Complete)
    }

    pub(crate) fn op_aa(&mut self) -> OpResult {
        self.add_to_a(|v| v, 0)
    }

    pub(crate) fn op_ana(&mut self) -> OpResult {
        self.add_to_a(Word36::negate, 0)
    }

    pub(crate) fn op_ama(&mut self) -> OpResult {
        self.add_to_a(Word36::abs, 0)
    }

    pub(crate) fn op_anma(&mut self) -> OpResult {
        self.add_to_a(|v| v.abs().negate(), 0)
    }

    pub(crate) fn op_au(&mut self) -> OpResult {
        self.add_to_a(|v| v, 1)
    }

    pub(crate) fn op_anu(&mut self) -> OpResult {
        self.add_to_a(Word36::negate, 1)
    }

    fn add_to_x(&mut self, negative: bool) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let addend = if negative { operand.negate() } else { operand };
        let a = self.current_instruction().a();
        let result = self.x_register(a).add_with_flags(addend);
        self.set_x_register(a, result.sum);
        self.record_add(result.carry, result.overflow);
        Ok(Completion::Complete)
    }

    pub(crate) fn op_ax(&mut self) -> OpResult {
        self.add_to_x(false)
    }

    pub(crate) fn op_anx(&mut self) -> OpResult {
        self.add_to_x(true)
    }

    /// MI: Aa,Aa+1 gets the 72-bit product of Aa and U.
    pub(crate) fn op_mi(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let product = DoubleWord36::multiply(self.a_register(a), operand);
        self.set_a_register(a, product.high);
        self.set_a_register(a + 1, product.low);
        Ok(Completion::Complete)
    }

    /// MSI: Aa gets the product of Aa and U, which must fit in a
    /// single word.
    pub(crate) fn op_msi(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let product = DoubleWord36::multiply(self.a_register(a), operand);
        let limit = i128::from(Word36::MAX.to_i64());
        let value = product.to_i128();
        if (-limit..=limit).contains(&value) {
            self.set_a_register(a, Word36::from_i64_wrapping(value as i64));
        } else {
            self.set_a_register(a, product.low);
            self.asp.dr.set_overflow(true);
            if self.asp.dr.operation_trap_enabled() {
                self.post_interrupt(Interrupt::OperationTrap(OperationTrapReason::MultiplySingleIntegerOverflow));
            }
        }
        Ok(Completion::Complete)
    }

    /// MF: fractional multiply.  The 72-bit product is shifted left
    /// one place so that the binary point follows the sign bit.
    pub(crate) fn op_mf(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let product = DoubleWord36::multiply(self.a_register(a), operand).left_shift_circular(1);
        self.set_a_register(a, product.high);
        self.set_a_register(a + 1, product.low);
        Ok(Completion::Complete)
    }

    /// Divide `dividend` by U.  On success `store` receives the
    /// quotient and remainder.
    fn divide(&mut self, dividend: DoubleWord36, store: fn(&mut InstructionEngine, u64, DivideResult)) -> OpResult {
        let Some(divisor) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let result = dividend.divide(divisor);
        if result.divide_by_zero || result.overflow {
            self.divide_check();
        } else {
            let a = self.current_instruction().a();
            store(self, a, result);
        }
        Ok(Completion::Complete)
    }

    fn a_pair(&self) -> DoubleWord36 {
        let a = self.current_instruction().a();
        DoubleWord36::new(self.a_register(a), self.a_register(a + 1))
    }

    /// DI: Aa,Aa+1 divided by U; quotient to Aa, remainder to Aa+1.
    pub(crate) fn op_di(&mut self) -> OpResult {
        let dividend = self.a_pair();
        self.divide(dividend, |e, a, r| {
            e.set_a_register(a, r.quotient);
            e.set_a_register(a + 1, r.remainder);
        })
    }

    /// DSF: Aa, extended with its sign and shifted right one place,
    /// divided by U; the quotient goes to Aa+1.
    pub(crate) fn op_dsf(&mut self) -> OpResult {
        let aa = self.a_register(self.current_instruction().a());
        let fill = if aa.is_negative() { Word36::NEGATIVE_ZERO } else { Word36::ZERO };
        let dividend = DoubleWord36::new(aa, fill).right_shift_algebraic(1);
        self.divide(dividend, |e, a, r| e.set_a_register(a + 1, r.quotient))
    }

    /// DF: Aa,Aa+1 shifted right one place, divided by U.
    pub(crate) fn op_df(&mut self) -> OpResult {
        let dividend = self.a_pair().right_shift_algebraic(1);
        self.divide(dividend, |e, a, r| {
            e.set_a_register(a, r.quotient);
            e.set_a_register(a + 1, r.remainder);
        })
    }

    fn add_double(&mut self, negative: bool) -> OpResult {
        let Some(words) = self.get_consecutive_operands(true, 2, false)? else {
            return Ok(Completion::Incomplete);
        };
        let operand = DoubleWord36::new(words[0], words[1]);
        let addend = if negative { operand.negate() } else { operand };
        let augend = self.a_pair();
        let (sum, overflow) = augend.add(addend);
        let carry = (augend.is_negative() && addend.is_negative())
            || (augend.is_negative() != addend.is_negative() && !sum.is_negative());
        let a = self.current_instruction().a();
        self.set_a_register(a, sum.high);
        self.set_a_register(a + 1, sum.low);
        self.record_add(carry, overflow);
        Ok(Completion::Complete)
    }

    pub(crate) fn op_da(&mut self) -> OpResult {
        self.add_double(false)
    }

    pub(crate) fn op_dan(&mut self) -> OpResult {
        self.add_double(true)
    }

    /// Add U to Aa field by field, with no carry between fields.
    fn add_fields(&mut self, width: u32, negative: bool) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let augend = self.a_register(a).bits();
        let mask = (1u64 << width) - 1;
        let mut result = 0;
        for shift in (0..36).step_by(width as usize) {
            let mut addend = (operand.bits() >> shift) & mask;
            if negative {
                addend = negate_field(addend, width);
            }
            result |= add_field((augend >> shift) & mask, addend, width) << shift;
        }
        self.set_a_register(a, Word36::masked(result));
        Ok(Completion::Complete)
    }

    pub(crate) fn op_ah(&mut self) -> OpResult {
        self.add_fields(18, false)
    }

    pub(crate) fn op_anh(&mut self) -> OpResult {
        self.add_fields(18, true)
    }

    pub(crate) fn op_at(&mut self) -> OpResult {
        self.add_fields(12, false)
    }

    pub(crate) fn op_ant(&mut self) -> OpResult {
        self.add_fields(12, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_add_end_around_carry() {
        assert_eq!(add_field(0o777_776, 0o000_002, 18), 0o000_001);
        assert_eq!(add_field(0o777_777, 0o777_777, 18), 0o777_777);
        assert_eq!(add_field(0o000_005, negate_field(0o000_005, 18), 18), 0o777_777);
        assert_eq!(add_field(0o0007, 0o0001, 12), 0o0010);
    }
}
