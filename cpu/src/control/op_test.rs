//! Test instructions.
//!
//! A test whose condition holds skips the next instruction.  The
//! skip is made by moving the program counter on by two and holding
//! it there, which also ends an EXR search at the first hit.
use base::prelude::*;

use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};
use crate::breakpoint::BreakpointComparison;

/// Treatment of the operand of the masked tests: a full word, never
/// immediate.
const MASKED: Access = Access {
    register_transfer: false,
    ..Access::WORD
};

/// Bit 5, the low bit of S1, is the lock bit of the test-and-set
/// family.
const LOCK_BIT: u64 = 0o010_000_000_000;

fn greater_than_zero(w: Word36) -> bool {
    !w.is_negative() && !w.is_zero()
}

fn less_than_zero(w: Word36) -> bool {
    w.is_negative() && !w.is_zero()
}

/// A word in storage held under a storage lock.
struct LockedOperand {
    word: Word36,
    address: AbsoluteAddress,
    base_register: usize,
    relative: u64,
}

/// ## Test opcodes
///
/// - TNOP through TSKP: tests of U against zero (extended f050)
/// - TZ, TNZ, TP, TN: the same in basic mode
/// - TE, TNE, TLE, TG, TW, TNW, TGM, DTGM, DTE: tests of U against Aa
/// - TEP, TOP: parity tests
/// - TLEM: [`InstructionEngine::op_tlem`]
/// - MTE, MTNE, MTLE, MTG, MTW, MTNW, MATL, MATG: masked tests
/// - TS, TSS, TCS, CR, UNLK: the test-and-set family
impl InstructionEngine {
    fn skip(&mut self) {
        let pc = self.asp.par.program_counter;
        self.set_program_counter(pc + 2, true);
    }

    fn test(&mut self, access: Access, condition: impl FnOnce(&InstructionEngine, Word36) -> bool) -> OpResult {
        let Some(operand) = self.get_operand(access)? else {
            return Ok(Completion::Incomplete);
        };
        if condition(self, operand) {
            self.skip();
        }
        Ok(Completion::Complete)
    }

    fn test_operand(&mut self, condition: fn(Word36) -> bool) -> OpResult {
        self.test(Access::COMPARAND, |_, u| condition(u))
    }

    fn aa1(&self) -> Word36 {
        self.a_register(self.current_instruction().a() + 1)
    }

    /// TNOP references the operand but never skips.
    pub(crate) fn op_tnop(&mut self) -> OpResult {
        self.test_operand(|_| false)
    }

    pub(crate) fn op_tgz(&mut self) -> OpResult {
        self.test_operand(greater_than_zero)
    }

    pub(crate) fn op_tpz(&mut self) -> OpResult {
        self.test_operand(|u| u.is_positive_zero())
    }

    pub(crate) fn op_tp(&mut self) -> OpResult {
        self.test_operand(|u| !u.is_negative())
    }

    pub(crate) fn op_tmz(&mut self) -> OpResult {
        self.test_operand(|u| u.is_negative_zero())
    }

    pub(crate) fn op_tmzg(&mut self) -> OpResult {
        self.test_operand(|u| u.is_negative_zero() || greater_than_zero(u))
    }

    pub(crate) fn op_tz(&mut self) -> OpResult {
        self.test_operand(|u| u.is_zero())
    }

    pub(crate) fn op_tnlz(&mut self) -> OpResult {
        self.test_operand(|u| !less_than_zero(u))
    }

    pub(crate) fn op_tlz(&mut self) -> OpResult {
        self.test_operand(less_than_zero)
    }

    pub(crate) fn op_tnz(&mut self) -> OpResult {
        self.test_operand(|u| !u.is_zero())
    }

    pub(crate) fn op_tpzl(&mut self) -> OpResult {
        self.test_operand(|u| u.is_positive_zero() || less_than_zero(u))
    }

    pub(crate) fn op_tnmz(&mut self) -> OpResult {
        self.test_operand(|u| !u.is_negative_zero())
    }

    pub(crate) fn op_tn(&mut self) -> OpResult {
        self.test_operand(|u| u.is_negative())
    }

    pub(crate) fn op_tnpz(&mut self) -> OpResult {
        self.test_operand(|u| !u.is_positive_zero())
    }

    pub(crate) fn op_tngz(&mut self) -> OpResult {
        self.test_operand(|u| !greater_than_zero(u))
    }

    /// TSKP references the operand and always skips.
    pub(crate) fn op_tskp(&mut self) -> OpResult {
        self.test_operand(|_| true)
    }

    pub(crate) fn op_tz_basic(&mut self) -> OpResult {
        self.op_tz()
    }

    pub(crate) fn op_tnz_basic(&mut self) -> OpResult {
        self.op_tnz()
    }

    pub(crate) fn op_tp_basic(&mut self) -> OpResult {
        self.op_tp()
    }

    pub(crate) fn op_tn_basic(&mut self) -> OpResult {
        self.op_tn()
    }

    pub(crate) fn op_te(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u == e.aa())
    }

    pub(crate) fn op_tne(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u != e.aa())
    }

    pub(crate) fn op_tle(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u <= e.aa())
    }

    pub(crate) fn op_tg(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u > e.aa())
    }

    /// TW: skip if Aa < U <= Aa+1.
    pub(crate) fn op_tw(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| e.aa() < u && u <= e.aa1())
    }

    pub(crate) fn op_tnw(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| !(e.aa() < u && u <= e.aa1()))
    }

    /// TGM: skip if the magnitude of U exceeds Aa.
    pub(crate) fn op_tgm(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u.abs() > e.aa())
    }

    /// DTGM: skip if the magnitude of U,U+1 exceeds Aa,Aa+1.
    pub(crate) fn op_dtgm(&mut self) -> OpResult {
        let Some(words) = self.get_consecutive_operands(true, 2, false)? else {
            return Ok(Completion::Incomplete);
        };
        let operand = DoubleWord36::new(words[0], words[1]);
        let reference = DoubleWord36::new(self.aa(), self.aa1());
        if i128::try_from(operand.magnitude()).unwrap_or(i128::MAX) > reference.to_i128() {
            self.skip();
        }
        Ok(Completion::Complete)
    }

    /// DTE: skip if U,U+1 is identical to Aa,Aa+1.
    pub(crate) fn op_dte(&mut self) -> OpResult {
        let Some(words) = self.get_consecutive_operands(true, 2, false)? else {
            return Ok(Completion::Incomplete);
        };
        if words[0] == self.aa() && words[1] == self.aa1() {
            self.skip();
        }
        Ok(Completion::Complete)
    }

    /// TEP: skip if U AND Aa has an even number of bits set.
    pub(crate) fn op_tep(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u.and(e.aa().bits()).count_bits() % 2 == 0)
    }

    pub(crate) fn op_top(&mut self) -> OpResult {
        self.test(Access::COMPARAND, |e, u| u.and(e.aa().bits()).count_bits() % 2 != 0)
    }

    /// TLEM: skip if the low half of U does not exceed the modifier
    /// of Xa, then increment Xa.  In basic mode, when Xa is also the
    /// index register and F0.h is set, Xa is incremented only once.
    pub(crate) fn op_tlem(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::COMPARAND)? else {
            return Ok(Completion::Incomplete);
        };
        let ci = self.current_instruction();
        let xa = self.x_register(ci.a());
        if operand.h2() <= xa.xm() {
            self.skip();
        }
        if !(self.basic_mode() && ci.a() == ci.x() && ci.h() != 0) {
            let updated = self.x_register(ci.a()).increment_modifier();
            self.set_x_register(ci.a(), updated);
        }
        Ok(Completion::Complete)
    }

    /// Compare U and Aa (and Aa+1) under the mask in R2.
    fn masked_test(&mut self, condition: fn(Word36, Word36, Word36) -> bool) -> OpResult {
        let Some(operand) = self.get_operand(MASKED)? else {
            return Ok(Completion::Incomplete);
        };
        let mask = self.r_register(2).bits();
        if condition(operand.and(mask), self.aa().and(mask), self.aa1().and(mask)) {
            self.skip();
        }
        Ok(Completion::Complete)
    }

    pub(crate) fn op_mte(&mut self) -> OpResult {
        self.masked_test(|u, a, _| u == a)
    }

    pub(crate) fn op_mtne(&mut self) -> OpResult {
        self.masked_test(|u, a, _| u != a)
    }

    pub(crate) fn op_mtle(&mut self) -> OpResult {
        self.masked_test(|u, a, _| u <= a)
    }

    pub(crate) fn op_mtg(&mut self) -> OpResult {
        self.masked_test(|u, a, _| u > a)
    }

    pub(crate) fn op_mtw(&mut self) -> OpResult {
        self.masked_test(|u, a, a1| a < u && u <= a1)
    }

    pub(crate) fn op_mtnw(&mut self) -> OpResult {
        self.masked_test(|u, a, a1| !(a < u && u <= a1))
    }

    /// MATL: as MTLE but comparing the masked words as unsigned
    /// character strings.
    pub(crate) fn op_matl(&mut self) -> OpResult {
        self.masked_test(|u, a, _| u.bits() <= a.bits())
    }

    pub(crate) fn op_matg(&mut self) -> OpResult {
        self.masked_test(|u, a, _| u.bits() > a.bits())
    }

    /// Fetch the storage operand under a storage lock.  `Ok(None)`
    /// means the address is still being developed or another engine
    /// holds the lock.
    fn locked_operand(&mut self) -> Result<Option<LockedOperand>, Interrupt> {
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(None);
        };
        let base_register = self.operand_base_register(relative)?;
        let Some(address) = self.storage_operand(relative, 1, true, true, Access::LOCKED.lock)? else {
            return Ok(None);
        };
        self.increment_index_register();
        let word = self.storage.read(address)?;
        self.check_breakpoint(BreakpointComparison::Read, address);
        Ok(Some(LockedOperand {
            word,
            address,
            base_register,
            relative,
        }))
    }

    fn replace_locked(&mut self, operand: &LockedOperand, value: Word36) -> Result<(), Interrupt> {
        self.check_breakpoint(BreakpointComparison::Write, operand.address);
        self.storage.write(operand.address, value)
    }

    /// TS: if the lock bit is already set, raise a test-and-set
    /// interrupt; otherwise set it.
    pub(crate) fn op_ts(&mut self) -> OpResult {
        let Some(operand) = self.locked_operand()? else {
            return Ok(Completion::Incomplete);
        };
        if operand.word.bits() & LOCK_BIT != 0 {
            return Err(Interrupt::TestAndSet {
                base_register: operand.base_register as u64,
                relative_address: operand.relative,
            });
        }
        self.replace_locked(&operand, operand.word.with_s1(1))?;
        Ok(Completion::Complete)
    }

    /// TSS: set the lock bit and skip if it was clear.
    pub(crate) fn op_tss(&mut self) -> OpResult {
        let Some(operand) = self.locked_operand()? else {
            return Ok(Completion::Incomplete);
        };
        if operand.word.bits() & LOCK_BIT == 0 {
            self.replace_locked(&operand, operand.word.with_s1(1))?;
            self.skip();
        }
        Ok(Completion::Complete)
    }

    /// TCS: clear the lock bit and skip if it was set.
    pub(crate) fn op_tcs(&mut self) -> OpResult {
        let Some(operand) = self.locked_operand()? else {
            return Ok(Completion::Incomplete);
        };
        if operand.word.bits() & LOCK_BIT != 0 {
            self.replace_locked(&operand, operand.word.with_s1(0))?;
            self.skip();
        }
        Ok(Completion::Complete)
    }

    /// CR: if U equals Aa, replace it with Aa+1 and skip.
    pub(crate) fn op_cr(&mut self) -> OpResult {
        let Some(operand) = self.locked_operand()? else {
            return Ok(Completion::Incomplete);
        };
        if operand.word == self.aa() {
            let replacement = self.aa1();
            self.replace_locked(&operand, replacement)?;
            self.skip();
        }
        Ok(Completion::Complete)
    }

    /// UNLK: clear the lock bit.
    pub(crate) fn op_unlk(&mut self) -> OpResult {
        let Some(operand) = self.locked_operand()? else {
            return Ok(Completion::Incomplete);
        };
        self.replace_locked(&operand, operand.word.with_s1(0))?;
        Ok(Completion::Complete)
    }
}
