use base::prelude::*;
use tracing::{event, Level};

use super::{Completion, InstructionEngine, OpResult};
use crate::breakpoint::BreakpointComparison;
use crate::grs;
use crate::stop::StopReason;

/// ## Jump opcodes
///
/// - J, JK, HKJ, HLTJ: unconditional jumps
/// - JZ, JNZ, JP, JN, JB, JNB: jumps on Aa
/// - JPS, JNS: jumps on the sign of Aa, which is then rotated
/// - DJZ: [`InstructionEngine::op_djz`]
/// - JGD, JMGI: jumps which count
/// - JO, JNO, JC, JNC, JFU, JNFU, JFO, JNFO, JDF, JNDF: jumps on
///   designator bits
/// - LMJ, SLJ: jumps which leave a return address
/// - AAIJ, PAIJ: jumps which change DB14
impl InstructionEngine {
    /// Check that control can pass to `target`.  Nothing is changed.
    ///
    /// In basic mode the target must lie in one of B12 to B15.
    fn jump_destination(&self, target: u64) -> Result<Destination, Interrupt> {
        let bank = if self.basic_mode() {
            Some(self.basic_mode_bank_for(target)?)
        } else {
            None
        };
        Ok(Destination { target, bank })
    }

    /// Transfer control.  The program counter will not be advanced
    /// past the target.
    ///
    /// If a basic mode target lies in the other pair from the bank
    /// being executed, DB31 is flipped so that the next fetch looks in
    /// the target's pair first.
    fn complete_jump(&mut self, destination: Destination) {
        let from = self.current_virtual_address();
        self.record_jump(from);
        if let Some(brx) = destination.bank {
            if brx & 1 != self.fetch_base_register & 1 {
                let db31 = self.asp.dr.basic_mode_base_register_selection();
                self.asp.dr.set_basic_mode_base_register_selection(!db31);
            }
            if brx != self.fetch_base_register {
                self.fetch_base_register = 0;
            }
        }
        event!(Level::TRACE, "{}: jump to {:o}", self.name, destination.target);
        self.set_program_counter(destination.target, true);
    }

    /// Develop the jump target, and jump if `taken` holds.  Xx and the
    /// registers `update` touches are changed only once the target is
    /// known to be good, so a rejected jump leaves no trace.
    fn jump_and_update(
        &mut self,
        taken: impl FnOnce(&InstructionEngine) -> bool,
        update: impl FnOnce(&mut InstructionEngine),
    ) -> OpResult {
        let Some(target) = self.resolve_relative_address(true)? else {
            return Ok(Completion::Incomplete);
        };
        let destination = if taken(self) {
            Some(self.jump_destination(target)?)
        } else {
            None
        };
        self.increment_index_register();
        update(self);
        if let Some(destination) = destination {
            self.complete_jump(destination);
        }
        Ok(Completion::Complete)
    }

    fn jump_if(&mut self, taken: impl FnOnce(&InstructionEngine) -> bool) -> OpResult {
        self.jump_and_update(taken, |_| {})
    }

    pub(crate) fn op_j(&mut self) -> OpResult {
        self.jump_if(|_| true)
    }

    /// JK: no jump keys are ever set, so this never jumps.
    pub(crate) fn op_jk(&mut self) -> OpResult {
        self.jump_if(|_| false)
    }

    /// HKJ: no halt keys are ever set, so this is an unconditional
    /// jump.
    pub(crate) fn op_hkj(&mut self) -> OpResult {
        self.jump_if(|_| true)
    }

    /// HLTJ jumps and then stops the processor.
    pub(crate) fn op_hltj(&mut self) -> OpResult {
        self.require_privilege(0)?;
        let outcome = self.jump_if(|_| true)?;
        if outcome == Completion::Complete {
            self.stop(StopReason::HaltJumpExecuted, Word36::ZERO);
        }
        Ok(outcome)
    }

    pub(crate) fn op_jz(&mut self) -> OpResult {
        self.jump_if(|e| e.aa().is_zero())
    }

    pub(crate) fn op_jnz(&mut self) -> OpResult {
        self.jump_if(|e| !e.aa().is_zero())
    }

    pub(crate) fn op_jp(&mut self) -> OpResult {
        self.jump_if(|e| !e.aa().is_negative())
    }

    pub(crate) fn op_jn(&mut self) -> OpResult {
        self.jump_if(|e| e.aa().is_negative())
    }

    pub(crate) fn op_jb(&mut self) -> OpResult {
        self.jump_if(|e| e.aa().bits() & 1 != 0)
    }

    pub(crate) fn op_jnb(&mut self) -> OpResult {
        self.jump_if(|e| e.aa().bits() & 1 == 0)
    }

    fn jump_on_sign(&mut self, negative: bool) -> OpResult {
        let a = self.current_instruction().a();
        let aa = self.a_register(a);
        self.jump_and_update(
            |_| aa.is_negative() == negative,
            |e| e.set_a_register(a, aa.left_shift_circular(1)),
        )
    }

    /// JPS: jump if Aa is positive; Aa is rotated left one place
    /// either way.
    pub(crate) fn op_jps(&mut self) -> OpResult {
        self.jump_on_sign(false)
    }

    pub(crate) fn op_jns(&mut self) -> OpResult {
        self.jump_on_sign(true)
    }

    /// DJZ: jump if Aa,Aa+1 is a double-length zero of either sign.
    pub(crate) fn op_djz(&mut self) -> OpResult {
        self.jump_if(|e| {
            let a = e.current_instruction().a();
            let (high, low) = (e.a_register(a), e.a_register(a + 1));
            (high.is_positive_zero() && low.is_positive_zero()) || (high.is_negative_zero() && low.is_negative_zero())
        })
    }

    /// JGD: the GRS register named by the j and a fields together is
    /// tested and then decremented.  The jump is taken if it was
    /// greater than zero.
    pub(crate) fn op_jgd(&mut self) -> OpResult {
        let ci = self.current_instruction();
        let index = ((ci.j() << 4) | ci.a()) & 0o177;
        let pp = self.processor_privilege();
        if !grs::is_readable(index, pp) || !grs::is_writable(index, pp) {
            return Err(Interrupt::ReferenceViolation {
                kind: ReferenceViolationKind::Grs,
                fetch: false,
            });
        }
        let value = self.grs.get(index);
        self.jump_and_update(
            |_| value.is_positive() && !value.is_zero(),
            |e| e.grs.set(index, value.add_simple(Word36::NEGATIVE_ONE)),
        )
    }

    /// JMGI: jump if the modifier of Xa is greater than zero; Xa is
    /// then incremented.
    pub(crate) fn op_jmgi(&mut self) -> OpResult {
        let a = self.current_instruction().a();
        let xreg = self.x_register(a);
        let (modifier, updated) = if self.indexing_24bit() {
            (sign_extend_24(xreg.xm24()), xreg.increment_modifier24())
        } else {
            (sign_extend_18(xreg.xm()), xreg.increment_modifier())
        };
        let modifier = Word36::masked(modifier);
        self.jump_and_update(
            |_| modifier.is_positive() && !modifier.is_zero(),
            |e| e.set_x_register(a, updated),
        )
    }

    pub(crate) fn op_jo(&mut self) -> OpResult {
        self.jump_if(|e| e.asp.dr.overflow())
    }

    pub(crate) fn op_jno(&mut self) -> OpResult {
        self.jump_if(|e| !e.asp.dr.overflow())
    }

    pub(crate) fn op_jc(&mut self) -> OpResult {
        self.jump_if(|e| e.asp.dr.carry())
    }

    pub(crate) fn op_jnc(&mut self) -> OpResult {
        self.jump_if(|e| !e.asp.dr.carry())
    }

    pub(crate) fn op_jfu(&mut self) -> OpResult {
        self.jump_if(|e| e.asp.dr.characteristic_underflow())
    }

    pub(crate) fn op_jnfu(&mut self) -> OpResult {
        self.jump_if(|e| !e.asp.dr.characteristic_underflow())
    }

    pub(crate) fn op_jfo(&mut self) -> OpResult {
        self.jump_if(|e| e.asp.dr.characteristic_overflow())
    }

    pub(crate) fn op_jnfo(&mut self) -> OpResult {
        self.jump_if(|e| !e.asp.dr.characteristic_overflow())
    }

    pub(crate) fn op_jdf(&mut self) -> OpResult {
        self.jump_if(|e| e.asp.dr.divide_check())
    }

    pub(crate) fn op_jndf(&mut self) -> OpResult {
        self.jump_if(|e| !e.asp.dr.divide_check())
    }

    /// LMJ: put the address of the following instruction in the
    /// modifier of Xa, then jump.
    pub(crate) fn op_lmj(&mut self) -> OpResult {
        let a = self.current_instruction().a();
        let return_address = self.asp.par.program_counter + 1;
        self.jump_and_update(
            |_| true,
            |e| {
                let xreg = e.x_register(a).with_xm(return_address);
                e.set_x_register(a, xreg);
            },
        )
    }

    /// SLJ (basic mode): store the address of the following
    /// instruction in H2 of the word at U and continue at U+1.
    pub(crate) fn op_slj(&mut self) -> OpResult {
        let Some(target) = self.resolve_relative_address(true)? else {
            return Ok(Completion::Incomplete);
        };
        let destination = self.jump_destination(target)?;
        let Some(address) = self.storage_operand(target, 1, true, true, false)? else {
            return Ok(Completion::Incomplete);
        };
        let return_address = (self.asp.par.program_counter + 1) & 0o777_777;
        let word = self.storage.read(address)?.with_h2(return_address);
        self.increment_index_register();
        self.check_breakpoint(BreakpointComparison::Write, address);
        self.storage.write(address, word)?;
        self.complete_jump(destination);
        self.prevent_pc_update = false;
        Ok(Completion::Complete)
    }

    /// AAIJ: allow deferrable interrupts (set DB14) and jump.
    pub(crate) fn op_aaij(&mut self) -> OpResult {
        self.jump_and_update(|_| true, |e| e.asp.dr.set_deferrable_interrupts_enabled(true))
    }

    /// PAIJ: prevent deferrable interrupts (clear DB14) and jump.
    pub(crate) fn op_paij(&mut self) -> OpResult {
        self.jump_and_update(|_| true, |e| e.asp.dr.set_deferrable_interrupts_enabled(false))
    }
}

/// A jump target which has been checked.
#[derive(Debug, Clone, Copy)]
struct Destination {
    target: u64,
    bank: Option<usize>,
}
