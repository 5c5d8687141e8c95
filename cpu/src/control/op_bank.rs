use base::prelude::*;
use tracing::{event, Level};

use super::bankmanip::{Abort, BankManipulator, Operation};
use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};
use crate::asp::ActivityStatePacket;

/// Base registers loaded by LAE.
const LAE_BASE_REGISTERS: usize = 15;

/// ## Bank opcodes
///
/// All of these go through the bank manipulator.
///
/// - LBU, LBE, LAE: base register loads
/// - CALL, GOTO, LOCL, RTN: extended mode transfers
/// - LBJ, LDJ, LIJ: basic mode transfers
/// - UR: [`InstructionEngine::op_ur`]
impl InstructionEngine {
    /// Turn the outcome of the manipulator into an instruction
    /// outcome.  A stop leaves the instruction in F0, to be retried
    /// once the stop is cleared.
    fn manipulate(&mut self, manipulator: BankManipulator) -> OpResult {
        match manipulator.run(self) {
            Ok(()) => Ok(Completion::Complete),
            Err(Abort::Interrupt(interrupt)) => Err(interrupt),
            Err(Abort::Stop(reason, detail)) => {
                self.stop(reason, detail);
                Ok(Completion::Incomplete)
            }
        }
    }

    fn load_bank(&mut self, operation: Operation) -> OpResult {
        let Some(operand) = self.get_operand(Access::WORD)? else {
            return Ok(Completion::Incomplete);
        };
        self.manipulate(BankManipulator::for_instruction(operation, operand))
    }

    /// LBU: load Ba (B2 through B15) from the bank named by U.
    pub(crate) fn op_lbu(&mut self) -> OpResult {
        self.load_bank(Operation::Lbu)
    }

    /// LBE: load B(16+a).
    pub(crate) fn op_lbe(&mut self) -> OpResult {
        self.require_privilege(0)?;
        self.load_bank(Operation::Lbe)
    }

    /// LAE: load B1 through B15 from fifteen consecutive words.  If
    /// any one load fails, none of them happen.
    pub(crate) fn op_lae(&mut self) -> OpResult {
        let Some(operands) = self.get_consecutive_operands(true, LAE_BASE_REGISTERS as u64, false)? else {
            return Ok(Completion::Incomplete);
        };
        let snapshot = self.snapshot();
        for (n, operand) in operands.into_iter().enumerate() {
            let outcome = self.manipulate(BankManipulator::for_lae(n + 1, operand));
            if !matches!(outcome, Ok(Completion::Complete)) {
                self.restore(snapshot);
                return outcome;
            }
        }
        Ok(Completion::Complete)
    }

    /// UR: rebuild the activity state packet from seven consecutive
    /// words and load B0 from the bank its PAR names.
    pub(crate) fn op_ur(&mut self) -> OpResult {
        self.require_privilege(0)?;
        let Some(operands) = self.get_consecutive_operands(true, ActivityStatePacket::UR_OPERAND_WORDS, false)? else {
            return Ok(Completion::Incomplete);
        };
        event!(Level::DEBUG, "{}: user return to {}", self.name, operands[0]);
        self.manipulate(BankManipulator::for_user_return(operands))
    }

    /// CALL: transfer to the L,BDI,offset at U, leaving a return point
    /// on the return control stack.
    pub(crate) fn op_call(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::WORD)? else {
            return Ok(Completion::Incomplete);
        };
        self.manipulate(BankManipulator::for_instruction(Operation::Call, operand))
    }

    pub(crate) fn op_goto(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::WORD)? else {
            return Ok(Completion::Incomplete);
        };
        self.manipulate(BankManipulator::for_instruction(Operation::Goto, operand))
    }

    /// LOCL: a call to U within the current bank.
    pub(crate) fn op_locl(&mut self) -> OpResult {
        self.jump_through_manipulator(Operation::Locl)
    }

    /// RTN: return through the frame on top of the return control
    /// stack.  There is no operand.
    pub(crate) fn op_rtn(&mut self) -> OpResult {
        self.manipulate(BankManipulator::for_instruction(Operation::Rtn, Word36::ZERO))
    }

    /// The jump is recorded, and Xx incremented, only if the
    /// manipulation completes.
    fn jump_through_manipulator(&mut self, operation: Operation) -> OpResult {
        let from = self.current_virtual_address();
        let snapshot = self.snapshot();
        let Some(target) = self.get_jump_operand()? else {
            return Ok(Completion::Incomplete);
        };
        let outcome = self.manipulate(BankManipulator::for_instruction(operation, Word36::masked(target)));
        if matches!(outcome, Ok(Completion::Complete)) {
            self.record_jump(from);
        } else {
            self.restore(snapshot);
        }
        outcome
    }

    /// LxJ through X0 is not defined.
    fn lxj(&mut self, operation: Operation) -> OpResult {
        if self.current_instruction().a() == 0 {
            return Err(Interrupt::InvalidInstruction(InvalidInstructionReason::BadFunctionCode));
        }
        self.jump_through_manipulator(operation)
    }

    /// LBJ: jump to U in the bank named by Xa, based on B(12+Xa.BDR).
    pub(crate) fn op_lbj(&mut self) -> OpResult {
        self.lxj(Operation::Lbj)
    }

    /// LDJ: as LBJ, through the data bank base register (B14 or B15
    /// per DB31).
    pub(crate) fn op_ldj(&mut self) -> OpResult {
        self.lxj(Operation::Ldj)
    }

    /// LIJ: as LBJ, through the instruction bank base register (B12
    /// or B13 per DB31).
    pub(crate) fn op_lij(&mut self) -> OpResult {
        self.lxj(Operation::Lij)
    }
}
