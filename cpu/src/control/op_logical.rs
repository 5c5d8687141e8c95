use base::prelude::*;

use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};

/// ## Logical opcodes
///
/// Each combines U with Aa and leaves the result in Aa+1.
///
/// - OR: [`InstructionEngine::op_or`]
/// - XOR: [`InstructionEngine::op_xor`]
/// - AND: [`InstructionEngine::op_and`]
/// - MLU: [`InstructionEngine::op_mlu`]
impl InstructionEngine {
    fn logical(&mut self, combine: fn(u64, u64, u64) -> u64) -> OpResult {
        let Some(operand) = self.get_operand(Access::COMPARAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        let mask = self.r_register(2).bits();
        let result = combine(self.a_register(a).bits(), operand.bits(), mask);
        self.set_a_register(a + 1, Word36::masked(result));
        Ok(Completion::Complete)
    }

    pub(crate) fn op_or(&mut self) -> OpResult {
        self.logical(|aa, u, _| aa | u)
    }

    pub(crate) fn op_xor(&mut self) -> OpResult {
        self.logical(|aa, u, _| aa ^ u)
    }

    pub(crate) fn op_and(&mut self) -> OpResult {
        self.logical(|aa, u, _| aa & u)
    }

    /// MLU: bits of U where R2 is set, bits of Aa elsewhere.
    pub(crate) fn op_mlu(&mut self) -> OpResult {
        self.logical(|aa, u, mask| (u & mask) | (aa & !mask))
    }
}
