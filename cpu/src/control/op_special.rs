use base::prelude::*;
use rand::Rng;
use tracing::{event, Level};

use super::operand::Access;
use super::{tables, Completion, InstructionEngine, OpResult};

/// Words stored by RNGI and RNGB.
const RANDOM_WORDS: usize = 4;

/// ## Special opcodes
///
/// - EX, EXR: [`InstructionEngine::op_ex`], [`InstructionEngine::op_exr`]
/// - NOP: [`InstructionEngine::op_nop`]
/// - DCB: [`InstructionEngine::op_dcb`]
/// - RNGI, RNGB: [`InstructionEngine::op_rngi`], [`InstructionEngine::op_rngb`]
impl InstructionEngine {
    /// Make `target` the instruction in F0.  It is dispatched on the
    /// next cycle.
    fn replace_f0(&mut self, target: Word36) {
        self.asp.current_instruction = InstructionWord::new(target);
        self.cached_handler = None;
        self.instruction_point = InterruptPoint::IndirectExecute;
    }

    /// EX: execute the instruction at U.
    pub(crate) fn op_ex(&mut self) -> OpResult {
        let Some(target) = self.get_operand(Access::STORAGE_WORD)? else {
            return Ok(Completion::Incomplete);
        };
        event!(Level::TRACE, "{}: EX target {target}", self.name);
        self.replace_f0(target);
        Ok(Completion::Incomplete)
    }

    /// EXR: execute the instruction at U repeatedly, R1 times.
    pub(crate) fn op_exr(&mut self) -> OpResult {
        let Some(target) = self.get_operand(Access::STORAGE_WORD)? else {
            return Ok(Completion::Incomplete);
        };
        if !tables::exr_allowed(InstructionWord::new(target)) {
            return Err(Interrupt::InvalidInstruction(InvalidInstructionReason::ExrInvalidTarget));
        }
        event!(Level::TRACE, "{}: EXR target {target} count {}", self.name, self.r_register(1));
        self.replace_f0(target);
        self.asp.ikr.executing_repeated = true;
        Ok(Completion::Incomplete)
    }

    /// NOP: develop U with all its checks and index incrementation,
    /// but do nothing with it.
    pub(crate) fn op_nop(&mut self) -> OpResult {
        self.ignore_operand()
    }

    /// DCB: Aa gets the number of bits set in U and U+1.
    pub(crate) fn op_dcb(&mut self) -> OpResult {
        let Some(words) = self.get_consecutive_operands(true, 2, false)? else {
            return Ok(Completion::Incomplete);
        };
        let count = words.iter().map(Word36::count_bits).sum::<u32>();
        let a = self.current_instruction().a();
        self.set_a_register(a, Word36::masked(u64::from(count)));
        Ok(Completion::Complete)
    }

    /// RNGI: store four random 32-bit integers.
    pub(crate) fn op_rngi(&mut self) -> OpResult {
        let values: Vec<Word36> = (0..RANDOM_WORDS)
            .map(|_| Word36::masked(u64::from(self.rng.gen::<u32>())))
            .collect();
        self.store_consecutive_operands(true, &values)
    }

    /// RNGB: store four words each holding four random bytes, one
    /// per quarter word.
    pub(crate) fn op_rngb(&mut self) -> OpResult {
        let values: Vec<Word36> = (0..RANDOM_WORDS)
            .map(|_| {
                let bytes: [u8; 4] = self.rng.gen();
                Word36::ZERO
                    .with_q1(u64::from(bytes[0]))
                    .with_q2(u64::from(bytes[1]))
                    .with_q3(u64::from(bytes[2]))
                    .with_q4(u64::from(bytes[3]))
            })
            .collect();
        self.store_consecutive_operands(true, &values)
    }
}
