use base::prelude::*;

use super::{Completion, InstructionEngine, OpResult};
use crate::stop::StopReason;

/// ## System control opcodes
///
/// - IAR: [`InstructionEngine::op_iar`]
/// - ER, SGNL: [`InstructionEngine::op_er`], [`InstructionEngine::op_sgnl`]
impl InstructionEngine {
    /// Develop U as an immediate value; no storage is referenced.
    pub(super) fn immediate_address(&mut self) -> Result<Option<u64>, Interrupt> {
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(None);
        };
        self.increment_index_register();
        Ok(Some(relative))
    }

    /// IAR: stop the processor, with U as the stop detail.
    pub(crate) fn op_iar(&mut self) -> OpResult {
        self.require_privilege(0)?;
        let Some(detail) = self.immediate_address()? else {
            return Ok(Completion::Incomplete);
        };
        self.stop(StopReason::InitiateAutoRecovery, Word36::masked(detail));
        Ok(Completion::Complete)
    }

    fn signal(&mut self, source: SignalSource) -> OpResult {
        let Some(code) = self.immediate_address()? else {
            return Ok(Completion::Incomplete);
        };
        self.post_interrupt(Interrupt::Signal {
            source,
            code: Word36::masked(code),
        });
        Ok(Completion::Complete)
    }

    /// ER: executive request.  The signal interrupt is taken once
    /// the instruction completes.
    pub(crate) fn op_er(&mut self) -> OpResult {
        self.signal(SignalSource::Er)
    }

    pub(crate) fn op_sgnl(&mut self) -> OpResult {
        self.signal(SignalSource::Sgnl)
    }
}
