use base::prelude::*;

use super::op_store::{quarter_select, register_indices, register_ranges};
use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};
use crate::grs;

/// ## Load opcodes
///
/// - LA, LNA, LMA, LNMA: [`InstructionEngine::op_la`] and friends
/// - LR: [`InstructionEngine::op_lr`]
/// - LX, LXM, LXI, LXLM, LXSI: index register loads
/// - LAQW: [`InstructionEngine::op_laqw`]
/// - DL, DLN, DLM: [`InstructionEngine::op_dl`] and friends
/// - LRS: [`InstructionEngine::op_lrs`]
impl InstructionEngine {
    /// Fetch the operand and hand it to `load`.
    fn load_with(&mut self, load: fn(&mut InstructionEngine, u64, Word36)) -> OpResult {
        let Some(value) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        let a = self.current_instruction().a();
        load(self, a, value);
        Ok(Completion::Complete)
    }

    pub(crate) fn op_la(&mut self) -> OpResult {
        self.load_with(|e, a, v| e.set_a_register(a, v))
    }

    pub(crate) fn op_lna(&mut self) -> OpResult {
        self.load_with(|e, a, v| e.set_a_register(a, v.negate()))
    }

    pub(crate) fn op_lma(&mut self) -> OpResult {
        self.load_with(|e, a, v| e.set_a_register(a, v.abs()))
    }

    pub(crate) fn op_lnma(&mut self) -> OpResult {
        self.load_with(|e, a, v| e.set_a_register(a, v.abs().negate()))
    }

    pub(crate) fn op_lr(&mut self) -> OpResult {
        self.load_with(|e, a, v| e.set_r_register(a, v))
    }

    pub(crate) fn op_lx(&mut self) -> OpResult {
        self.load_with(|e, a, v| e.set_x_register(a, v))
    }

    /// LXM replaces the modifier of Xa, leaving the increment.
    pub(crate) fn op_lxm(&mut self) -> OpResult {
        self.load_with(|e, a, v| {
            let x = e.x_register(a).with_xm(v.bits());
            e.set_x_register(a, x);
        })
    }

    /// LXI replaces the increment of Xa, leaving the modifier.
    pub(crate) fn op_lxi(&mut self) -> OpResult {
        self.load_with(|e, a, v| {
            let x = e.x_register(a).with_xi(v.bits());
            e.set_x_register(a, x);
        })
    }

    /// LXLM loads a 24-bit modifier.
    pub(crate) fn op_lxlm(&mut self) -> OpResult {
        self.load_with(|e, a, v| {
            let x = e.x_register(a).with_xm24(v.bits());
            e.set_x_register(a, x);
        })
    }

    /// LXSI loads a 12-bit increment.
    pub(crate) fn op_lxsi(&mut self) -> OpResult {
        self.load_with(|e, a, v| {
            let x = e.x_register(a).with_xi12(v.bits());
            e.set_x_register(a, x);
        })
    }

    /// LAQW loads Aa with the quarter of the operand selected by Xx.
    /// Xx is not incremented.
    pub(crate) fn op_laqw(&mut self) -> OpResult {
        let ci = self.current_instruction();
        let quarter = quarter_select(self.x_register(ci.x()));
        let access = Access {
            update: false,
            ..Access::QUARTER
        };
        let Some(word) = self.get_operand(access)? else {
            return Ok(Completion::Incomplete);
        };
        let value = match quarter {
            0 => word.q1(),
            1 => word.q2(),
            2 => word.q3(),
            _ => word.q4(),
        };
        self.set_a_register(ci.a(), Word36::masked(value));
        Ok(Completion::Complete)
    }

    fn load_double(&mut self, transform: fn(DoubleWord36) -> DoubleWord36) -> OpResult {
        let Some(words) = self.get_consecutive_operands(true, 2, false)? else {
            return Ok(Completion::Incomplete);
        };
        let value = transform(DoubleWord36::new(words[0], words[1]));
        let a = self.current_instruction().a();
        self.set_a_register(a, value.high);
        self.set_a_register(a + 1, value.low);
        Ok(Completion::Complete)
    }

    pub(crate) fn op_dl(&mut self) -> OpResult {
        self.load_double(|d| d)
    }

    pub(crate) fn op_dln(&mut self) -> OpResult {
        self.load_double(DoubleWord36::negate)
    }

    pub(crate) fn op_dlm(&mut self) -> OpResult {
        self.load_double(|d| if d.is_negative() { d.negate() } else { d })
    }

    /// LRS loads the two GRS ranges described by Aa from consecutive
    /// words of storage starting at U.  Every register is checked
    /// before any is written.
    pub(crate) fn op_lrs(&mut self) -> OpResult {
        let ranges = register_ranges(self.a_register(self.current_instruction().a()));
        let indices: Vec<u64> = register_indices(ranges).collect();
        if indices.is_empty() {
            return self.ignore_operand();
        }
        let pp = self.processor_privilege();
        if indices.iter().any(|&index| !grs::is_writable(index, pp)) {
            return Err(Interrupt::ReferenceViolation {
                kind: ReferenceViolationKind::WriteAccess,
                fetch: false,
            });
        }
        let Some(values) = self.get_consecutive_operands(false, indices.len() as u64, false)? else {
            return Ok(Completion::Incomplete);
        };
        for (index, value) in indices.into_iter().zip(values) {
            self.grs.set(index, value);
        }
        Ok(Completion::Complete)
    }
}
