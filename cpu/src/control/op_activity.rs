use base::prelude::*;

use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};
use crate::asp::DesignatorRegister;
use crate::grs;

/// Words moved by ACEL and DCEL: sixteen each of X, A and R.
const ACTIVITY_REGISTER_WORDS: u64 = 48;

/// The user designator bits and program control designators, as LUD
/// loads them.
const USER_DESIGNATORS: u64 = 0o670_557;

/// ## Activity control opcodes
///
/// - LD, SD: [`InstructionEngine::op_ld`], [`InstructionEngine::op_sd`]
/// - LPD, SPD: program control designators
/// - LUD, SUD: user designators
/// - ACEL, DCEL: [`InstructionEngine::op_acel`], [`InstructionEngine::op_dcel`]
impl InstructionEngine {
    /// GRS indices of the registers ACEL and DCEL transfer, in
    /// order.  A0 to A3 are X12 to X15 under another name.
    fn activity_register_indices(&self) -> impl Iterator<Item = u64> {
        let exec = self.asp.dr.exec_register_set_selected();
        (0..16)
            .map(move |n| grs::x_index(n, exec))
            .chain((0..16).map(move |n| grs::a_index(n, exec)))
            .chain((0..16).map(move |n| grs::r_index(n, exec)))
    }

    /// LD: replace the whole designator register.
    pub(crate) fn op_ld(&mut self) -> OpResult {
        self.require_privilege(0)?;
        let Some(operand) = self.get_operand(Access::WORD)? else {
            return Ok(Completion::Incomplete);
        };
        self.asp.dr = DesignatorRegister::from_composite(operand.bits());
        self.fetch_base_register = 0;
        Ok(Completion::Complete)
    }

    pub(crate) fn op_sd(&mut self) -> OpResult {
        self.require_privilege(1)?;
        let value = Word36::masked(self.asp.dr.composite());
        self.store_operand(Access::WORD, value)
    }

    pub(crate) fn op_lpd(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        self.asp.dr.load_program_control(operand.bits());
        Ok(Completion::Complete)
    }

    /// SPD: merge the program control designators into the word at
    /// U.
    pub(crate) fn op_spd(&mut self) -> OpResult {
        let Some((word, Some(location))) = self.get_operand_at(Access::UPDATE)? else {
            return Ok(Completion::Incomplete);
        };
        let value = self.asp.dr.store_program_control(word.bits());
        self.write_location(location, Word36::masked(value))?;
        Ok(Completion::Complete)
    }

    pub(crate) fn op_lud(&mut self) -> OpResult {
        let Some(operand) = self.get_operand(Access::OPERAND)? else {
            return Ok(Completion::Incomplete);
        };
        self.asp.dr.load_user(operand.bits());
        Ok(Completion::Complete)
    }

    pub(crate) fn op_sud(&mut self) -> OpResult {
        let value = Word36::masked(self.asp.dr.composite() & USER_DESIGNATORS);
        self.store_operand(Access::WORD, value)
    }

    /// ACEL: load X0-X15, A0-A15 and R0-R15 of the selected register
    /// set from 48 consecutive words.
    pub(crate) fn op_acel(&mut self) -> OpResult {
        self.require_privilege(2)?;
        let Some(values) = self.get_consecutive_operands(false, ACTIVITY_REGISTER_WORDS, false)? else {
            return Ok(Completion::Incomplete);
        };
        let indices: Vec<u64> = self.activity_register_indices().collect();
        for (index, value) in indices.into_iter().zip(values) {
            self.grs.set(index, value);
        }
        Ok(Completion::Complete)
    }

    /// DCEL: the reverse of ACEL.
    pub(crate) fn op_dcel(&mut self) -> OpResult {
        self.require_privilege(2)?;
        let values: Vec<Word36> = self.activity_register_indices().map(|index| self.grs.get(index)).collect();
        self.store_consecutive_operands(false, &values)
    }
}
