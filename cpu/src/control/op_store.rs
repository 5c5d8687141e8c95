use base::prelude::*;

use super::operand::Access;
use super::{Completion, InstructionEngine, OpResult};
use crate::grs;

const FIELDATA_SPACES: Word36 = Word36::new::<0o050_505_050_505>();
const FIELDATA_ZEROES: Word36 = Word36::new::<0o606_060_606_060>();
const ASCII_SPACES: Word36 = Word36::new::<0o040_040_040_040>();
const ASCII_ZEROES: Word36 = Word36::new::<0o060_060_060_060>();

/// The two GRS ranges described by the A register of LRS and SRS:
/// (start, count) pairs with start and count in 7 bits each.
pub(crate) fn register_ranges(descriptor: Word36) -> [(u64, u64); 2] {
    [
        (descriptor.q4() & 0o177, descriptor.q3() & 0o177),
        (descriptor.q2() & 0o177, descriptor.q1() & 0o177),
    ]
}

/// GRS indices covered by `ranges`, each range wrapping past 0177.
pub(crate) fn register_indices(ranges: [(u64, u64); 2]) -> impl Iterator<Item = u64> {
    ranges
        .into_iter()
        .flat_map(|(start, count)| (0..count).map(move |n| (start + n) & 0o177))
}

/// Which quarter of a word LAQW and SAQW address, from bits 4 and 5
/// of the index register.
pub(crate) fn quarter_select(xreg: Word36) -> u64 {
    (xreg.bits() >> 30) & 0o3
}

/// ## Store opcodes
///
/// - SA, SNA, SMA: [`InstructionEngine::op_sa`] and friends
/// - SR, SX: [`InstructionEngine::op_sr`], [`InstructionEngine::op_sx`]
/// - SZ, SNZ, SP1, SN1, SFS, SFZ, SAS, SAZ: constant stores
/// - SAQW: [`InstructionEngine::op_saqw`]
/// - DS: [`InstructionEngine::op_ds`]
/// - SRS: [`InstructionEngine::op_srs`]
impl InstructionEngine {
    pub(crate) fn op_sa(&mut self) -> OpResult {
        let value = self.aa();
        self.store_operand(Access::OPERAND, value)
    }

    pub(crate) fn op_sna(&mut self) -> OpResult {
        let value = self.aa().negate();
        self.store_operand(Access::OPERAND, value)
    }

    pub(crate) fn op_sma(&mut self) -> OpResult {
        let value = self.aa().abs();
        self.store_operand(Access::OPERAND, value)
    }

    pub(crate) fn op_sr(&mut self) -> OpResult {
        let value = self.r_register(self.current_instruction().a());
        self.store_operand(Access::OPERAND, value)
    }

    pub(crate) fn op_sx(&mut self) -> OpResult {
        let value = self.x_register(self.current_instruction().a());
        self.store_operand(Access::OPERAND, value)
    }

    pub(crate) fn op_sz(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, Word36::ZERO)
    }

    pub(crate) fn op_snz(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, Word36::NEGATIVE_ZERO)
    }

    pub(crate) fn op_sp1(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, Word36::ONE)
    }

    pub(crate) fn op_sn1(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, Word36::NEGATIVE_ONE)
    }

    pub(crate) fn op_sfs(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, FIELDATA_SPACES)
    }

    pub(crate) fn op_sfz(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, FIELDATA_ZEROES)
    }

    pub(crate) fn op_sas(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, ASCII_SPACES)
    }

    pub(crate) fn op_saz(&mut self) -> OpResult {
        self.store_operand(Access::COMPARAND, ASCII_ZEROES)
    }

    /// SAQW stores the low nine bits of Aa into the quarter of the
    /// operand selected by Xx.  Xx is not incremented.
    pub(crate) fn op_saqw(&mut self) -> OpResult {
        let ci = self.current_instruction();
        let quarter = quarter_select(self.x_register(ci.x()));
        let value = self.aa().bits() & 0o777;
        let Some((word, Some(location))) = self.get_operand_at(Access::QUARTER)? else {
            return Ok(Completion::Incomplete);
        };
        let updated = match quarter {
            0 => word.with_q1(value),
            1 => word.with_q2(value),
            2 => word.with_q3(value),
            _ => word.with_q4(value),
        };
        self.write_location(location, updated)?;
        Ok(Completion::Complete)
    }

    /// DS stores Aa and Aa+1 into U and U+1.
    pub(crate) fn op_ds(&mut self) -> OpResult {
        let a = self.current_instruction().a();
        let values = [self.a_register(a), self.a_register(a + 1)];
        self.store_consecutive_operands(true, &values)
    }

    /// SRS saves the two GRS ranges described by Aa into consecutive
    /// words of storage starting at U.
    pub(crate) fn op_srs(&mut self) -> OpResult {
        let ranges = register_ranges(self.aa());
        let pp = self.processor_privilege();
        let mut values = Vec::new();
        for index in register_indices(ranges) {
            if !grs::is_readable(index, pp) {
                return Err(Interrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::ReadAccess,
                    fetch: false,
                });
            }
            values.push(self.grs.get(index));
        }
        if values.is_empty() {
            return self.ignore_operand();
        }
        self.store_consecutive_operands(false, &values)
    }
}
