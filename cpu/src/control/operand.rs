//! Operand resolution.
//!
//! Develops the relative address U from F0 (the u or d field plus the
//! signed modifier of Xx), follows basic mode indirect chains one hop
//! per cycle, and then reads or writes the operand in the GRS or in
//! storage with partial-word selection under j-field control.
//!
//! Every function here returns `Ok(None)` (or
//! `Ok(Completion::Incomplete)`) when address development has not
//! finished.  The instruction is then resumed on the next cycle with
//! the updated F0.
use tracing::{event, Level};

use base::prelude::*;

use super::{Completion, InstructionEngine, OpResult};
use crate::breakpoint::BreakpointComparison;
use crate::grs::{self, GRS_SIZE};

/// How an instruction wants its operand treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// The value is moving between a register and the operand, so a
    /// GRS-resident operand is transferred full-word.
    pub register_transfer: bool,
    /// Relative addresses below 0200 refer to the GRS.
    pub grs_overlay: bool,
    /// j-field values U and XU select an immediate operand.
    pub immediate: bool,
    /// Other j-field values select a partial word.
    pub partial: bool,
    /// The operand will be written back, so a storage operand must
    /// also be writable.
    pub update: bool,
    /// Take a storage lock on the operand until the instruction
    /// completes.
    pub lock: bool,
    /// Apply F0.h once the address is developed.
    pub increment_index: bool,
}

impl Access {
    /// The usual treatment for loads and stores of a register.
    pub const OPERAND: Access = Access {
        register_transfer: true,
        grs_overlay: true,
        immediate: true,
        partial: true,
        update: false,
        lock: false,
        increment_index: true,
    };

    /// An operand which is compared with, or combined with, a
    /// register rather than moved.
    pub const COMPARAND: Access = Access {
        register_transfer: false,
        ..Access::OPERAND
    };

    /// A full word which may be in the GRS; j is part of the function
    /// code.
    pub const WORD: Access = Access {
        register_transfer: true,
        grs_overlay: true,
        immediate: false,
        partial: false,
        update: false,
        lock: false,
        increment_index: true,
    };

    /// A full word which is always in storage.
    pub const STORAGE_WORD: Access = Access {
        register_transfer: false,
        grs_overlay: false,
        immediate: false,
        partial: false,
        update: false,
        lock: false,
        increment_index: true,
    };

    /// A full word, possibly in the GRS, which is read and then
    /// written back.
    pub const UPDATE: Access = Access {
        update: true,
        ..Access::WORD
    };

    /// A read-modify-write of a word for a quarter-word instruction,
    /// which leaves Xx alone.
    pub const QUARTER: Access = Access {
        increment_index: false,
        ..Access::UPDATE
    };

    /// A full storage word held locked for a read-modify-write.
    pub const LOCKED: Access = Access {
        update: true,
        lock: true,
        ..Access::STORAGE_WORD
    };
}

/// Where an operand was found, for instructions which write back to
/// the word they read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Grs(u64),
    Storage(AbsoluteAddress),
}

impl InstructionEngine {
    /// Whether the modifier and increment of index registers are
    /// 24 and 12 bits wide.
    pub(super) fn indexing_24bit(&self) -> bool {
        let dr = &self.asp.dr;
        !dr.basic_mode_enabled() && dr.processor_privilege() < 2 && dr.executive_24bit_indexing()
    }

    /// Apply F0.h: advance Xx's modifier by its increment.
    pub(crate) fn increment_index_register(&mut self) {
        let ci = self.current_instruction();
        if ci.x() != 0 && ci.h() != 0 {
            let xreg = self.x_register(ci.x());
            let updated = if self.indexing_24bit() {
                xreg.increment_modifier24()
            } else {
                xreg.increment_modifier()
            };
            self.set_x_register(ci.x(), updated);
        }
    }

    /// The base register an extended mode operand reference uses.
    fn effective_base_register(&self) -> usize {
        let ci = self.current_instruction();
        let b = if self.processor_privilege() < 2 { ci.ib() } else { ci.b() };
        b as usize
    }

    /// Develop U.  `jump` selects the 16-bit u field in extended
    /// mode.  Returns `None` after following one level of indirection.
    pub(crate) fn resolve_relative_address(&mut self, jump: bool) -> Result<Option<u64>, Interrupt> {
        let ci = self.current_instruction();
        let basic = self.basic_mode();
        let base = if basic || jump { ci.u() } else { ci.d() };
        let addend = match ci.x() {
            0 => 0,
            x => {
                let xreg = self.x_register(x);
                if self.indexing_24bit() {
                    sign_extend_24(xreg.xm24())
                } else {
                    sign_extend_18(xreg.xm())
                }
            }
        };
        let relative = Word36::masked(base).add_simple(Word36::masked(addend)).bits();

        if ci.i() != 0 && basic && self.processor_privilege() > 1 {
            self.instruction_point = InterruptPoint::IndirectExecute;
            let brx = self.basic_mode_bank_for(relative)?;
            self.check_access(brx, relative, 1, false, true, false)?;
            let address = self.absolute_address(brx, relative)?;
            self.check_breakpoint(BreakpointComparison::Read, address);
            let indirect = self.storage.read(address)?;
            event!(Level::TRACE, "{}: indirect through {relative:o} to {indirect}", self.name);
            self.asp.current_instruction = ci.with_xhiu(indirect);
            return Ok(None);
        }

        self.instruction_point = InterruptPoint::MidExecution;
        Ok(Some(relative))
    }

    /// The basic mode base register containing `relative`, or a
    /// storage limits violation.
    pub(crate) fn basic_mode_bank_for(&self, relative: u64) -> Result<usize, Interrupt> {
        match self.find_basic_mode_bank(relative) {
            0 => Err(Interrupt::storage_limits(false)),
            brx => Ok(brx),
        }
    }

    pub(super) fn is_grs_reference(&self, relative: u64) -> bool {
        relative < GRS_SIZE && (self.basic_mode() || self.effective_base_register() == 0)
    }

    /// The base register through which `relative` is accessed.
    pub(super) fn operand_base_register(&self, relative: u64) -> Result<usize, Interrupt> {
        if self.basic_mode() {
            self.basic_mode_bank_for(relative)
        } else {
            Ok(self.effective_base_register())
        }
    }

    /// Translate and check a storage operand, and take the lock if
    /// asked.  `Ok(None)` means another engine holds the lock.
    pub(super) fn storage_operand(
        &mut self,
        relative: u64,
        count: u64,
        read: bool,
        write: bool,
        lock: bool,
    ) -> Result<Option<AbsoluteAddress>, Interrupt> {
        let brx = self.operand_base_register(relative)?;
        self.check_access(brx, relative, count, false, read, write)?;
        let address = self.absolute_address(brx, relative)?;
        if lock && !self.locks.lock(address, &self.name) {
            event!(Level::TRACE, "{}: waiting for storage lock on {address}", self.name);
            return Ok(None);
        }
        Ok(Some(address))
    }

    /// The value of an immediate operand (j = U or XU).
    pub(crate) fn immediate_operand(&mut self) -> Word36 {
        let ci = self.current_instruction();
        let pp = self.processor_privilege();
        let wide = (pp < 2 && self.asp.dr.executive_24bit_indexing()) || (pp > 1 && ci.i() != 0);
        let mut value = if ci.x() == 0 {
            match ci.hiu() {
                0o777_777 => 0,
                hiu => hiu,
            }
        } else {
            let u = match ci.u() {
                0o177_777 => 0,
                u => u,
            };
            let xreg = self.x_register(ci.x());
            let modifier = if self.indexing_24bit() { xreg.xm24() } else { xreg.xm() };
            self.increment_index_register();
            Word36::masked(u).add_simple(Word36::masked(modifier)).bits()
        };
        let extend = ci.j() == jfield::XU;
        value = if wide {
            let v = value & 0o77_777_777;
            if extend {
                sign_extend_24(v)
            } else {
                v
            }
        } else {
            let v = value & 0o777_777;
            if extend {
                sign_extend_18(v)
            } else {
                v
            }
        };
        Word36::masked(value)
    }

    fn is_immediate(&self, access: Access) -> bool {
        access.immediate && self.current_instruction().j() >= jfield::U
    }

    fn quarter_word_mode(&self) -> bool {
        self.asp.dr.quarter_word_mode()
    }

    /// Fetch an operand.
    pub(crate) fn get_operand(&mut self, access: Access) -> Result<Option<Word36>, Interrupt> {
        Ok(self.get_operand_at(access)?.map(|(value, _)| value))
    }

    /// Fetch an operand and report where it came from (`None` for an
    /// immediate operand).
    pub(crate) fn get_operand_at(&mut self, access: Access) -> Result<Option<(Word36, Option<Location>)>, Interrupt> {
        if self.is_immediate(access) {
            return Ok(Some((self.immediate_operand(), None)));
        }
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(None);
        };
        let j = self.current_instruction().j();
        let qwm = self.quarter_word_mode();

        if access.grs_overlay && self.is_grs_reference(relative) {
            if !grs::is_readable(relative, self.processor_privilege()) {
                return Err(Interrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::ReadAccess,
                    fetch: false,
                });
            }
            if access.increment_index {
                self.increment_index_register();
            }
            let word = self.grs.get(relative);
            let value = if access.register_transfer || !access.partial {
                word
            } else {
                extract_partial_word(word, j, qwm)
            };
            return Ok(Some((value, Some(Location::Grs(relative)))));
        }

        let Some(address) = self.storage_operand(relative, 1, true, access.update, access.lock)? else {
            return Ok(None);
        };
        if access.increment_index {
            self.increment_index_register();
        }
        let word = self.storage.read(address)?;
        let value = if access.partial {
            extract_partial_word(word, j, qwm)
        } else {
            word
        };
        self.check_breakpoint(BreakpointComparison::Read, address);
        Ok(Some((value, Some(Location::Storage(address)))))
    }

    /// Develop the jump target.  The target is always the 16 bits of
    /// u (plus indexing); no storage is referenced.
    pub(crate) fn get_jump_operand(&mut self) -> Result<Option<u64>, Interrupt> {
        let Some(relative) = self.resolve_relative_address(true)? else {
            return Ok(None);
        };
        self.increment_index_register();
        Ok(Some(relative))
    }

    /// Fetch `count` consecutive words.
    pub(crate) fn get_consecutive_operands(
        &mut self,
        grs_overlay: bool,
        count: u64,
        for_update: bool,
    ) -> Result<Option<Vec<Word36>>, Interrupt> {
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(None);
        };
        self.increment_index_register();

        if grs_overlay && self.is_grs_reference(relative) {
            let pp = self.processor_privilege();
            let mut values = Vec::with_capacity(count as usize);
            for index in relative..relative + count {
                if index >= GRS_SIZE {
                    return Err(Interrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::Grs,
                        fetch: false,
                    });
                }
                if !grs::is_readable(index, pp) {
                    return Err(Interrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::ReadAccess,
                        fetch: false,
                    });
                }
                values.push(self.grs.get(index));
            }
            return Ok(Some(values));
        }

        let Some(address) = self.storage_operand(relative, count, true, for_update, false)? else {
            return Ok(None);
        };
        let values = self.storage.read_slice(address, count)?;
        self.check_breakpoint_range(BreakpointComparison::Read, address, count);
        Ok(Some(values))
    }

    /// Store `value` at U under j-field control.  A GRS destination
    /// takes the whole word when the value came from a register.
    pub(crate) fn store_operand(&mut self, access: Access, value: Word36) -> OpResult {
        if self.is_immediate(access) {
            self.increment_index_register();
            return Ok(Completion::Complete);
        }
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(Completion::Incomplete);
        };
        let j = self.current_instruction().j();
        let qwm = self.quarter_word_mode();

        if access.grs_overlay && self.is_grs_reference(relative) {
            if !grs::is_writable(relative, self.processor_privilege()) {
                return Err(Interrupt::ReferenceViolation {
                    kind: ReferenceViolationKind::WriteAccess,
                    fetch: false,
                });
            }
            if access.increment_index {
                self.increment_index_register();
            }
            let stored = if !access.register_transfer && access.partial {
                inject_partial_word(self.grs.get(relative), value, j, qwm)
            } else {
                value
            };
            self.grs.set(relative, stored);
            return Ok(Completion::Complete);
        }

        let Some(address) = self.storage_operand(relative, 1, false, true, access.lock)? else {
            return Ok(Completion::Incomplete);
        };
        if access.increment_index {
            self.increment_index_register();
        }
        self.check_breakpoint(BreakpointComparison::Write, address);
        let stored = if access.partial {
            inject_partial_word(self.storage.read(address)?, value, j, qwm)
        } else {
            value
        };
        self.storage.write(address, stored)?;
        Ok(Completion::Complete)
    }

    /// Store consecutive words starting at U.
    pub(crate) fn store_consecutive_operands(&mut self, grs_overlay: bool, values: &[Word36]) -> OpResult {
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(Completion::Incomplete);
        };
        self.increment_index_register();
        let count = values.len() as u64;

        if grs_overlay && self.is_grs_reference(relative) {
            let pp = self.processor_privilege();
            for (index, value) in (relative..).zip(values) {
                if index >= GRS_SIZE {
                    return Err(Interrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::Grs,
                        fetch: false,
                    });
                }
                if !grs::is_writable(index, pp) {
                    return Err(Interrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::WriteAccess,
                        fetch: false,
                    });
                }
                self.grs.set(index, *value);
            }
            return Ok(Completion::Complete);
        }

        let Some(address) = self.storage_operand(relative, count, false, true, false)? else {
            return Ok(Completion::Incomplete);
        };
        self.storage.write_slice(address, values)?;
        self.check_breakpoint_range(BreakpointComparison::Write, address, count);
        Ok(Completion::Complete)
    }

    /// Develop U and perform the limits checks of an operand
    /// reference without touching the operand.
    pub(crate) fn ignore_operand(&mut self) -> OpResult {
        let Some(relative) = self.resolve_relative_address(false)? else {
            return Ok(Completion::Incomplete);
        };
        self.increment_index_register();
        if !self.is_grs_reference(relative) {
            let brx = self.operand_base_register(relative)?;
            self.check_access(brx, relative, 1, false, false, false)?;
        }
        Ok(Completion::Complete)
    }

    pub(crate) fn read_location(&self, location: Location) -> Result<Word36, Interrupt> {
        match location {
            Location::Grs(index) => Ok(self.grs.get(index)),
            Location::Storage(address) => self.storage.read(address),
        }
    }

    /// Write back to an operand obtained with
    /// [`InstructionEngine::get_operand_at`].
    pub(crate) fn write_location(&mut self, location: Location, value: Word36) -> Result<(), Interrupt> {
        match location {
            Location::Grs(index) => {
                if !grs::is_writable(index, self.processor_privilege()) {
                    return Err(Interrupt::ReferenceViolation {
                        kind: ReferenceViolationKind::WriteAccess,
                        fetch: false,
                    });
                }
                self.grs.set(index, value);
                Ok(())
            }
            Location::Storage(address) => {
                self.check_breakpoint(BreakpointComparison::Write, address);
                self.storage.write(address, value)
            }
        }
    }
}
