//! The activity state packet: program address register, designator
//! register, indicator/key register, quantum timer, the current
//! instruction (F0) and the interrupt status words.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

/// Level, BDI and program counter of the executing bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgramAddressRegister {
    pub lbdi: LevelBdi,
    /// 18 bits.
    pub program_counter: u64,
}

impl ProgramAddressRegister {
    #[must_use]
    pub const fn new(level: u64, bdi: u64, program_counter: u64) -> ProgramAddressRegister {
        ProgramAddressRegister {
            lbdi: LevelBdi::new(level, bdi),
            program_counter: program_counter & 0o777_777,
        }
    }

    #[must_use]
    pub const fn from_word(w: Word36) -> ProgramAddressRegister {
        let bits = w.bits();
        ProgramAddressRegister::new(bits >> 33, bits >> 18, bits)
    }

    #[must_use]
    pub const fn composite(&self) -> Word36 {
        Word36::masked((self.lbdi.level << 33) | (self.lbdi.bdi << 18) | self.program_counter)
    }

    pub fn set_program_counter(&mut self, pc: u64) {
        self.program_counter = pc & 0o777_777;
    }

    #[must_use]
    pub const fn virtual_address(&self) -> VirtualAddress {
        VirtualAddress::new(self.lbdi.level, self.lbdi.bdi, self.program_counter)
    }
}

impl Display for ProgramAddressRegister {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:06o}", self.lbdi, self.program_counter)
    }
}

/// Generates a getter and setter for a single designator bit.
macro_rules! designator_bit {
    ($bit:expr, $get:ident, $set:ident) => {
        #[must_use]
        pub const fn $get(&self) -> bool {
            self.bits & DesignatorRegister::mask($bit) != 0
        }

        pub fn $set(&mut self, value: bool) {
            if value {
                self.bits |= DesignatorRegister::mask($bit);
            } else {
                self.bits &= !DesignatorRegister::mask($bit);
            }
        }
    };
}

/// Thirty-six mode and status bits, DB0 being the most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DesignatorRegister {
    bits: u64,
}

impl DesignatorRegister {
    /// The mask for DBn.
    #[must_use]
    pub const fn mask(bit: u32) -> u64 {
        1 << (35 - bit)
    }

    /// DB12 through DB17 in place; the part saved in RCS frames and
    /// loaded from gates.
    pub const BITS_12_17: u64 = 0o000_077_000_000;

    #[must_use]
    pub const fn from_composite(bits: u64) -> DesignatorRegister {
        DesignatorRegister {
            bits: bits & Word36::MASK,
        }
    }

    #[must_use]
    pub const fn composite(&self) -> u64 {
        self.bits
    }

    pub fn set_composite(&mut self, bits: u64) {
        self.bits = bits & Word36::MASK;
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }

    designator_bit!(0, activity_level_queue_monitor_enabled, set_activity_level_queue_monitor_enabled);
    designator_bit!(1, performance_monitoring_enabled, set_performance_monitoring_enabled);
    designator_bit!(6, fault_handling_in_progress, set_fault_handling_in_progress);
    designator_bit!(11, executive_24bit_indexing, set_executive_24bit_indexing);
    designator_bit!(12, quantum_timer_enabled, set_quantum_timer_enabled);
    designator_bit!(14, deferrable_interrupts_enabled, set_deferrable_interrupts_enabled);
    designator_bit!(16, basic_mode_enabled, set_basic_mode_enabled);
    designator_bit!(17, exec_register_set_selected, set_exec_register_set_selected);
    designator_bit!(18, carry, set_carry);
    designator_bit!(19, overflow, set_overflow);
    designator_bit!(21, characteristic_underflow, set_characteristic_underflow);
    designator_bit!(22, characteristic_overflow, set_characteristic_overflow);
    designator_bit!(23, divide_check, set_divide_check);
    designator_bit!(24, operation_trap_enabled, set_operation_trap_enabled);
    designator_bit!(29, arithmetic_exception_enabled, set_arithmetic_exception_enabled);
    designator_bit!(31, basic_mode_base_register_selection, set_basic_mode_base_register_selection);
    designator_bit!(32, quarter_word_mode, set_quarter_word_mode);

    #[must_use]
    pub const fn processor_privilege(&self) -> u64 {
        self.bits & 0o3
    }

    pub fn set_processor_privilege(&mut self, pp: u64) {
        self.bits = (self.bits & !0o3) | (pp & 0o3);
    }

    /// LPD: load the program-control designators held in the low
    /// nine bits of `operand`.
    pub fn load_program_control(&mut self, operand: u64) {
        self.bits = (self.bits & 0o777_777_777_220) | (operand & 0o000_557);
    }

    /// LUD: as LPD but also loads the user designators in DB18-23.
    pub fn load_user(&mut self, operand: u64) {
        self.bits = (self.bits & 0o777_777_107_220) | (operand & 0o670_557);
    }

    /// SPD: the value stored by SPD, merging `source` with the
    /// program-control designators.
    #[must_use]
    pub const fn store_program_control(&self, source: u64) -> u64 {
        (source & 0o777_200) | (self.bits & 0o000_577)
    }
}

impl Display for DesignatorRegister {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:012o}", self.bits)
    }
}

/// Access key plus the transient execution indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndicatorKeyRegister {
    pub short_status: u64,
    pub instruction_in_f0: bool,
    pub executing_repeated: bool,
    pub breakpoint_match: bool,
    pub software_break: bool,
    pub interrupt_class: u64,
    pub access_key: AccessKey,
}

impl IndicatorKeyRegister {
    const INF: u64 = 0o004_000_000_000;
    const EXRF: u64 = 0o002_000_000_000;
    const BREAKPOINT_MATCH: u64 = 0o000_400_000_000;
    const SOFTWARE_BREAK: u64 = 0o000_200_000_000;

    #[must_use]
    pub fn from_composite(value: u64) -> IndicatorKeyRegister {
        let w = Word36::masked(value);
        IndicatorKeyRegister {
            short_status: w.s1(),
            instruction_in_f0: value & IndicatorKeyRegister::INF != 0,
            executing_repeated: value & IndicatorKeyRegister::EXRF != 0,
            breakpoint_match: value & IndicatorKeyRegister::BREAKPOINT_MATCH != 0,
            software_break: value & IndicatorKeyRegister::SOFTWARE_BREAK != 0,
            interrupt_class: w.s3(),
            access_key: AccessKey::from_composite(w.h2()),
        }
    }

    #[must_use]
    pub fn composite(&self) -> u64 {
        let flag = |set: bool, bit: u64| if set { bit } else { 0 };
        Word36::ZERO
            .with_s1(self.short_status)
            .with_s3(self.interrupt_class)
            .with_h2(self.access_key.composite())
            .bits()
            | flag(self.instruction_in_f0, IndicatorKeyRegister::INF)
            | flag(self.executing_repeated, IndicatorKeyRegister::EXRF)
            | flag(self.breakpoint_match, IndicatorKeyRegister::BREAKPOINT_MATCH)
            | flag(self.software_break, IndicatorKeyRegister::SOFTWARE_BREAK)
    }

    pub fn clear(&mut self) {
        *self = IndicatorKeyRegister::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ActivityStatePacket {
    pub par: ProgramAddressRegister,
    pub dr: DesignatorRegister,
    pub ikr: IndicatorKeyRegister,
    pub quantum_timer: Word36,
    pub current_instruction: InstructionWord,
    pub isw0: Word36,
    pub isw1: Word36,
}

impl ActivityStatePacket {
    /// Number of words UR reads to rebuild the packet.
    pub const UR_OPERAND_WORDS: u64 = 7;

    #[must_use]
    pub fn new() -> ActivityStatePacket {
        ActivityStatePacket::default()
    }

    /// Replace PAR, DR, IKR (keeping the short status field), the
    /// quantum timer and F0 from consecutive words.
    pub fn load_from_words(&mut self, words: &[Word36]) {
        if let [par, dr, ikr, qt, f0, ..] = words {
            self.par = ProgramAddressRegister::from_word(*par);
            self.dr = DesignatorRegister::from_composite(dr.bits());
            let ssf = self.ikr.short_status;
            self.ikr = IndicatorKeyRegister::from_composite(ikr.bits());
            self.ikr.short_status = ssf;
            self.quantum_timer = *qt;
            self.current_instruction = InstructionWord::new(*f0);
        }
    }

    /// The packet in the order [`ActivityStatePacket::load_from_words`]
    /// reads it, followed by the interrupt status words.
    #[must_use]
    pub fn to_words(&self) -> [Word36; 7] {
        [
            self.par.composite(),
            Word36::masked(self.dr.composite()),
            Word36::masked(self.ikr.composite()),
            self.quantum_timer,
            self.current_instruction.word(),
            self.isw0,
            self.isw1,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_designator_bits() {
        let mut dr = DesignatorRegister::default();
        dr.set_basic_mode_enabled(true);
        assert_eq!(dr.composite(), 0o000_002_000_000);
        dr.set_quarter_word_mode(true);
        assert_eq!(dr.composite(), 0o000_002_000_010);
        dr.set_processor_privilege(2);
        assert_eq!(dr.processor_privilege(), 2);
        assert!(dr.quarter_word_mode());
        dr.set_basic_mode_enabled(false);
        assert!(!dr.basic_mode_enabled());
    }

    #[test]
    fn test_program_control_designators() {
        let mut dr = DesignatorRegister::from_composite(0o777_777_777_777);
        dr.load_program_control(0);
        assert_eq!(dr.composite(), 0o777_777_777_220);
        let mut dr = DesignatorRegister::from_composite(0);
        dr.load_user(0o777_777_777_777);
        assert_eq!(dr.composite(), 0o670_557);
        let dr = DesignatorRegister::from_composite(0o777);
        assert_eq!(dr.store_program_control(0o777_777), 0o777_777);
        assert_eq!(dr.store_program_control(0), 0o577);
    }

    #[test]
    fn test_indicator_key_register() {
        let ikr = IndicatorKeyRegister {
            short_status: 0o21,
            instruction_in_f0: true,
            executing_repeated: false,
            breakpoint_match: true,
            software_break: false,
            interrupt_class: 8,
            access_key: AccessKey::new(3, 0o5),
        };
        let composite = ikr.composite();
        assert_eq!(composite, 0o214_410_600_005);
        assert_eq!(IndicatorKeyRegister::from_composite(composite), ikr);
    }

    #[test]
    fn test_asp_words() {
        let mut asp = ActivityStatePacket::new();
        asp.ikr.short_status = 0o7;
        asp.isw0 = Word36::masked(0o55);
        let mut other = ActivityStatePacket::new();
        other.par = ProgramAddressRegister::new(4, 0o13, 0o1000);
        other.dr.set_basic_mode_enabled(true);
        other.ikr.access_key = AccessKey::new(1, 0o2);
        other.ikr.short_status = 0o33;
        asp.load_from_words(&other.to_words());
        assert_eq!(asp.par, other.par);
        assert_eq!(asp.dr, other.dr);
        assert_eq!(asp.ikr.access_key, other.ikr.access_key);
        assert_eq!(asp.ikr.short_status, 0o7);
        assert_eq!(asp.isw0, Word36::masked(0o55));
    }
}
