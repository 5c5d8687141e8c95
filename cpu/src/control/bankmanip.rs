//! The bank manipulator.
//!
//! Every instruction which loads a base register from a bank
//! descriptor, or transfers control between banks, goes through the
//! same algorithm; so does interrupt entry.  The algorithm is a
//! sequence of numbered steps.  Each step either moves on to the next,
//! skips ahead to a later one, or aborts.  An abort leaves the engine
//! as it was found (apart from storage already written for an RCS
//! frame, which is unreachable once the stack pointer is restored).
//!
//! The steps are:
//!
//! 1. Sanity checks
//! 2. Capture the prior L,BDI for calls and LxJ
//! 3. Develop the source L,BDI,offset
//! 4. Reject the interrupt vector L,BDIs (0,1 to 0,31)
//! 5. Void bank handling
//! 6. Fetch the source bank descriptor
//! 7. Dispatch on the source bank type
//! 8. Indirect banks
//! 9. Gates
//! 10. Choose the base register and the transfer mode
//! 11. Release the prior bank
//! 12. Push a return control stack frame
//! 13. Update X(a) or X11
//! 14. Update X0
//! 15. Gate fields
//! 16. Designators and key for everything else
//! 17. Program counter
//! 18. Hard-held PAR.L,BDI or active base table
//! 19. Load the base register
//! 20. Basic mode fetch register
//! 21. Final checks
use tracing::{event, Level};

use base::prelude::*;

use super::InstructionEngine;
use crate::asp::DesignatorRegister;
use crate::basereg::{ActiveBaseTableEntry, BaseRegister, L0_BDT_BASE_REGISTER, RCS_BASE_REGISTER};
use crate::grs::{EX0, X0};
use crate::stop::StopReason;

/// Why the manipulator gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Abort {
    /// The invoking instruction fails with this interrupt.
    Interrupt(Interrupt),
    /// The fault cannot be reported by an interrupt; the engine must
    /// stop.
    Stop(StopReason, Word36),
}

impl From<Interrupt> for Abort {
    fn from(interrupt: Interrupt) -> Abort {
        Abort::Interrupt(interrupt)
    }
}

/// What invoked the manipulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Lae,
    Lbe,
    Lbu,
    Ur,
    Call,
    Goto,
    Locl,
    Lbj,
    Ldj,
    Lij,
    Rtn,
    Interrupt(Interrupt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    None,
    BasicToBasic,
    BasicToExtended,
    ExtendedToBasic,
    ExtendedToExtended,
}

impl Transfer {
    fn to_basic(self) -> bool {
        matches!(self, Transfer::BasicToBasic | Transfer::ExtendedToBasic)
    }
}

/// Words in one bank descriptor table entry.
const BANK_DESCRIPTOR_WORDS: u64 = BankDescriptor::SIZE as u64;

/// Interface specification values held in X(a) for LxJ.
const IS_RETURN: u64 = 2;
const IS_INVALID: u64 = 3;

#[derive(Debug, Clone)]
pub(crate) struct BankManipulator {
    operation: Operation,
    operands: Vec<Word36>,
    base_register: usize,
    lxj: LxjRegister,
    prior: LevelBdi,
    source: VirtualAddress,
    source_descriptor: Option<BankDescriptor>,
    target: VirtualAddress,
    target_descriptor: Option<BankDescriptor>,
    gate: Option<Gate>,
    transfer: Transfer,
    frame: Option<RcsFrame>,
}

impl BankManipulator {
    fn new(operation: Operation, operands: Vec<Word36>, base_register: usize) -> BankManipulator {
        BankManipulator {
            operation,
            operands,
            base_register,
            lxj: LxjRegister::default(),
            prior: LevelBdi::VOID,
            source: VirtualAddress::default(),
            source_descriptor: None,
            target: VirtualAddress::default(),
            target_descriptor: None,
            gate: None,
            transfer: Transfer::None,
            frame: None,
        }
    }

    /// A manipulator for any instruction with a single operand word
    /// (which is the jump target for LxJ and LOCL, and ignored by
    /// RTN).
    pub(crate) fn for_instruction(operation: Operation, operand: Word36) -> BankManipulator {
        BankManipulator::new(operation, vec![operand], 0)
    }

    /// UR takes the whole activity state packet as its operand.
    pub(crate) fn for_user_return(operands: Vec<Word36>) -> BankManipulator {
        BankManipulator::new(Operation::Ur, operands, 0)
    }

    /// LAE runs the manipulator once per base register B1..B15.
    pub(crate) fn for_lae(base_register: usize, operand: Word36) -> BankManipulator {
        BankManipulator::new(Operation::Lae, vec![operand], base_register)
    }

    pub(crate) fn for_interrupt(interrupt: Interrupt) -> BankManipulator {
        BankManipulator::new(Operation::Interrupt(interrupt), Vec::new(), 0)
    }

    fn interrupt(&self) -> Option<Interrupt> {
        match self.operation {
            Operation::Interrupt(interrupt) => Some(interrupt),
            _ => None,
        }
    }

    fn is_load(&self) -> bool {
        matches!(self.operation, Operation::Lae | Operation::Lbe | Operation::Lbu)
    }

    fn is_lxj(&self) -> bool {
        matches!(self.operation, Operation::Lbj | Operation::Ldj | Operation::Lij)
    }

    fn is_return(&self) -> bool {
        self.operation == Operation::Rtn || (self.is_lxj() && self.lxj.interface_spec == IS_RETURN)
    }

    /// Instructions which may leave a return point: CALL, LOCL and
    /// LxJ with a call or normal interface.
    fn may_call(&self) -> bool {
        matches!(self.operation, Operation::Call | Operation::Locl)
            || (self.is_lxj() && self.lxj.interface_spec < IS_RETURN)
    }

    /// Whether this transfer pushes a return control stack frame.
    /// LxJ only does so as LxJ/CALL into an extended mode bank; into a
    /// basic mode bank the return point goes in X(a) instead.
    fn pushes_frame(&self) -> bool {
        match self.operation {
            Operation::Call | Operation::Locl => true,
            Operation::Lbj | Operation::Ldj | Operation::Lij => {
                self.lxj.interface_spec == 1 && self.transfer == Transfer::BasicToExtended
            }
            _ => false,
        }
    }

    /// The basic mode base register an LxJ instruction works through.
    fn lxj_base_register(&self, engine: &InstructionEngine) -> usize {
        let db31 = engine.asp.dr.basic_mode_base_register_selection();
        match (self.operation, db31) {
            (Operation::Lbj, _) => 12 + self.lxj.bank_selector as usize,
            (Operation::Ldj, true) => 15,
            (Operation::Ldj, false) => 14,
            (_, true) => 13,
            (_, false) => 12,
        }
    }

    /// An addressing exception naming the source bank.
    fn source_exception(&self, reason: AddressingExceptionReason) -> Abort {
        Abort::Interrupt(Interrupt::addressing_exception(reason, self.source.lbdi))
    }

    fn target_exception(&self, reason: AddressingExceptionReason) -> Abort {
        Abort::Interrupt(Interrupt::addressing_exception(reason, self.target.lbdi))
    }

    /// Run the algorithm.  On failure every register the algorithm
    /// touched is put back.
    pub(crate) fn run(mut self, engine: &mut InstructionEngine) -> Result<(), Abort> {
        let snapshot = engine.snapshot();
        if self.is_lxj() {
            let a = engine.current_instruction().a();
            self.lxj = LxjRegister::from_word(engine.x_register(a));
        }
        let mut step = 1;
        while step != 0 {
            event!(Level::TRACE, "{}: bank manipulation step {step}", engine.name);
            let outcome = match step {
                1 => self.check_instruction(engine),
                2 => self.capture_prior(engine),
                3 => self.develop_source(engine),
                4 => self.check_source(),
                5 => self.void_source(),
                6 => self.fetch_source(engine),
                7 => self.dispatch_on_type(engine),
                8 => self.indirect(engine),
                9 => self.enter_gate(engine),
                10 => self.choose_base_register(engine),
                11 => self.release_prior_bank(engine),
                12 => self.push_frame(engine),
                13 => self.update_x_register(engine),
                14 => self.update_x0(engine),
                15 => self.apply_gate(engine),
                16 => self.update_state(engine),
                17 => self.update_program_counter(engine),
                18 => self.update_active_base_table(engine),
                19 => self.load_base_register(engine),
                20 => self.reset_fetch_register(engine),
                _ => self.final_checks(engine),
            };
            match outcome {
                Ok(next) => step = next,
                Err(abort) => {
                    event!(
                        Level::DEBUG,
                        "{}: bank manipulation for {:?} aborted at step {step}: {abort:?}",
                        engine.name,
                        self.operation
                    );
                    engine.restore(snapshot);
                    return Err(abort);
                }
            }
        }
        event!(
            Level::DEBUG,
            "{}: {:?} loaded B{} from {}",
            engine.name,
            self.operation,
            self.base_register,
            self.target
        );
        Ok(())
    }

    // Step 1.
    fn check_instruction(&self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let a = engine.current_instruction().a();
        if self.operation == Operation::Lbu && a < 2 {
            return Err(Interrupt::InvalidInstruction(InvalidInstructionReason::BadFunctionCode).into());
        }
        if self.is_lxj() && self.lxj.interface_spec == IS_INVALID {
            return Err(Interrupt::addressing_exception(AddressingExceptionReason::InvalidIsValue, LevelBdi::VOID).into());
        }
        Ok(2)
    }

    // Step 2.
    fn capture_prior(&mut self, engine: &InstructionEngine) -> Result<u8, Abort> {
        if matches!(self.operation, Operation::Call | Operation::Locl) {
            self.prior = engine.asp.par.lbdi;
        } else if self.is_lxj() && self.lxj.interface_spec < IS_RETURN {
            let abtx = self.lxj_base_register(engine);
            self.prior = engine.active_base_table[abtx].lbdi;
        }
        Ok(3)
    }

    // Step 3.
    fn develop_source(&mut self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        let operand = self.operands.first().copied().unwrap_or(Word36::ZERO);
        self.source = if let Some(interrupt) = self.interrupt() {
            interrupt_vector(engine, interrupt)?
        } else if self.operation == Operation::Ur {
            VirtualAddress::from_word(operand)
        } else if self.is_return() {
            let frame = pop_frame(engine)?;
            self.frame = Some(frame);
            frame.return_to
        } else if self.is_lxj() {
            VirtualAddress {
                lbdi: self.lxj.address.lbdi(),
                offset: operand.h2(),
            }
        } else if self.operation == Operation::Locl {
            VirtualAddress {
                lbdi: engine.asp.par.lbdi,
                offset: operand.h2(),
            }
        } else {
            VirtualAddress::from_word(operand)
        };
        Ok(4)
    }

    // Step 4.
    fn check_source(&self) -> Result<u8, Abort> {
        if self.source.lbdi.is_reserved() {
            if self.interrupt().is_some() {
                return Err(Abort::Stop(
                    StopReason::InterruptHandlerInvalidLevelBdi,
                    Word36::masked(self.source.lbdi.composite()),
                ));
            }
            return Err(self.source_exception(AddressingExceptionReason::InvalidSourceLevelBdi));
        }
        Ok(5)
    }

    // Step 5.
    fn void_source(&mut self) -> Result<u8, Abort> {
        if !self.source.lbdi.is_void() {
            return Ok(6);
        }
        let invalid = self.source_exception(AddressingExceptionReason::InvalidSourceLevelBdi);
        self.target = self.source;
        self.target_descriptor = None;
        match self.operation {
            Operation::Interrupt(_) => Err(Abort::Stop(StopReason::InterruptHandlerInvalidLevelBdi, Word36::ZERO)),
            Operation::Lae | Operation::Lbe | Operation::Lbu => Ok(10),
            Operation::Ur => {
                let dr = self.operands.get(1).copied().unwrap_or(Word36::ZERO);
                if DesignatorRegister::from_composite(dr.bits()).basic_mode_enabled() {
                    Ok(10)
                } else {
                    Err(invalid)
                }
            }
            _ if self.is_return() => {
                if self.frame.is_some_and(|frame| frame_is_basic(&frame)) {
                    Ok(10)
                } else {
                    Err(invalid)
                }
            }
            // A void LxJ target leaves the activity in basic mode.
            Operation::Lbj | Operation::Ldj | Operation::Lij => Ok(10),
            _ => Err(invalid),
        }
    }

    // Step 6.
    fn fetch_source(&mut self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let Some(bd) = find_bank_descriptor(engine, self.source.lbdi) else {
            return Err(Abort::Stop(
                StopReason::InterruptHandlerInvalidLevelBdi,
                Word36::masked(self.source.lbdi.composite()),
            ));
        };
        self.source_descriptor = Some(bd);
        Ok(7)
    }

    // Step 7.
    fn dispatch_on_type(&mut self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let Some(bd) = self.source_descriptor.clone() else {
            return Err(self.source_exception(AddressingExceptionReason::Fatal));
        };
        let wrong_type = self.source_exception(AddressingExceptionReason::BdTypeInvalid);
        if self.interrupt().is_some() && bd.bank_type != BankType::ExtendedMode {
            return Err(Abort::Stop(
                StopReason::InterruptHandlerInvalidBankType,
                Word36::masked(self.source.lbdi.composite()),
            ));
        }
        self.target = self.source;
        self.target_descriptor = Some(bd.clone());
        match bd.bank_type {
            BankType::ExtendedMode => Ok(10),
            BankType::BasicMode => {
                if self.operation == Operation::Lbu && engine.processor_privilege() > 1 && !can_enter_at_all(&bd) {
                    self.target_descriptor = None;
                } else if self.is_return() && !self.frame.is_some_and(|frame| frame_is_basic(&frame)) {
                    return Err(wrong_type);
                }
                Ok(10)
            }
            BankType::Gate => {
                if self.is_return() || self.operation == Operation::Ur {
                    Err(wrong_type)
                } else if self.may_call() || self.operation == Operation::Goto {
                    Ok(9)
                } else {
                    Ok(10)
                }
            }
            BankType::Indirect => {
                if self.is_return() || matches!(self.operation, Operation::Lae | Operation::Ur) {
                    Err(wrong_type)
                } else {
                    Ok(8)
                }
            }
            _ => Err(wrong_type),
        }
    }

    // Step 8.
    fn indirect(&mut self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let Some(bd) = self.source_descriptor.clone() else {
            return Err(self.source_exception(AddressingExceptionReason::Fatal));
        };
        if bd.general_fault {
            return Err(self.source_exception(AddressingExceptionReason::IndirectGBitSet));
        }
        let lbdi = bd.indirect_lbdi;
        if lbdi.level == 0 && lbdi.bdi < 32 {
            return Err(self.source_exception(AddressingExceptionReason::InvalidSourceLevelBdi));
        }
        self.target = VirtualAddress {
            lbdi,
            offset: self.source.offset,
        };
        let Some(target) = find_bank_descriptor(engine, lbdi) else {
            return Err(self.target_exception(AddressingExceptionReason::Fatal));
        };
        self.target_descriptor = Some(target.clone());
        match target.bank_type {
            BankType::ExtendedMode => Ok(10),
            BankType::BasicMode => {
                if engine.processor_privilege() > 1 && !can_enter_at_all(&target) {
                    self.target_descriptor = None;
                }
                Ok(10)
            }
            BankType::Gate if self.may_call() || self.operation == Operation::Goto => {
                // The gate bank stands in for the indirect bank from
                // here on.
                self.source = self.target;
                self.source_descriptor = Some(target);
                Ok(9)
            }
            _ => Err(self.target_exception(AddressingExceptionReason::Fatal)),
        }
    }

    // Step 9.
    fn enter_gate(&mut self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let Some(bd) = self.source_descriptor.clone() else {
            return Err(self.source_exception(AddressingExceptionReason::Fatal));
        };
        if bd.general_fault {
            return Err(self.source_exception(AddressingExceptionReason::GateGBitSet));
        }
        let key = engine.asp.ikr.access_key;
        if !bd.effective_permissions(&key).enter {
            return Err(self.source_exception(AddressingExceptionReason::EnterAccessDenied));
        }
        let offset = self.source.offset;
        let lower = bd.lower_limit_normalized();
        if offset < lower || offset > bd.upper_limit_normalized() || offset & 0o7 != 0 {
            return Err(self.source_exception(AddressingExceptionReason::GateBankBoundaryViolation));
        }
        let words = engine
            .storage
            .read_slice(bd.base_address.add_offset(offset - lower), Gate::SIZE as u64)?;
        let Some(gate) = Gate::from_words(&words) else {
            return Err(self.source_exception(AddressingExceptionReason::Fatal));
        };
        if !gate.effective_permissions(&key).enter {
            return Err(self.source_exception(AddressingExceptionReason::EnterAccessDenied));
        }
        let goto = self.operation == Operation::Goto || (self.is_lxj() && self.lxj.interface_spec == 0);
        if goto && gate.goto_inhibit {
            return Err(self.source_exception(AddressingExceptionReason::GotoInhibit));
        }
        if gate.target.lbdi.level == 0 && gate.target.lbdi.bdi < 32 {
            return Err(self.source_exception(AddressingExceptionReason::Fatal));
        }
        self.target = gate.target;
        let Some(target) = find_bank_descriptor(engine, gate.target.lbdi) else {
            return Err(self.source_exception(AddressingExceptionReason::Fatal));
        };
        event!(Level::DEBUG, "{}: passing through gate at {} to {}", engine.name, self.source, gate.target);
        self.target_descriptor = Some(target);
        self.gate = Some(gate);
        Ok(10)
    }

    // Step 10.
    fn choose_base_register(&mut self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let a = engine.current_instruction().a() as usize;
        match self.operation {
            Operation::Lae => return Ok(18),
            Operation::Lbe => {
                self.base_register = a + 16;
                return Ok(18);
            }
            Operation::Lbu => {
                self.base_register = a;
                return Ok(18);
            }
            Operation::Ur | Operation::Interrupt(_) => {
                self.base_register = 0;
                return Ok(16);
            }
            _ => {}
        }

        let source_basic = engine.basic_mode();
        let destination_basic = if self.is_return() {
            self.frame.is_some_and(|frame| frame_is_basic(&frame))
        } else {
            self.target_descriptor
                .as_ref()
                .map_or(source_basic, |bd| bd.bank_type == BankType::BasicMode)
        };
        let frame_register = self.frame.map(|frame| frame.basic_mode_base_register as usize + 12);
        (self.transfer, self.base_register) = match (source_basic, destination_basic) {
            (true, true) => {
                let brx = match frame_register {
                    Some(brx) => brx,
                    None => self.lxj_base_register(engine),
                };
                (Transfer::BasicToBasic, brx)
            }
            (false, true) => {
                let brx = frame_register
                    .or_else(|| self.gate.as_ref().map(|gate| gate.basic_mode_base_register as usize + 12))
                    .unwrap_or(12);
                (Transfer::ExtendedToBasic, brx)
            }
            (true, false) => (Transfer::BasicToExtended, 0),
            (false, false) => (Transfer::ExtendedToExtended, 0),
        };
        Ok(11)
    }

    // Step 11.
    fn release_prior_bank(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        match self.transfer {
            Transfer::ExtendedToBasic => {
                engine.base_registers[0].make_void();
                engine.asp.par.lbdi = LevelBdi::VOID;
            }
            Transfer::BasicToBasic => engine.base_registers[self.base_register].make_void(),
            _ => {}
        }
        Ok(12)
    }

    // Step 12.
    fn push_frame(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if !self.pushes_frame() {
            return Ok(13);
        }
        let overflow = |relative_address: u64| {
            Abort::Interrupt(Interrupt::RcsStack {
                condition: RcsStackCondition::Overflow,
                base_register: RCS_BASE_REGISTER as u64,
                relative_address,
            })
        };
        let Some(lower) = engine.base_registers[RCS_BASE_REGISTER]
            .descriptor()
            .map(BankDescriptor::lower_limit_normalized)
        else {
            return Err(overflow(0));
        };
        let pointer = engine.grs.get(EX0).xm();
        if pointer < lower + RcsFrame::SIZE as u64 {
            return Err(overflow(pointer));
        }
        let frame_pointer = pointer - RcsFrame::SIZE as u64;

        let basic_mode_base_register = match (self.transfer, &self.gate) {
            (Transfer::ExtendedToBasic, Some(gate)) => gate.basic_mode_base_register,
            (Transfer::BasicToExtended, _) if self.is_lxj() => (self.lxj_base_register(engine) - 12) as u64,
            _ => 0,
        };
        let frame = RcsFrame {
            return_to: VirtualAddress {
                lbdi: self.prior,
                offset: (engine.asp.par.program_counter + 1) & 0o777_777,
            },
            trap: false,
            basic_mode_base_register,
            designator_bits: engine.asp.dr.composite() & DesignatorRegister::BITS_12_17,
            access_key: engine.asp.ikr.access_key,
        };
        let address = engine.base_registers[RCS_BASE_REGISTER]
            .absolute_address(frame_pointer)
            .ok_or(overflow(frame_pointer))?;
        engine.storage.write_slice(address, &frame.to_words())?;
        let ex0 = engine.grs.get(EX0);
        engine.grs.set(EX0, ex0.with_xm(frame_pointer));
        event!(Level::DEBUG, "{}: pushed RCS frame {frame:?} at {frame_pointer:06o}", engine.name);
        Ok(13)
    }

    // Step 13.
    fn update_x_register(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if self.is_lxj() && self.transfer == Transfer::BasicToBasic && !self.is_return() {
            let next = engine.asp.par.program_counter + 1;
            let value = LxjRegister {
                address: BasicVirtualAddress::translate(self.prior.level, self.prior.bdi, next),
                bank_selector: (self.base_register & 0o3) as u64,
                interface_spec: 0,
            };
            let a = engine.current_instruction().a();
            engine.set_x_register(a, value.composite());
        } else if self.operation == Operation::Call && self.transfer == Transfer::ExtendedToBasic {
            engine.set_x_register(11, Word36::masked(IS_RETURN << 30));
        }
        Ok(14)
    }

    // Step 14.
    fn update_x0(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if self.pushes_frame() {
            let mut value = engine.asp.ikr.access_key.composite();
            if engine.basic_mode() {
                value |= Word36::SIGN_BIT;
            }
            engine.grs.set(X0, Word36::masked(value));
        }
        Ok(15)
    }

    // Step 15.
    fn apply_gate(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        let Some(gate) = &self.gate else {
            return Ok(16);
        };
        if !gate.designator_inhibit {
            // DB16 follows the transfer mode rather than the gate.
            let mask = DesignatorRegister::BITS_12_17 & !DesignatorRegister::mask(16);
            let bits = (engine.asp.dr.composite() & !mask) | (gate.designator_bits & mask);
            engine.asp.dr.set_composite(bits);
        }
        if !gate.access_key_inhibit {
            engine.asp.ikr.access_key = gate.new_access_key;
        }
        if !gate.latent_parameter0_inhibit {
            engine.set_r_register(0, gate.latent_parameter0);
        }
        if !gate.latent_parameter1_inhibit {
            engine.set_r_register(1, gate.latent_parameter1);
        }
        self.apply_transfer_mode(engine);
        Ok(17)
    }

    /// Set DB16 to match the destination of a transfer.
    fn apply_transfer_mode(&self, engine: &mut InstructionEngine) {
        match self.transfer {
            Transfer::ExtendedToBasic => engine.asp.dr.set_basic_mode_enabled(true),
            Transfer::BasicToExtended => engine.asp.dr.set_basic_mode_enabled(false),
            _ => {}
        }
    }

    // Step 16.
    fn update_state(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if let Some(interrupt) = self.interrupt() {
            engine.asp.par.lbdi = self.target.lbdi;
            engine.asp.par.set_program_counter(self.target.offset);
            let mut dr = DesignatorRegister::default();
            dr.set_exec_register_set_selected(true);
            dr.set_arithmetic_exception_enabled(true);
            dr.set_basic_mode_enabled(
                self.target_descriptor
                    .as_ref()
                    .is_some_and(|bd| bd.bank_type == BankType::BasicMode),
            );
            dr.set_basic_mode_base_register_selection(engine.asp.dr.basic_mode_base_register_selection());
            dr.set_fault_handling_in_progress(matches!(interrupt, Interrupt::HardwareCheck { .. }));
            engine.asp.dr = dr;
            engine.asp.ikr.clear();
        } else if self.operation == Operation::Ur {
            engine.asp.load_from_words(&self.operands);
        } else if let (true, Some(frame)) = (self.is_return(), self.frame) {
            engine.asp.ikr.access_key = frame.access_key;
            let bits = (engine.asp.dr.composite() & !DesignatorRegister::BITS_12_17) | frame.designator_bits;
            engine.asp.dr.set_composite(bits);
        } else {
            self.apply_transfer_mode(engine);
        }
        Ok(17)
    }

    // Step 17.
    fn update_program_counter(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if self.transfer != Transfer::None {
            engine.set_program_counter(self.target.offset, true);
        } else if self.operation == Operation::Ur {
            // The restored PAR is where execution resumes.
            engine.prevent_pc_update = true;
        }
        Ok(18)
    }

    // Step 18.
    fn update_active_base_table(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if self.base_register == 0 {
            if self.interrupt().is_none() && self.operation != Operation::Ur {
                engine.asp.par.lbdi = self.target.lbdi;
            }
        } else if self.base_register < 16 {
            engine.active_base_table[self.base_register] = match self.target_descriptor {
                None => ActiveBaseTableEntry::default(),
                Some(_) => {
                    let subset = if self.is_load() { self.target.offset } else { 0 };
                    ActiveBaseTableEntry::new(self.target.lbdi.level, self.target.lbdi.bdi, subset)
                }
            };
        }
        Ok(19)
    }

    // Step 19.
    fn load_base_register(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        engine.base_registers[self.base_register] = match &self.target_descriptor {
            None => BaseRegister::void(),
            Some(bd) if self.is_load() && self.target.offset != 0 => {
                BaseRegister::from_bank_descriptor_with_subsetting(bd.clone(), self.target.offset)
            }
            Some(bd) => BaseRegister::from_bank_descriptor(bd.clone()),
        };
        Ok(20)
    }

    // Step 20.
    fn reset_fetch_register(&self, engine: &mut InstructionEngine) -> Result<u8, Abort> {
        if self.transfer.to_basic() {
            engine.fetch_base_register = 0;
        }
        Ok(21)
    }

    // Step 21.
    fn final_checks(&self, engine: &InstructionEngine) -> Result<u8, Abort> {
        let Some(bd) = &self.target_descriptor else {
            return Ok(0);
        };
        let transfer = self.transfer != Transfer::None;
        let fatal = self.target_exception(AddressingExceptionReason::Fatal);
        if bd.general_fault && (transfer || matches!(self.operation, Operation::Lbe | Operation::Lbu)) {
            return Err(fatal);
        }
        let enter = bd.effective_permissions(&engine.asp.ikr.access_key).enter;
        let basic = bd.bank_type == BankType::BasicMode;
        if transfer && self.gate.is_none() && !self.is_return() && !self.transfer.to_basic() && !enter {
            return Err(self.target_exception(AddressingExceptionReason::EnterAccessDenied));
        }
        if transfer && self.gate.is_none() && basic && !enter && self.target.offset != bd.lower_limit_normalized() {
            return Err(fatal);
        }
        if transfer
            && basic
            && (self.gate.is_some() || !enter)
            && engine.base_registers[self.base_register]
                .check_access_limits(engine.asp.par.program_counter, false)
                .is_err()
        {
            return Err(fatal);
        }
        if self.frame.is_some_and(|frame| frame.trap) {
            return Err(fatal);
        }
        Ok(0)
    }
}

fn frame_is_basic(frame: &RcsFrame) -> bool {
    frame.designator_bits & DesignatorRegister::mask(16) != 0
}

/// Whether either permission set of `bd` grants enter access.
fn can_enter_at_all(bd: &BankDescriptor) -> bool {
    bd.general_permissions.enter || bd.special_permissions.enter
}

/// Read the descriptor for `lbdi` from the bank descriptor table for
/// its level (based on B16 through B23).
fn find_bank_descriptor(engine: &InstructionEngine, lbdi: LevelBdi) -> Option<BankDescriptor> {
    let table = &engine.base_registers[L0_BDT_BASE_REGISTER + lbdi.level as usize];
    let lower = table.descriptor()?.lower_limit_normalized();
    let relative = lower + lbdi.bdi * BANK_DESCRIPTOR_WORDS;
    table
        .check_access_limits_range(relative, BANK_DESCRIPTOR_WORDS, false)
        .ok()?;
    let words = engine
        .storage
        .read_slice(table.absolute_address(relative)?, BANK_DESCRIPTOR_WORDS)
        .ok()?;
    BankDescriptor::from_words(&words)
}

/// The handler address for `interrupt`, from the vector at the
/// start of the level 0 bank descriptor table.
fn interrupt_vector(engine: &InstructionEngine, interrupt: Interrupt) -> Result<VirtualAddress, Abort> {
    let table = &engine.base_registers[L0_BDT_BASE_REGISTER];
    let Some(bd) = table.descriptor() else {
        return Err(Abort::Stop(StopReason::L0BaseRegisterInvalid, Word36::ZERO));
    };
    let relative = bd.lower_limit_normalized() + interrupt.class();
    let out_of_range = Abort::Stop(
        StopReason::InterruptHandlerOffsetOutOfRange,
        Word36::masked(interrupt.class()),
    );
    if !table.contains(relative) {
        return Err(out_of_range);
    }
    let address = table.absolute_address(relative).ok_or(out_of_range)?;
    let vector = engine
        .storage
        .read(address)
        .map_err(|_| Abort::Stop(StopReason::InterruptHandlerHardwareFailure, Word36::masked(interrupt.class())))?;
    Ok(VirtualAddress::from_word(vector))
}

/// Pop the top frame from the return control stack (B25, with the
/// stack pointer in EX0).
fn pop_frame(engine: &mut InstructionEngine) -> Result<RcsFrame, Abort> {
    let rcs = &engine.base_registers[RCS_BASE_REGISTER];
    let Some(upper) = rcs.descriptor().map(BankDescriptor::upper_limit_normalized) else {
        return Err(Interrupt::RcsStack {
            condition: RcsStackCondition::Overflow,
            base_register: RCS_BASE_REGISTER as u64,
            relative_address: 0,
        }
        .into());
    };
    let ex0 = engine.grs.get(EX0);
    let pointer = ex0.xm();
    let underflow = Abort::Interrupt(Interrupt::RcsStack {
        condition: RcsStackCondition::Underflow,
        base_register: RCS_BASE_REGISTER as u64,
        relative_address: pointer,
    });
    if pointer + RcsFrame::SIZE as u64 > upper + 1 || !rcs.contains(pointer) {
        return Err(underflow);
    }
    let address = rcs.absolute_address(pointer).ok_or(underflow)?;
    let words = engine.storage.read_slice(address, RcsFrame::SIZE as u64)?;
    let frame = RcsFrame::from_words(&words).ok_or(underflow)?;
    engine.grs.set(EX0, ex0.with_xm(pointer + RcsFrame::SIZE as u64));
    Ok(frame)
}
