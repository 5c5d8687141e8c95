//! Emulates the instruction processor.
//!
//! An [`InstructionEngine`] owns the architectural state of one
//! activity: the activity state packet, the general register set, the
//! base registers and active base table, the pending interrupts and
//! the jump history.  Main storage is shared with any other engines.
//!
//! The host drives the engine by calling
//! [`InstructionEngine::do_cycle`].  Each cycle does one of the
//! following:
//!
//! - Take the highest priority pending interrupt (between
//!   instructions only)
//! - Fetch the next instruction into F0
//! - Advance the instruction in F0 by one step
//!
//! An instruction which cannot finish in one step (because it is part
//! way through an indirect address chain, or because it is executing
//! repeatedly under EXR) reports [`Completion::Incomplete`] and is
//! resumed on the following cycle.  An instruction which raises an
//! interrupt is abandoned; the program counter is not advanced, so
//! the instruction is retried once the interrupt handler returns.
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{event, span, Level};

mod bankmanip;
mod op_activity;
mod op_arith;
mod op_bank;
mod op_jump;
mod op_load;
mod op_logical;
mod op_shift;
mod op_special;
mod op_store;
mod op_system;
mod op_test;
mod operand;
mod tables;


use base::prelude::*;

use crate::asp::ActivityStatePacket;
use crate::basereg::{ActiveBaseTableEntry, BaseRegister, BASE_REGISTER_COUNT, ICS_BASE_REGISTER};
use crate::breakpoint::{BreakpointComparison, BreakpointRegister};
use crate::grs::{self, GeneralRegisterSet, EX1};
use crate::interrupts::InterruptStack;
use crate::jumphistory::JumpHistory;
use crate::stop::StopReason;
use crate::storage::{MainStorage, StorageLocks};

pub use operand::{Access, Location};

/// How far an instruction got on this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Complete,
    /// The instruction stays in F0 and is resumed on the next cycle.
    Incomplete,
}

/// The outcome of one step of an instruction.  An `Err` is an
/// interrupt which the engine posts before abandoning the
/// instruction.
pub type OpResult = Result<Completion, Interrupt>;

pub(crate) type Handler = fn(&mut InstructionEngine) -> OpResult;

/// Candidate base registers for basic mode instruction fetch, indexed
/// by DB31.
const BASIC_MODE_CANDIDATES: [[usize; 4]; 2] = [[12, 14, 13, 15], [13, 15, 12, 14]];

/// Words reserved on the interrupt control stack for each interrupt.
const ICS_FRAME_SIZE: u64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Identifies the engine as a storage lock client.
    pub name: String,
    pub processor_privilege: u64,
    /// When set, RNGI and RNGB produce a reproducible sequence.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            name: "IP0".to_owned(),
            processor_privilege: 0,
            rng_seed: None,
        }
    }
}

/// State captured so that an operation which fails part way through
/// leaves no trace.
#[derive(Debug, Clone)]
struct Snapshot {
    asp: ActivityStatePacket,
    grs: GeneralRegisterSet,
    base_registers: Vec<BaseRegister>,
    active_base_table: [ActiveBaseTableEntry; 16],
    fetch_base_register: usize,
    prevent_pc_update: bool,
}

#[derive(Debug)]
pub struct InstructionEngine {
    name: String,
    storage: Arc<MainStorage>,
    locks: Arc<StorageLocks>,
    asp: ActivityStatePacket,
    grs: GeneralRegisterSet,
    base_registers: Vec<BaseRegister>,
    active_base_table: [ActiveBaseTableEntry; 16],
    /// The base register basic mode instructions are being fetched
    /// through, or 0 if it has to be looked for again.
    fetch_base_register: usize,
    pending: InterruptStack,
    jump_history: JumpHistory,
    breakpoint: BreakpointRegister,
    cached_handler: Option<Handler>,
    prevent_pc_update: bool,
    instruction_point: InterruptPoint,
    stopped: bool,
    stop_reason: StopReason,
    stop_detail: Word36,
    rng: StdRng,
}

impl InstructionEngine {
    #[must_use]
    pub fn new(name: &str, storage: Arc<MainStorage>, locks: Arc<StorageLocks>) -> InstructionEngine {
        InstructionEngine::with_config(
            EngineConfig {
                name: name.to_owned(),
                ..EngineConfig::default()
            },
            storage,
            locks,
        )
    }

    /// A new engine starts out stopped (with reason
    /// [`StopReason::Initial`]); the host loads its state and then
    /// calls [`InstructionEngine::clear_stop`].
    #[must_use]
    pub fn with_config(config: EngineConfig, storage: Arc<MainStorage>, locks: Arc<StorageLocks>) -> InstructionEngine {
        let mut asp = ActivityStatePacket::new();
        asp.dr.set_processor_privilege(config.processor_privilege);
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        InstructionEngine {
            name: config.name,
            storage,
            locks,
            asp,
            grs: GeneralRegisterSet::new(),
            base_registers: vec![BaseRegister::void(); BASE_REGISTER_COUNT],
            active_base_table: [ActiveBaseTableEntry::default(); 16],
            fetch_base_register: 0,
            pending: InterruptStack::new(),
            jump_history: JumpHistory::new(),
            breakpoint: BreakpointRegister::default(),
            cached_handler: None,
            prevent_pc_update: false,
            instruction_point: InterruptPoint::BetweenInstructions,
            stopped: true,
            stop_reason: StopReason::Initial,
            stop_detail: Word36::ZERO,
            rng,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return every register, table and latch to its initial state.
    /// Storage is not touched, but any locks this engine holds are
    /// released.
    pub fn clear(&mut self) {
        let privilege = self.asp.dr.processor_privilege();
        self.asp = ActivityStatePacket::new();
        self.asp.dr.set_processor_privilege(privilege);
        self.grs.clear();
        self.base_registers.fill(BaseRegister::void());
        self.active_base_table = [ActiveBaseTableEntry::default(); 16];
        self.fetch_base_register = 0;
        self.pending.clear();
        self.jump_history.clear();
        self.breakpoint.clear();
        self.cached_handler = None;
        self.prevent_pc_update = false;
        self.instruction_point = InterruptPoint::BetweenInstructions;
        self.locks.release_all(&self.name);
    }

    // Stops.

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stop the engine.  The stop takes effect at the end of the
    /// current cycle.
    pub fn stop(&mut self, reason: StopReason, detail: Word36) {
        event!(Level::INFO, "{}: stopped: {reason} detail {detail}", self.name);
        self.stopped = true;
        self.stop_reason = reason;
        self.stop_detail = detail;
    }

    pub fn clear_stop(&mut self) {
        event!(Level::INFO, "{}: stop cleared", self.name);
        self.stopped = false;
        self.stop_reason = StopReason::Cleared;
        self.stop_detail = Word36::ZERO;
    }

    /// The reason for the most recent stop, and its detail word.
    #[must_use]
    pub fn stop_reason(&self) -> (StopReason, Word36) {
        (self.stop_reason, self.stop_detail)
    }

    // Interrupts.

    pub fn post_interrupt(&mut self, interrupt: Interrupt) {
        if self.pending.post(interrupt) {
            event!(Level::INFO, "{}: posted {interrupt}", self.name);
        }
    }

    /// Pending interrupts, highest priority first.
    #[must_use]
    pub fn pending_interrupts(&self) -> Vec<Interrupt> {
        self.pending.pending()
    }

    pub fn clear_interrupts(&mut self) {
        self.pending.clear();
    }

    /// The host calls this to run down the quantum timer.  When the
    /// timer is enabled (DB12) and goes negative, a quantum timer
    /// interrupt is posted.
    pub fn quantum_tick(&mut self, count: u64) {
        let before = self.asp.quantum_timer;
        let after = before.add_simple(Word36::masked(count).negate());
        self.asp.quantum_timer = after;
        if self.asp.dr.quantum_timer_enabled() && after.is_negative() && !before.is_negative() {
            self.post_interrupt(Interrupt::QuantumTimer);
        }
    }

    // State accessors for the host.

    #[must_use]
    pub fn asp(&self) -> &ActivityStatePacket {
        &self.asp
    }

    pub fn asp_mut(&mut self) -> &mut ActivityStatePacket {
        &mut self.asp
    }

    #[must_use]
    pub fn grs(&self) -> &GeneralRegisterSet {
        &self.grs
    }

    pub fn grs_mut(&mut self) -> &mut GeneralRegisterSet {
        &mut self.grs
    }

    /// # Panics
    ///
    /// Panics if `index` is not a base register number.
    #[must_use]
    pub fn base_register(&self, index: usize) -> &BaseRegister {
        &self.base_registers[index]
    }

    /// Replace a base register.  The basic mode fetch bank is looked
    /// for again on the next fetch.
    pub fn set_base_register(&mut self, index: usize, register: BaseRegister) {
        self.base_registers[index % BASE_REGISTER_COUNT] = register;
        self.fetch_base_register = 0;
    }

    #[must_use]
    pub fn active_base_table_entry(&self, index: usize) -> ActiveBaseTableEntry {
        self.active_base_table[index & 0o17]
    }

    pub fn set_active_base_table_entry(&mut self, index: usize, entry: ActiveBaseTableEntry) {
        self.active_base_table[index & 0o17] = entry;
    }

    pub fn set_breakpoint(&mut self, breakpoint: BreakpointRegister) {
        self.breakpoint = breakpoint;
    }

    pub fn clear_breakpoint(&mut self) {
        self.breakpoint.clear();
    }

    pub fn jump_history_mut(&mut self) -> &mut JumpHistory {
        &mut self.jump_history
    }

    /// Set the program counter.  With `prevent_increment`, the
    /// counter is not advanced when the current instruction completes.
    pub fn set_program_counter(&mut self, pc: u64, prevent_increment: bool) {
        self.asp.par.set_program_counter(pc);
        self.prevent_pc_update = prevent_increment;
    }

    /// Log the engine state at DEBUG level.
    pub fn dump(&self) {
        event!(
            Level::DEBUG,
            "{}: PAR={} DR={} IKR={:012o} F0={}",
            self.name,
            self.asp.par,
            self.asp.dr,
            self.asp.ikr.composite(),
            self.asp.current_instruction.word()
        );
        for (n, br) in self.base_registers.iter().enumerate() {
            if let Some(bd) = br.descriptor() {
                event!(
                    Level::DEBUG,
                    "B{n}: {} base {} limits {:o}..{:o}",
                    bd.bank_type,
                    bd.base_address,
                    bd.lower_limit_normalized(),
                    bd.upper_limit_normalized()
                );
            }
        }
        self.pending.dump();
        self.locks.dump();
    }

    // Registers, as seen by the current instruction.

    fn exec_registers(&self) -> bool {
        self.asp.dr.exec_register_set_selected()
    }

    pub(crate) fn x_register(&self, n: u64) -> Word36 {
        self.grs.x(n, self.exec_registers())
    }

    pub(crate) fn set_x_register(&mut self, n: u64, value: Word36) {
        self.grs.set(grs::x_index(n, self.exec_registers()), value);
    }

    pub(crate) fn a_register(&self, n: u64) -> Word36 {
        self.grs.a(n, self.exec_registers())
    }

    pub(crate) fn set_a_register(&mut self, n: u64, value: Word36) {
        self.grs.set(grs::a_index(n, self.exec_registers()), value);
    }

    /// Aa, for the a field of the current instruction.
    pub(crate) fn aa(&self) -> Word36 {
        self.a_register(self.current_instruction().a())
    }

    pub(crate) fn r_register(&self, n: u64) -> Word36 {
        self.grs.r(n, self.exec_registers())
    }

    pub(crate) fn set_r_register(&mut self, n: u64, value: Word36) {
        self.grs.set(grs::r_index(n, self.exec_registers()), value);
    }

    fn current_instruction(&self) -> InstructionWord {
        self.asp.current_instruction
    }

    fn basic_mode(&self) -> bool {
        self.asp.dr.basic_mode_enabled()
    }

    fn processor_privilege(&self) -> u64 {
        self.asp.dr.processor_privilege()
    }

    /// Fails unless the processor privilege is at least as high
    /// (numerically no greater) than `required`.
    fn require_privilege(&self, required: u64) -> Result<(), Interrupt> {
        if self.processor_privilege() > required {
            Err(Interrupt::InvalidInstruction(InvalidInstructionReason::BadProcessorPrivilege))
        } else {
            Ok(())
        }
    }

    /// The virtual address of the current instruction.
    fn current_virtual_address(&self) -> VirtualAddress {
        let pc = self.asp.par.program_counter;
        if self.basic_mode() {
            let brx = match self.fetch_base_register {
                0 => self.find_basic_mode_bank(pc),
                n => n,
            };
            let lbdi = self.active_base_table[brx & 0o17].lbdi;
            VirtualAddress::new(lbdi.level, lbdi.bdi, pc)
        } else {
            self.asp.par.virtual_address()
        }
    }

    /// Note a jump taken from `from` in the jump history.
    fn record_jump(&mut self, from: VirtualAddress) {
        if let Some(interrupt) = self.jump_history.store_entry(from) {
            self.post_interrupt(interrupt);
        }
    }

    fn check_breakpoint(&mut self, comparison: BreakpointComparison, address: AbsoluteAddress) {
        self.check_breakpoint_range(comparison, address, 1);
    }

    fn check_breakpoint_range(&mut self, comparison: BreakpointComparison, start: AbsoluteAddress, count: u64) {
        if self.breakpoint.matches_range(comparison, start, count) {
            event!(Level::INFO, "{}: breakpoint matched ({comparison:?} at {start})", self.name);
            self.asp.ikr.breakpoint_match = true;
            if self.breakpoint.halt {
                self.stop(StopReason::Breakpoint, Word36::ZERO);
            } else {
                self.post_interrupt(Interrupt::Breakpoint);
            }
        }
    }

    // Banks.

    /// The basic mode base register (12 through 15) whose bank
    /// contains `relative`, searching in the order DB31 selects.
    /// Returns 0 if there is none.
    #[must_use]
    pub fn find_basic_mode_bank(&self, relative: u64) -> usize {
        let db31 = usize::from(self.asp.dr.basic_mode_base_register_selection());
        BASIC_MODE_CANDIDATES[db31]
            .into_iter()
            .find(|&brx| self.base_registers[brx].contains(relative))
            .unwrap_or(0)
    }

    /// Limits and permission checks for `count` words at `relative`
    /// through base register `brx`.
    fn check_access(
        &self,
        brx: usize,
        relative: u64,
        count: u64,
        fetch: bool,
        read: bool,
        write: bool,
    ) -> Result<(), Interrupt> {
        let basic = self.basic_mode();
        if fetch && relative < grs::GRS_SIZE && (basic || brx == 0) {
            return Err(Interrupt::storage_limits(true));
        }
        let br = &self.base_registers[brx];
        br.check_access_limits_range(relative, count, fetch)?;
        let permissions = br.effective_permissions(&self.asp.ikr.access_key);
        if fetch && basic && !permissions.enter {
            return Err(Interrupt::ReferenceViolation {
                kind: ReferenceViolationKind::ReadAccess,
                fetch: true,
            });
        }
        if read && !permissions.read {
            return Err(Interrupt::ReferenceViolation {
                kind: ReferenceViolationKind::ReadAccess,
                fetch,
            });
        }
        if write && !permissions.write {
            return Err(Interrupt::ReferenceViolation {
                kind: ReferenceViolationKind::WriteAccess,
                fetch,
            });
        }
        Ok(())
    }

    fn absolute_address(&self, brx: usize, relative: u64) -> Result<AbsoluteAddress, Interrupt> {
        self.base_registers[brx]
            .absolute_address(relative)
            .ok_or(Interrupt::storage_limits(false))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            asp: self.asp.clone(),
            grs: self.grs.clone(),
            base_registers: self.base_registers.clone(),
            active_base_table: self.active_base_table,
            fetch_base_register: self.fetch_base_register,
            prevent_pc_update: self.prevent_pc_update,
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.asp = snapshot.asp;
        self.grs = snapshot.grs;
        self.base_registers = snapshot.base_registers;
        self.active_base_table = snapshot.active_base_table;
        self.fetch_base_register = snapshot.fetch_base_register;
        self.prevent_pc_update = snapshot.prevent_pc_update;
    }

    // The engine cycle.

    /// Run one cycle.  Does nothing while the engine is stopped.
    pub fn do_cycle(&mut self) {
        if self.stopped {
            return;
        }
        if !self.asp.ikr.instruction_in_f0 {
            let deferrable = self.asp.dr.deferrable_interrupts_enabled();
            if let Some(interrupt) = self.pending.pop_eligible(deferrable, InterruptPoint::BetweenInstructions) {
                self.enter_interrupt_handler(interrupt);
            } else if let Err(interrupt) = self.fetch_instruction() {
                self.post_interrupt(interrupt);
            }
            return;
        }

        let ci = self.current_instruction();
        let span = span!(Level::INFO, "xop", par=%self.asp.par, f=ci.f(), j=ci.j(), a=ci.a());
        let _enter = span.enter();

        let was_repeating = self.asp.ikr.executing_repeated;
        let outcome = if was_repeating && self.r_register(1).is_zero() {
            Ok(Completion::Complete)
        } else {
            match self.execute_current_instruction() {
                Ok(Completion::Complete) if was_repeating => {
                    let r1 = self.r_register(1).add_simple(Word36::NEGATIVE_ONE);
                    self.set_r_register(1, r1);
                    if self.prevent_pc_update {
                        Ok(Completion::Complete)
                    } else {
                        Ok(Completion::Incomplete)
                    }
                }
                other => other,
            }
        };

        match outcome {
            Ok(Completion::Complete) => self.complete_instruction(),
            Ok(Completion::Incomplete) => {
                let deferrable = self.asp.dr.deferrable_interrupts_enabled();
                if self.pending.has_eligible(deferrable, self.instruction_point) {
                    event!(Level::DEBUG, "{}: suspending {} for a pending interrupt", self.name, ci.word());
                    self.abandon_instruction();
                }
            }
            Err(interrupt) => {
                event!(Level::DEBUG, "{}: instruction {} raised {interrupt}", self.name, ci.word());
                self.post_interrupt(interrupt);
                self.abandon_instruction();
            }
        }
    }

    fn fetch_instruction(&mut self) -> Result<(), Interrupt> {
        let pc = self.asp.par.program_counter;
        let brx = if self.basic_mode() {
            if self.fetch_base_register == 0 {
                let brx = self.find_basic_mode_bank(pc);
                if brx == 0 {
                    return Err(Interrupt::storage_limits(true));
                }
                self.fetch_base_register = brx;
                self.asp.dr.set_basic_mode_base_register_selection(brx == 13 || brx == 15);
            }
            self.fetch_base_register
        } else {
            0
        };
        if self.base_registers[brx].descriptor().is_some_and(|bd| bd.large_bank) {
            return Err(Interrupt::storage_limits(true));
        }
        self.check_access(brx, pc, 1, true, false, false)?;
        let address = self.absolute_address(brx, pc)?;
        let word = self.storage.read(address)?;
        event!(Level::TRACE, "{}: fetched {word} from {address}", self.name);

        self.asp.current_instruction = InstructionWord::new(word);
        self.asp.ikr.instruction_in_f0 = true;
        self.asp.ikr.executing_repeated = false;
        self.cached_handler = None;
        self.check_breakpoint(BreakpointComparison::Fetch, address);
        Ok(())
    }

    fn execute_current_instruction(&mut self) -> OpResult {
        self.prevent_pc_update = false;
        if self.instruction_point == InterruptPoint::BetweenInstructions {
            self.instruction_point = InterruptPoint::MidExecution;
        }
        let handler = match self.cached_handler {
            Some(handler) => handler,
            None => {
                let Some(handler) = tables::lookup(self.basic_mode(), self.current_instruction()) else {
                    event!(
                        Level::WARN,
                        "{}: invalid instruction {} at {}",
                        self.name,
                        self.current_instruction().word(),
                        self.asp.par
                    );
                    return Err(Interrupt::InvalidInstruction(InvalidInstructionReason::BadFunctionCode));
                };
                self.cached_handler = Some(handler);
                handler
            }
        };
        handler(self)
    }

    fn complete_instruction(&mut self) {
        event!(Level::DEBUG, "{}: completed {}", self.name, self.current_instruction().word());
        self.locks.release_all(&self.name);
        self.asp.ikr.instruction_in_f0 = false;
        self.asp.ikr.executing_repeated = false;
        self.cached_handler = None;
        self.instruction_point = InterruptPoint::BetweenInstructions;
        if !self.prevent_pc_update {
            let pc = self.asp.par.program_counter + 1;
            self.asp.par.set_program_counter(pc);
        }
        self.prevent_pc_update = false;
    }

    /// Drop the instruction in F0 without advancing the program
    /// counter.
    fn abandon_instruction(&mut self) {
        self.locks.release_all(&self.name);
        self.asp.ikr.instruction_in_f0 = false;
        self.asp.ikr.executing_repeated = false;
        self.cached_handler = None;
        self.prevent_pc_update = false;
        self.instruction_point = InterruptPoint::BetweenInstructions;
    }

    // Interrupt entry.

    fn enter_interrupt_handler(&mut self, interrupt: Interrupt) {
        event!(Level::INFO, "{}: taking interrupt {interrupt} at {}", self.name, self.asp.par);
        self.asp.isw0 = interrupt.status_word0();
        self.asp.isw1 = interrupt.status_word1();
        self.asp.ikr.short_status = interrupt.short_status();
        self.asp.ikr.interrupt_class = interrupt.class();
        let ex1 = self.grs.get(EX1);
        if let Err((reason, detail)) = self.push_interrupt_control_stack() {
            self.stop(reason, detail);
            return;
        }
        match bankmanip::BankManipulator::for_interrupt(interrupt).run(self) {
            Ok(()) => {
                self.asp.ikr.short_status = interrupt.short_status();
                self.asp.ikr.interrupt_class = interrupt.class();
                self.fetch_base_register = 0;
                self.prevent_pc_update = false;
                self.instruction_point = InterruptPoint::BetweenInstructions;
            }
            Err(abort) => {
                // Pop the frame pushed above.
                self.grs.set(EX1, ex1);
                match abort {
                    bankmanip::Abort::Stop(reason, detail) => self.stop(reason, detail),
                    bankmanip::Abort::Interrupt(nested) => self.post_interrupt(nested),
                }
            }
        }
    }

    /// Save the activity state packet on the interrupt control stack
    /// (B26, with the stack pointer in EX1).
    fn push_interrupt_control_stack(&mut self) -> Result<(), (StopReason, Word36)> {
        let Some(lower) = self.base_registers[ICS_BASE_REGISTER]
            .descriptor()
            .map(BankDescriptor::lower_limit_normalized)
        else {
            return Err((StopReason::IcsBaseRegisterInvalid, Word36::ZERO));
        };
        let ex1 = self.grs.get(EX1);
        let pointer = ex1.xm();
        if pointer < lower + ICS_FRAME_SIZE {
            return Err((StopReason::IcsOverflow, Word36::masked(pointer)));
        }
        let frame = pointer - ICS_FRAME_SIZE;
        let address = self.base_registers[ICS_BASE_REGISTER]
            .absolute_address(frame)
            .ok_or((StopReason::IcsBaseRegisterInvalid, Word36::ZERO))?;
        self.storage
            .write_slice(address, &self.asp.to_words())
            .map_err(|_| (StopReason::InterruptHandlerHardwareFailure, Word36::masked(frame)))?;
        self.grs.set(EX1, ex1.with_xm(frame));
        Ok(())
    }
}
