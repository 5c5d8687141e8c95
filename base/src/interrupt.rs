//! The architectural interrupts.
//!
//! Every fault an instruction can raise, and every external event the
//! processor can be told about, is an [`Interrupt`].  Interrupts are
//! values: they are built where the condition is detected, posted to
//! the engine's pending stack, and consumed when the engine enters the
//! level-0 handler for their class.
//!
//! | Class | Interrupt |
//! |---|---|
//! | 0 | hardware default |
//! | 1 | hardware check |
//! | 8 | reference violation |
//! | 9 | addressing exception |
//! | 10 | terminal addressing exception |
//! | 11 | RCS/generic stack under/overflow |
//! | 12 | signal |
//! | 13 | test and set |
//! | 14 | invalid instruction |
//! | 15 | arithmetic exception |
//! | 17 | data exception |
//! | 18 | operation trap |
//! | 19 | breakpoint |
//! | 20 | quantum timer |
//! | 24 | software break |
//! | 25 | jump history full |
//! | 27 | day clock |
//! | 29 | initial program load |
//! | 30 | UPI initial |
//! | 31 | UPI normal |
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::address::{AbsoluteAddress, LevelBdi};
use crate::onescomplement::word36::Word36;

/// How an interrupt relates to the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Synchrony {
    Synchronous,
    Asynchronous,
    Broadcast,
    Pended,
}

/// Where in an instruction an interrupt may be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InterruptPoint {
    BetweenInstructions,
    MidExecution,
    IndirectExecute,
}

/// The first two bits of a reference violation's short status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReferenceViolationKind {
    Grs,
    StorageLimits,
    ReadAccess,
    WriteAccess,
}

impl ReferenceViolationKind {
    const fn code(&self) -> u64 {
        match self {
            ReferenceViolationKind::Grs => 0,
            ReferenceViolationKind::StorageLimits => 1,
            ReferenceViolationKind::ReadAccess => 2,
            ReferenceViolationKind::WriteAccess => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AddressingExceptionReason {
    Fatal,
    GateGBitSet,
    EnterAccessDenied,
    InvalidSourceLevelBdi,
    GateBankBoundaryViolation,
    InvalidIsValue,
    GotoInhibit,
    GeneralQueuingViolation,
    MaxCountEnq,
    IndirectGBitSet,
    InactiveQueueBdListEmpty,
    UpdateInProgress,
    QueueBankRepositoryFull,
    BdTypeInvalid,
    AccessDeniedPosternOrDataExpanse,
}

impl AddressingExceptionReason {
    #[must_use]
    pub const fn code(&self) -> u64 {
        use AddressingExceptionReason::*;
        match self {
            Fatal => 0o0,
            GateGBitSet => 0o1,
            EnterAccessDenied => 0o2,
            InvalidSourceLevelBdi => 0o3,
            GateBankBoundaryViolation => 0o4,
            InvalidIsValue => 0o5,
            GotoInhibit => 0o6,
            GeneralQueuingViolation => 0o7,
            MaxCountEnq => 0o10,
            IndirectGBitSet => 0o11,
            InactiveQueueBdListEmpty => 0o13,
            UpdateInProgress => 0o14,
            QueueBankRepositoryFull => 0o15,
            BdTypeInvalid => 0o16,
            AccessDeniedPosternOrDataExpanse => 0o17,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RcsStackCondition {
    Overflow,
    Underflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SignalSource {
    Er,
    Sgnl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InvalidInstructionReason {
    /// Undefined function code, also used for LBU into B0 or B1 and
    /// LxJ through X0.
    BadFunctionCode,
    BadProcessorPrivilege,
    ExrInvalidTarget,
    CompatibilityTrap,
}

impl InvalidInstructionReason {
    const fn code(&self) -> u64 {
        match self {
            InvalidInstructionReason::BadFunctionCode => 0,
            InvalidInstructionReason::BadProcessorPrivilege => 1,
            InvalidInstructionReason::ExrInvalidTarget => 3,
            InvalidInstructionReason::CompatibilityTrap => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArithmeticExceptionReason {
    CharacteristicOverflow,
    CharacteristicUnderflow,
    DivideCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationTrapReason {
    FixedPointBinaryOverflow,
    FixedPointDecimalOverflow,
    MultiplySingleIntegerOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Interrupt {
    HardwareDefault,
    HardwareCheck {
        address: AbsoluteAddress,
    },
    ReferenceViolation {
        kind: ReferenceViolationKind,
        fetch: bool,
    },
    AddressingException {
        reason: AddressingExceptionReason,
        source: LevelBdi,
    },
    TerminalAddressingException {
        status: u64,
        source: LevelBdi,
    },
    RcsStack {
        condition: RcsStackCondition,
        base_register: u64,
        relative_address: u64,
    },
    Signal {
        source: SignalSource,
        code: Word36,
    },
    TestAndSet {
        base_register: u64,
        relative_address: u64,
    },
    InvalidInstruction(InvalidInstructionReason),
    ArithmeticException(ArithmeticExceptionReason),
    DataException {
        status: u64,
    },
    OperationTrap(OperationTrapReason),
    Breakpoint,
    QuantumTimer,
    SoftwareBreak,
    JumpHistoryFull,
    DayClock,
    InitialProgramLoad,
    UpiInitial {
        source: u64,
    },
    UpiNormal {
        source: u64,
    },
}

impl Interrupt {
    /// The number of interrupt classes; also the number of vectors in
    /// the level-0 bank descriptor table.
    pub const CLASS_COUNT: u64 = 32;

    /// Class number; lower numbers are higher priority.
    #[must_use]
    pub const fn class(&self) -> u64 {
        use Interrupt::*;
        match self {
            HardwareDefault => 0,
            HardwareCheck { .. } => 1,
            ReferenceViolation { .. } => 8,
            AddressingException { .. } => 9,
            TerminalAddressingException { .. } => 10,
            RcsStack { .. } => 11,
            Signal { .. } => 12,
            TestAndSet { .. } => 13,
            InvalidInstruction(_) => 14,
            ArithmeticException(_) => 15,
            DataException { .. } => 17,
            OperationTrap(_) => 18,
            Breakpoint => 19,
            QuantumTimer => 20,
            SoftwareBreak => 24,
            JumpHistoryFull => 25,
            DayClock => 27,
            InitialProgramLoad => 29,
            UpiInitial { .. } => 30,
            UpiNormal { .. } => 31,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        use Interrupt::*;
        match self {
            HardwareDefault => "Hardware Default",
            HardwareCheck { .. } => "Hardware Check",
            ReferenceViolation { .. } => "Reference Violation",
            AddressingException { .. } => "Addressing Exception",
            TerminalAddressingException { .. } => "Terminal Addressing Exception",
            RcsStack { .. } => "RCS Generic Stack Under/Overflow",
            Signal { .. } => "Signal",
            TestAndSet { .. } => "Test And Set",
            InvalidInstruction(_) => "Invalid Instruction",
            ArithmeticException(_) => "Arithmetic Exception",
            DataException { .. } => "Data Exception",
            OperationTrap(_) => "Operation Trap",
            Breakpoint => "Breakpoint",
            QuantumTimer => "Quantum Timer",
            SoftwareBreak => "Software Break",
            JumpHistoryFull => "Jump History Full",
            DayClock => "Day Clock",
            InitialProgramLoad => "IPL",
            UpiInitial { .. } => "UPI Initial",
            UpiNormal { .. } => "UPI Normal",
        }
    }

    /// The short status field stored into the indicator/key register
    /// on entry to the handler.
    #[must_use]
    pub const fn short_status(&self) -> u64 {
        use Interrupt::*;
        match self {
            ReferenceViolation { kind, fetch } => (kind.code() << 4) | (*fetch as u64),
            AddressingException { reason, .. } => reason.code(),
            TerminalAddressingException { status, .. } => *status & 0o77,
            RcsStack { condition, .. } => match condition {
                RcsStackCondition::Overflow => 0,
                RcsStackCondition::Underflow => 1,
            },
            Signal { source, .. } => match source {
                SignalSource::Er => 0,
                SignalSource::Sgnl => 1,
            },
            InvalidInstruction(reason) => reason.code(),
            ArithmeticException(reason) => match reason {
                ArithmeticExceptionReason::CharacteristicOverflow => 0,
                ArithmeticExceptionReason::CharacteristicUnderflow => 1,
                ArithmeticExceptionReason::DivideCheck => 2,
            },
            DataException { status } => *status & 0o77,
            OperationTrap(reason) => match reason {
                OperationTrapReason::FixedPointBinaryOverflow => 0,
                OperationTrapReason::FixedPointDecimalOverflow => 1,
                OperationTrapReason::MultiplySingleIntegerOverflow => 2,
            },
            _ => 0,
        }
    }

    #[must_use]
    pub const fn synchrony(&self) -> Synchrony {
        use Interrupt::*;
        match self {
            HardwareCheck { .. }
            | ReferenceViolation { .. }
            | AddressingException { .. }
            | TerminalAddressingException { .. }
            | RcsStack { .. }
            | Signal { .. }
            | TestAndSet { .. }
            | InvalidInstruction(_)
            | ArithmeticException(_)
            | DataException { .. }
            | OperationTrap(_) => Synchrony::Synchronous,
            Breakpoint | SoftwareBreak => Synchrony::Pended,
            InitialProgramLoad | UpiInitial { .. } => Synchrony::Broadcast,
            HardwareDefault | QuantumTimer | JumpHistoryFull | DayClock | UpiNormal { .. } => {
                Synchrony::Asynchronous
            }
        }
    }

    /// Whether the interrupt is held pending while deferrable
    /// interrupts are disabled (DB14 clear).
    #[must_use]
    pub const fn is_deferrable(&self) -> bool {
        use Interrupt::*;
        matches!(
            self,
            RcsStack { .. }
                | Signal { .. }
                | ArithmeticException(_)
                | OperationTrap(_)
                | Breakpoint
                | JumpHistoryFull
        )
    }

    /// Whether the interrupt reports a fault in the interrupted
    /// instruction.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        use Interrupt::*;
        matches!(
            self,
            HardwareCheck { .. }
                | ReferenceViolation { .. }
                | AddressingException { .. }
                | TerminalAddressingException { .. }
                | RcsStack { .. }
                | TestAndSet { .. }
                | InvalidInstruction(_)
                | ArithmeticException(_)
                | DataException { .. }
        )
    }

    #[must_use]
    pub const fn interrupt_point(&self) -> InterruptPoint {
        use Interrupt::*;
        match self {
            HardwareCheck { .. } | ReferenceViolation { .. } => InterruptPoint::MidExecution,
            AddressingException { .. }
            | TerminalAddressingException { .. }
            | RcsStack { .. }
            | TestAndSet { .. }
            | InvalidInstruction(_)
            | ArithmeticException(_)
            | DataException { .. }
            | OperationTrap(_) => InterruptPoint::IndirectExecute,
            _ => InterruptPoint::BetweenInstructions,
        }
    }

    /// Interrupt status word 0.
    #[must_use]
    pub const fn status_word0(&self) -> Word36 {
        use Interrupt::*;
        match self {
            HardwareCheck { address } => Word36::masked(address.segment & 0o001_777_777_777),
            RcsStack {
                base_register,
                relative_address,
                ..
            } => Word36::masked(((*base_register & 0o37) << 30) | (*relative_address & 0o7_777_777_777)),
            Signal { code, .. } => *code,
            TestAndSet {
                base_register,
                relative_address,
            } => Word36::masked(((*base_register & 0o77) << 30) | (*relative_address & 0o77_777_777)),
            UpiInitial { source } | UpiNormal { source } => Word36::masked(*source),
            _ => Word36::ZERO,
        }
    }

    /// Interrupt status word 1.
    #[must_use]
    pub const fn status_word1(&self) -> Word36 {
        use Interrupt::*;
        match self {
            HardwareCheck { address } => Word36::masked(address.offset),
            AddressingException { source, .. } | TerminalAddressingException { source, .. } => {
                Word36::masked((source.level << 33) | (source.bdi << 18))
            }
            _ => Word36::ZERO,
        }
    }

    /// Shorthand for the most common fault.
    #[must_use]
    pub const fn storage_limits(fetch: bool) -> Interrupt {
        Interrupt::ReferenceViolation {
            kind: ReferenceViolationKind::StorageLimits,
            fetch,
        }
    }

    #[must_use]
    pub const fn addressing_exception(reason: AddressingExceptionReason, source: LevelBdi) -> Interrupt {
        Interrupt::AddressingException { reason, source }
    }
}

impl Display for Interrupt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({:03o}) SSF:{:03o} ISW0={} ISW1={}",
            self.name(),
            self.class(),
            self.short_status(),
            self.status_word0(),
            self.status_word1()
        )
    }
}

/// A host caller touching storage outside the emulated processor sees
/// faults as errors.
impl Error for Interrupt {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_violation_short_status() {
        let rv = Interrupt::ReferenceViolation {
            kind: ReferenceViolationKind::WriteAccess,
            fetch: false,
        };
        assert_eq!(rv.short_status(), 0o60);
        assert_eq!(Interrupt::storage_limits(true).short_status(), 0o21);
        assert_eq!(rv.class(), 8);
        assert!(rv.is_fault());
        assert!(!rv.is_deferrable());
    }

    #[test]
    fn test_addressing_exception_status_words() {
        let ae = Interrupt::addressing_exception(
            AddressingExceptionReason::IndirectGBitSet,
            LevelBdi::new(2, 0o101),
        );
        assert_eq!(ae.short_status(), 0o11);
        assert_eq!(ae.status_word0(), Word36::ZERO);
        assert_eq!(ae.status_word1(), Word36::masked(0o200101_000000));
    }

    #[test]
    fn test_classification() {
        assert_eq!(Interrupt::Breakpoint.synchrony(), Synchrony::Pended);
        assert_eq!(Interrupt::JumpHistoryFull.synchrony(), Synchrony::Asynchronous);
        assert!(Interrupt::JumpHistoryFull.is_deferrable());
        assert_eq!(
            Interrupt::InvalidInstruction(InvalidInstructionReason::ExrInvalidTarget).short_status(),
            3
        );
        assert_eq!(
            Interrupt::Signal {
                source: SignalSource::Sgnl,
                code: Word36::masked(0o77)
            }
            .status_word0(),
            Word36::masked(0o77)
        );
    }

    #[test]
    fn test_display() {
        let s = Interrupt::OperationTrap(OperationTrapReason::MultiplySingleIntegerOverflow).to_string();
        assert_eq!(s, "Operation Trap(022) SSF:002 ISW0=000000000000 ISW1=000000000000");
    }
}
