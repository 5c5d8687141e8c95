//! This crate emulates one 36-bit instruction processor: its register
//! state, the instruction repertoire, the bank manipulator and the
//! interrupt mechanism, running against shared main storage.
#![crate_name = "cpu"]

pub mod asp;
pub mod basereg;
pub mod breakpoint;
mod control;
pub mod grs;
pub mod interrupts;
pub mod jumphistory;
pub mod stop;
pub mod storage;

pub use asp::{ActivityStatePacket, DesignatorRegister, IndicatorKeyRegister, ProgramAddressRegister};
pub use basereg::{ActiveBaseTableEntry, BaseRegister};
pub use breakpoint::{BreakpointComparison, BreakpointRegister};
pub use control::{Access, Completion, EngineConfig, InstructionEngine, Location};
pub use grs::GeneralRegisterSet;
pub use jumphistory::JumpHistory;
pub use stop::{StopReason, UnknownStopReason};
pub use storage::{MainStorage, StorageError, StorageLocks};
