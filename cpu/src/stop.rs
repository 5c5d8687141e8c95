//! Processor stops.
//!
//! A stop is the one failure an interrupt handler cannot field: the
//! interrupt vectors themselves are unusable, or the program asked to
//! halt.  Once stopped, an engine does nothing until it is cleared.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum StopReason {
    Initial,
    Cleared,
    Debug,
    Development,
    Breakpoint,
    HaltJumpExecuted,
    IcsBaseRegisterInvalid,
    IcsOverflow,
    InitiateAutoRecovery,
    L0BaseRegisterInvalid,
    PanelHalt,
    InterruptHandlerHardwareFailure,
    InterruptHandlerOffsetOutOfRange,
    InterruptHandlerInvalidBankType,
    InterruptHandlerInvalidLevelBdi,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            StopReason::Initial => "Initial",
            StopReason::Cleared => "Cleared",
            StopReason::Debug => "Debug",
            StopReason::Development => "Development",
            StopReason::Breakpoint => "Breakpoint",
            StopReason::HaltJumpExecuted => "HaltJumpExecuted",
            StopReason::IcsBaseRegisterInvalid => "ICSBaseRegisterInvalid",
            StopReason::IcsOverflow => "ICSOverflow",
            StopReason::InitiateAutoRecovery => "InitiateAutoRecovery",
            StopReason::L0BaseRegisterInvalid => "L0BaseRegisterInvalid",
            StopReason::PanelHalt => "PanelHalt",
            StopReason::InterruptHandlerHardwareFailure => "InterruptHandlerHardwareFailure",
            StopReason::InterruptHandlerOffsetOutOfRange => "InterruptHandlerOffsetOutOfRange",
            StopReason::InterruptHandlerInvalidBankType => "InterruptHandlerInvalidBankType",
            StopReason::InterruptHandlerInvalidLevelBdi => "InterruptHandlerInvalidLevelBDI",
        })
    }
}

impl StopReason {
    #[must_use]
    pub const fn all_stop_reasons() -> [StopReason; 15] {
        [
            StopReason::Initial,
            StopReason::Cleared,
            StopReason::Debug,
            StopReason::Development,
            StopReason::Breakpoint,
            StopReason::HaltJumpExecuted,
            StopReason::IcsBaseRegisterInvalid,
            StopReason::IcsOverflow,
            StopReason::InitiateAutoRecovery,
            StopReason::L0BaseRegisterInvalid,
            StopReason::PanelHalt,
            StopReason::InterruptHandlerHardwareFailure,
            StopReason::InterruptHandlerOffsetOutOfRange,
            StopReason::InterruptHandlerInvalidBankType,
            StopReason::InterruptHandlerInvalidLevelBdi,
        ]
    }
}

#[derive(Debug)]
pub struct UnknownStopReason(String);

impl Display for UnknownStopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown stop reason '{}'", self.0)
    }
}

impl Error for UnknownStopReason {}

impl TryFrom<&str> for StopReason {
    type Error = UnknownStopReason;
    fn try_from(s: &str) -> Result<StopReason, UnknownStopReason> {
        StopReason::all_stop_reasons()
            .into_iter()
            .find(|reason| reason.to_string() == s)
            .ok_or_else(|| UnknownStopReason(s.to_owned()))
    }
}

#[test]
fn test_stop_reason_round_trip() {
    for orig in StopReason::all_stop_reasons() {
        let name = orig.to_string();
        match StopReason::try_from(name.as_str()) {
            Ok(r) => {
                assert_eq!(r, orig);
            }
            Err(_) => {
                panic!("unable to round-trip stop reason {orig:?}");
            }
        }
    }
    assert!(StopReason::try_from("this is not a stop reason").is_err());
}
