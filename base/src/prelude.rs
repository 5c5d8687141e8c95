//! The prelude exports the types most users of the base crate need.
pub use super::access::*;
pub use super::address::*;
pub use super::bank::*;
pub use super::instruction::*;
pub use super::interrupt::*;
pub use super::onescomplement::double::*;
pub use super::onescomplement::error::*;
pub use super::onescomplement::word36::*;
pub use super::onescomplement::{sign_extend_12, sign_extend_18, sign_extend_24, Sign, WordCommon};
pub use super::subword::*;
pub use super::w36;
