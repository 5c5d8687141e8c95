//! Conversion errors.

use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

/// A native value could not be represented as a [`super::word36::Word36`]
/// (or one of its fields).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionFailed {
    TooLarge,
    TooSmall,
}

impl Error for ConversionFailed {}

impl Display for ConversionFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConversionFailed::TooLarge => f.write_str("value does not fit in 36 bits"),
            ConversionFailed::TooSmall => f.write_str("value is below the 36-bit signed range"),
        }
    }
}
