//! Base registers and the active base table.
//!
//! A base register binds a bank descriptor for use by instructions.
//! The descriptor is copied in; the register never refers back to the
//! table it came from.  Relative addresses are translated by taking
//! their distance from the bank's normalized lower limit, adding any
//! sub-setting offset, and adding the result to the bank's base
//! absolute address.
use serde::Serialize;

use base::prelude::*;

pub const BASE_REGISTER_COUNT: usize = 32;

/// The base register holding the level-0 bank descriptor table; the
/// table for level n is on B(16+n).
pub const L0_BDT_BASE_REGISTER: usize = 16;
pub const ICS_BASE_REGISTER: usize = 26;
pub const RCS_BASE_REGISTER: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BaseRegister {
    descriptor: Option<BankDescriptor>,
    subsetting: u64,
}

impl BaseRegister {
    #[must_use]
    pub fn void() -> BaseRegister {
        BaseRegister::default()
    }

    #[must_use]
    pub fn from_bank_descriptor(bd: BankDescriptor) -> BaseRegister {
        BaseRegister {
            descriptor: Some(bd),
            subsetting: 0,
        }
    }

    /// Bind `bd` with a sub-setting offset, which is added to every
    /// address translated through the register.
    #[must_use]
    pub fn from_bank_descriptor_with_subsetting(bd: BankDescriptor, offset: u64) -> BaseRegister {
        BaseRegister {
            descriptor: Some(bd),
            subsetting: offset,
        }
    }

    pub fn make_void(&mut self) {
        self.descriptor = None;
        self.subsetting = 0;
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.descriptor.is_none()
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<&BankDescriptor> {
        self.descriptor.as_ref()
    }

    #[must_use]
    pub fn subsetting(&self) -> u64 {
        self.subsetting
    }

    /// Whether `relative` is within the normalized limits.  A void
    /// register contains nothing.
    #[must_use]
    pub fn contains(&self, relative: u64) -> bool {
        self.descriptor.as_ref().is_some_and(|bd| bd.contains(relative))
    }

    /// Fails with a storage-limits reference violation unless
    /// `relative` lies within the bank.
    pub fn check_access_limits(&self, relative: u64, fetch: bool) -> Result<(), Interrupt> {
        if self.contains(relative) {
            Ok(())
        } else {
            Err(Interrupt::storage_limits(fetch))
        }
    }

    /// Like [`BaseRegister::check_access_limits`], for `count` words
    /// starting at `relative`.
    pub fn check_access_limits_range(&self, relative: u64, count: u64, fetch: bool) -> Result<(), Interrupt> {
        self.check_access_limits(relative, fetch)?;
        if count > 1 {
            self.check_access_limits(relative + count - 1, fetch)?;
        }
        Ok(())
    }

    /// The permissions `key` has to this bank; a void register grants
    /// none.
    #[must_use]
    pub fn effective_permissions(&self, key: &AccessKey) -> AccessPermissions {
        self.descriptor
            .as_ref()
            .map_or(AccessPermissions::NONE, |bd| bd.effective_permissions(key))
    }

    /// Translate a relative address.  The caller is responsible for
    /// limits checking.
    #[must_use]
    pub fn absolute_address(&self, relative: u64) -> Option<AbsoluteAddress> {
        self.descriptor.as_ref().map(|bd| {
            bd.base_address
                .add_offset(self.subsetting + relative.wrapping_sub(bd.lower_limit_normalized()))
        })
    }
}

/// What one of B1..B15 is currently bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActiveBaseTableEntry {
    pub lbdi: LevelBdi,
    pub subset: u64,
}

impl ActiveBaseTableEntry {
    #[must_use]
    pub const fn new(level: u64, bdi: u64, subset: u64) -> ActiveBaseTableEntry {
        ActiveBaseTableEntry {
            lbdi: LevelBdi::new(level, bdi),
            subset: subset & 0o777_777,
        }
    }

    #[must_use]
    pub const fn from_word(w: Word36) -> ActiveBaseTableEntry {
        let bits = w.bits();
        ActiveBaseTableEntry::new(bits >> 33, bits >> 18, bits)
    }

    #[must_use]
    pub const fn composite(&self) -> Word36 {
        Word36::masked((self.lbdi.level << 33) | (self.lbdi.bdi << 18) | self.subset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(lower: u64, upper: u64) -> BankDescriptor {
        BankDescriptor::new(
            false,
            AccessLock::new(0, 0),
            AccessPermissions::new(false, true, false),
            AccessPermissions::ALL,
            AbsoluteAddress::new(1, 0o1000),
            false,
            lower,
            upper,
            0,
        )
    }

    #[test]
    fn test_void_register_faults() {
        let br = BaseRegister::void();
        assert_eq!(br.check_access_limits(0, false), Err(Interrupt::storage_limits(false)));
        assert_eq!(br.effective_permissions(&AccessKey::MASTER), AccessPermissions::NONE);
        assert_eq!(br.absolute_address(0), None);
    }

    #[test]
    fn test_translation() {
        let br = BaseRegister::from_bank_descriptor(bank(0o1000, 0o1777));
        assert_eq!(br.absolute_address(0o1000), Some(AbsoluteAddress::new(1, 0o1000)));
        assert_eq!(br.absolute_address(0o1005), Some(AbsoluteAddress::new(1, 0o1005)));
        let sub = BaseRegister::from_bank_descriptor_with_subsetting(bank(0o1000, 0o1777), 0o100);
        assert_eq!(sub.absolute_address(0o1000), Some(AbsoluteAddress::new(1, 0o1100)));
    }

    #[test]
    fn test_range_limits() {
        let br = BaseRegister::from_bank_descriptor(bank(0, 0o777));
        assert!(br.check_access_limits_range(0o770, 8, false).is_ok());
        assert!(br.check_access_limits_range(0o771, 8, false).is_err());
    }

    #[test]
    fn test_abt_entry_words() {
        let e = ActiveBaseTableEntry::new(6, 0o1234, 0o77);
        assert_eq!(ActiveBaseTableEntry::from_word(e.composite()), e);
    }
}
