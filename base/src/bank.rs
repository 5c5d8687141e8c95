//! Bank descriptors and the structures the bank manipulator reads
//! out of storage: gates and return control stack frames.
//!
//! All three are plain values.  They are decoded from (and encoded
//! into) slices of [`Word36`] and carry no reference to the storage
//! they came from.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::access::{AccessKey, AccessLock, AccessPermissions};
use crate::address::{AbsoluteAddress, LevelBdi, VirtualAddress};
use crate::onescomplement::word36::Word36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BankType {
    ExtendedMode,
    BasicMode,
    Gate,
    Indirect,
    Queue,
    Postern,
    QueueRepository,
    DataExpanse,
}

impl BankType {
    #[must_use]
    pub const fn from_code(code: u64) -> BankType {
        match code & 0o7 {
            0 => BankType::ExtendedMode,
            1 => BankType::BasicMode,
            2 => BankType::Gate,
            3 => BankType::Indirect,
            4 => BankType::Queue,
            5 => BankType::Postern,
            6 => BankType::QueueRepository,
            _ => BankType::DataExpanse,
        }
    }

    #[must_use]
    pub const fn code(&self) -> u64 {
        match self {
            BankType::ExtendedMode => 0,
            BankType::BasicMode => 1,
            BankType::Gate => 2,
            BankType::Indirect => 3,
            BankType::Queue => 4,
            BankType::Postern => 5,
            BankType::QueueRepository => 6,
            BankType::DataExpanse => 7,
        }
    }
}

impl Display for BankType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BankType::ExtendedMode => "extended",
            BankType::BasicMode => "basic",
            BankType::Gate => "gate",
            BankType::Indirect => "indirect",
            BankType::Queue => "queue",
            BankType::Postern => "postern",
            BankType::QueueRepository => "queue-repository",
            BankType::DataExpanse => "data-expanse",
        })
    }
}

/// The static description of a bank, as held in a bank descriptor
/// table.  Limits are kept in their granular (stored) form; use
/// [`BankDescriptor::lower_limit_normalized`] and
/// [`BankDescriptor::upper_limit_normalized`] for word values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankDescriptor {
    pub general_permissions: AccessPermissions,
    pub special_permissions: AccessPermissions,
    pub bank_type: BankType,
    /// Resolving this descriptor through the bank manipulator raises
    /// an addressing exception.
    pub general_fault: bool,
    pub large_bank: bool,
    pub upper_limit_suppression: bool,
    pub access_lock: AccessLock,
    /// Only meaningful for indirect banks.
    pub indirect_lbdi: LevelBdi,
    pub lower_limit: u64,
    pub upper_limit: u64,
    pub inactive: bool,
    pub displacement: u64,
    pub base_address: AbsoluteAddress,
    pub inactive_qbd_next: u64,
}

impl BankDescriptor {
    /// Words occupied by one descriptor in a bank descriptor table.
    pub const SIZE: usize = 8;

    /// Build a basic or extended mode descriptor from word-granular
    /// limits, rounding them up to the granularity the bank size
    /// requires.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        basic_mode: bool,
        access_lock: AccessLock,
        general_permissions: AccessPermissions,
        special_permissions: AccessPermissions,
        base_address: AbsoluteAddress,
        large_bank: bool,
        lower_limit: u64,
        upper_limit: u64,
        displacement: u64,
    ) -> BankDescriptor {
        let (ll, ul) = if large_bank {
            (
                (lower_limit >> 15) + u64::from(lower_limit & 0o77_777 != 0),
                (upper_limit >> 6) + u64::from(upper_limit & 0o77 != 0),
            )
        } else {
            (
                (lower_limit >> 9) + u64::from(lower_limit & 0o777 != 0),
                upper_limit,
            )
        };
        BankDescriptor {
            general_permissions,
            special_permissions,
            bank_type: if basic_mode {
                BankType::BasicMode
            } else {
                BankType::ExtendedMode
            },
            general_fault: false,
            large_bank,
            upper_limit_suppression: false,
            access_lock,
            indirect_lbdi: LevelBdi::VOID,
            lower_limit: ll & 0o777,
            upper_limit: ul & 0o777_777_777,
            inactive: false,
            displacement: displacement & 0o77_777,
            base_address,
            inactive_qbd_next: 0,
        }
    }

    /// An indirect descriptor naming another bank.
    #[must_use]
    pub fn new_indirect(target: LevelBdi) -> BankDescriptor {
        BankDescriptor {
            general_permissions: AccessPermissions::NONE,
            special_permissions: AccessPermissions::NONE,
            bank_type: BankType::Indirect,
            general_fault: false,
            large_bank: false,
            upper_limit_suppression: false,
            access_lock: AccessLock::new(0, 0),
            indirect_lbdi: target,
            lower_limit: 0,
            upper_limit: 0,
            inactive: false,
            displacement: 0,
            base_address: AbsoluteAddress::default(),
            inactive_qbd_next: 0,
        }
    }

    /// The same descriptor with a different bank type.  Gate banks are
    /// built this way from an extended mode descriptor.
    #[must_use]
    pub fn with_type(mut self, bank_type: BankType) -> BankDescriptor {
        self.bank_type = bank_type;
        self
    }

    #[must_use]
    pub fn with_general_fault(mut self, general_fault: bool) -> BankDescriptor {
        self.general_fault = general_fault;
        self
    }

    #[must_use]
    pub const fn lower_limit_normalized(&self) -> u64 {
        if self.large_bank {
            self.lower_limit << 15
        } else {
            self.lower_limit << 9
        }
    }

    #[must_use]
    pub const fn upper_limit_normalized(&self) -> u64 {
        if self.large_bank {
            self.upper_limit << 6
        } else {
            self.upper_limit
        }
    }

    /// Whether `relative` lies within the normalized limits.
    #[must_use]
    pub const fn contains(&self, relative: u64) -> bool {
        relative >= self.lower_limit_normalized() && relative <= self.upper_limit_normalized()
    }

    /// The permissions `key` has for this bank.
    #[must_use]
    pub fn effective_permissions(&self, key: &AccessKey) -> AccessPermissions {
        self.access_lock
            .effective_permissions(key, self.general_permissions, self.special_permissions)
    }

    /// Decode from at least five words of a bank descriptor table.
    #[must_use]
    pub fn from_words(words: &[Word36]) -> Option<BankDescriptor> {
        let [w0, w1, w2, w3, w4, ..] = words else {
            return None;
        };
        let w0 = w0.bits();
        let bank_type = BankType::from_code(w0 >> 26);
        let (indirect_lbdi, lower_limit, upper_limit) = if bank_type == BankType::Indirect {
            (LevelBdi::from_composite(w1.h1()), 0, 0)
        } else {
            (
                LevelBdi::VOID,
                (w1.bits() >> 27) & 0o777,
                w1.bits() & 0o777_777_777,
            )
        };
        // An inactive queue bank keeps its queue link where the base
        // offset would be.
        let inactive = w4.is_negative();
        let (offset, inactive_qbd_next) = if bank_type == BankType::Queue && inactive {
            (0, w3.bits())
        } else {
            (w3.bits(), 0)
        };
        Some(BankDescriptor {
            general_permissions: AccessPermissions::from_composite(w0 >> 33),
            special_permissions: AccessPermissions::from_composite(w0 >> 30),
            bank_type,
            general_fault: w0 & 0o000_020_000_000 != 0,
            large_bank: w0 & 0o000_004_000_000 != 0,
            upper_limit_suppression: w0 & 0o000_002_000_000 != 0,
            access_lock: AccessLock::from_composite(w0 & 0o777_777),
            indirect_lbdi,
            lower_limit,
            upper_limit,
            inactive,
            displacement: (w4.bits() >> 18) & 0o77_777,
            base_address: AbsoluteAddress::new(w2.bits(), offset),
            inactive_qbd_next,
        })
    }

    /// Encode into the eight-word table layout.
    #[must_use]
    pub fn to_words(&self) -> [Word36; BankDescriptor::SIZE] {
        let mut w0 = (self.general_permissions.composite() << 33)
            | (self.special_permissions.composite() << 30)
            | (self.bank_type.code() << 26)
            | self.access_lock.composite();
        if self.general_fault {
            w0 |= 0o000_020_000_000;
        }
        if self.large_bank {
            w0 |= 0o000_004_000_000;
        }
        if self.upper_limit_suppression {
            w0 |= 0o000_002_000_000;
        }

        let w1 = if self.bank_type == BankType::Indirect {
            self.indirect_lbdi.composite() << 18
        } else {
            (self.lower_limit << 27) | self.upper_limit
        };

        let w3 = if self.bank_type == BankType::Queue && self.inactive {
            self.inactive_qbd_next
        } else {
            self.base_address.offset
        };

        let mut w4 = (self.displacement & 0o77_777) << 18;
        if self.inactive {
            w4 |= Word36::SIGN_BIT;
        }

        let mut words = [Word36::ZERO; BankDescriptor::SIZE];
        words[0] = Word36::masked(w0);
        words[1] = Word36::masked(w1);
        words[2] = Word36::masked(self.base_address.segment);
        words[3] = Word36::masked(w3);
        words[4] = Word36::masked(w4);
        words
    }
}

/// One eight-word entry of a gate bank.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Gate {
    /// Only the enter bit is significant.
    pub general_permissions: AccessPermissions,
    pub special_permissions: AccessPermissions,
    pub library: bool,
    pub goto_inhibit: bool,
    pub designator_inhibit: bool,
    pub access_key_inhibit: bool,
    pub latent_parameter0_inhibit: bool,
    pub latent_parameter1_inhibit: bool,
    pub access_lock: AccessLock,
    pub target: VirtualAddress,
    /// The basic mode base register is this plus 12.
    pub basic_mode_base_register: u64,
    /// DR bits 12 through 17, in place.
    pub designator_bits: u64,
    pub new_access_key: AccessKey,
    pub latent_parameter0: Word36,
    pub latent_parameter1: Word36,
}

impl Gate {
    pub const SIZE: usize = 8;

    #[must_use]
    pub fn from_words(words: &[Word36]) -> Option<Gate> {
        let [w0, w1, w2, w3, w4, ..] = words else {
            return None;
        };
        let b0 = w0.bits();
        Some(Gate {
            general_permissions: AccessPermissions::new(b0 & 0o400_000_000_000 != 0, false, false),
            special_permissions: AccessPermissions::new(b0 & 0o040_000_000_000 != 0, false, false),
            library: b0 & 0o040_000_000 != 0,
            goto_inhibit: b0 & 0o020_000_000 != 0,
            designator_inhibit: b0 & 0o010_000_000 != 0,
            access_key_inhibit: b0 & 0o004_000_000 != 0,
            latent_parameter0_inhibit: b0 & 0o002_000_000 != 0,
            latent_parameter1_inhibit: b0 & 0o001_000_000 != 0,
            access_lock: AccessLock::from_composite(b0 & 0o777_777),
            target: VirtualAddress::new(w1.bits() >> 33, w1.h1() & 0o77_777, w1.h2()),
            basic_mode_base_register: (w2.bits() >> 24) & 0o3,
            designator_bits: w2.bits() & 0o000_077_000_000,
            new_access_key: AccessKey::from_composite(w2.h2()),
            latent_parameter0: *w3,
            latent_parameter1: *w4,
        })
    }

    #[must_use]
    pub fn to_words(&self) -> [Word36; Gate::SIZE] {
        let flag = |set: bool, bit: u64| if set { bit } else { 0 };
        let w0 = flag(self.general_permissions.enter, 0o400_000_000_000)
            | flag(self.special_permissions.enter, 0o040_000_000_000)
            | flag(self.library, 0o040_000_000)
            | flag(self.goto_inhibit, 0o020_000_000)
            | flag(self.designator_inhibit, 0o010_000_000)
            | flag(self.access_key_inhibit, 0o004_000_000)
            | flag(self.latent_parameter0_inhibit, 0o002_000_000)
            | flag(self.latent_parameter1_inhibit, 0o001_000_000)
            | self.access_lock.composite();
        let mut words = [Word36::ZERO; Gate::SIZE];
        words[0] = Word36::masked(w0);
        words[1] = self.target.composite();
        words[2] = Word36::masked(
            ((self.basic_mode_base_register & 0o3) << 24)
                | (self.designator_bits & 0o000_077_000_000)
                | self.new_access_key.composite(),
        );
        words[3] = self.latent_parameter0;
        words[4] = self.latent_parameter1;
        words
    }

    /// The permissions `key` has for this gate, judged by the gate's
    /// own lock.
    #[must_use]
    pub fn effective_permissions(&self, key: &AccessKey) -> AccessPermissions {
        self.access_lock
            .effective_permissions(key, self.general_permissions, self.special_permissions)
    }
}

/// A two-word return control stack frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RcsFrame {
    pub return_to: VirtualAddress,
    pub trap: bool,
    /// The basic mode base register to return through, less 12.
    pub basic_mode_base_register: u64,
    /// Saved DR bits 12 through 17, in place.
    pub designator_bits: u64,
    pub access_key: AccessKey,
}

impl RcsFrame {
    pub const SIZE: usize = 2;

    #[must_use]
    pub fn from_words(words: &[Word36]) -> Option<RcsFrame> {
        let [w0, w1, ..] = words else {
            return None;
        };
        Some(RcsFrame {
            return_to: VirtualAddress::from_word(*w0),
            trap: w1.is_negative(),
            basic_mode_base_register: (w1.bits() >> 24) & 0o3,
            designator_bits: w1.bits() & 0o000_077_000_000,
            access_key: AccessKey::from_composite(w1.h2()),
        })
    }

    #[must_use]
    pub fn to_words(&self) -> [Word36; RcsFrame::SIZE] {
        let mut w1 = ((self.basic_mode_base_register & 0o3) << 24)
            | (self.designator_bits & 0o000_077_000_000)
            | self.access_key.composite();
        if self.trap {
            w1 |= Word36::SIGN_BIT;
        }
        [self.return_to.composite(), Word36::masked(w1)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> BankDescriptor {
        BankDescriptor::new(
            false,
            AccessLock::new(2, 0o1234),
            AccessPermissions::new(false, true, false),
            AccessPermissions::ALL,
            AbsoluteAddress::new(3, 0o4000),
            false,
            0o1000,
            0o7777,
            0o123,
        )
    }

    #[test]
    fn test_small_bank_limits() {
        let bd = sample_descriptor();
        assert_eq!(bd.lower_limit, 1);
        assert_eq!(bd.lower_limit_normalized(), 0o1000);
        assert_eq!(bd.upper_limit_normalized(), 0o7777);
        assert!(bd.contains(0o1000));
        assert!(bd.contains(0o7777));
        assert!(!bd.contains(0o777));
        assert!(!bd.contains(0o10000));
    }

    #[test]
    fn test_large_bank_limits_round_up() {
        let bd = BankDescriptor::new(
            false,
            AccessLock::new(0, 0),
            AccessPermissions::ALL,
            AccessPermissions::ALL,
            AbsoluteAddress::default(),
            true,
            0o1,
            0o100_001,
            0,
        );
        assert_eq!(bd.lower_limit_normalized(), 0o100_000);
        assert_eq!(bd.upper_limit_normalized(), 0o100_100);
    }

    #[test]
    fn test_descriptor_words_keep_displacement_and_inactive() {
        let mut bd = sample_descriptor().with_general_fault(true);
        bd.inactive = true;
        let words = bd.to_words();
        assert!(words[5..].iter().all(|w| *w == Word36::ZERO));
        assert_eq!(BankDescriptor::from_words(&words), Some(bd));
    }

    #[test]
    fn test_inactive_queue_descriptor_words() {
        let mut bd = sample_descriptor();
        bd.bank_type = BankType::Queue;
        bd.base_address = AbsoluteAddress::new(3, 0);
        bd.inactive = true;
        bd.inactive_qbd_next = 0o555;
        let words = bd.to_words();
        assert_eq!(words[3], Word36::masked(0o555));
        assert_eq!(BankDescriptor::from_words(&words), Some(bd.clone()));

        // Once active the same word is the base offset again.
        bd.inactive = false;
        bd.inactive_qbd_next = 0;
        bd.base_address = AbsoluteAddress::new(3, 0o555);
        assert_eq!(BankDescriptor::from_words(&bd.to_words()), Some(bd));
    }

    #[test]
    fn test_indirect_descriptor_words() {
        let bd = BankDescriptor::new_indirect(LevelBdi::new(4, 0o40));
        let words = bd.to_words();
        assert_eq!(words[1], Word36::masked(0o400040_000000));
        assert_eq!(
            BankDescriptor::from_words(&words).map(|d| d.indirect_lbdi),
            Some(LevelBdi::new(4, 0o40))
        );
        assert_eq!(BankDescriptor::from_words(&words[..3]), None);
    }

    #[test]
    fn test_gate_words() {
        let gate = Gate {
            general_permissions: AccessPermissions::new(true, false, false),
            special_permissions: AccessPermissions::new(true, false, false),
            goto_inhibit: true,
            latent_parameter0_inhibit: true,
            access_lock: AccessLock::new(1, 0o7),
            target: VirtualAddress::new(2, 0o33, 0o1000),
            basic_mode_base_register: 2,
            designator_bits: 0o000_041_000_000,
            new_access_key: AccessKey::new(1, 0o7),
            latent_parameter0: Word36::masked(0o5),
            latent_parameter1: Word36::masked(0o6),
            ..Gate::default()
        };
        let decoded = Gate::from_words(&gate.to_words());
        assert_eq!(decoded, Some(gate));
    }

    #[test]
    fn test_rcs_frame_keeps_designator_bits() {
        let frame = RcsFrame {
            return_to: VirtualAddress::new(0, 0o41, 0o1004),
            trap: false,
            basic_mode_base_register: 3,
            designator_bits: 0o000_063_000_000,
            access_key: AccessKey::new(3, 0o17),
        };
        let words = frame.to_words();
        assert_eq!(words[0], Word36::masked(0o000041_001004));
        assert_eq!(RcsFrame::from_words(&words), Some(frame));
    }
}
