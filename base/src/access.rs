//! Access keys, locks and the permissions they yield.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Enter, read and write permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct AccessPermissions {
    pub enter: bool,
    pub read: bool,
    pub write: bool,
}

impl AccessPermissions {
    pub const NONE: AccessPermissions = AccessPermissions {
        enter: false,
        read: false,
        write: false,
    };
    pub const ALL: AccessPermissions = AccessPermissions {
        enter: true,
        read: true,
        write: true,
    };

    #[must_use]
    pub const fn new(enter: bool, read: bool, write: bool) -> AccessPermissions {
        AccessPermissions { enter, read, write }
    }

    /// Decode from the 3-bit E/R/W encoding (E is the high bit).
    #[must_use]
    pub const fn from_composite(value: u64) -> AccessPermissions {
        AccessPermissions {
            enter: value & 0o4 != 0,
            read: value & 0o2 != 0,
            write: value & 0o1 != 0,
        }
    }

    #[must_use]
    pub const fn composite(&self) -> u64 {
        ((self.enter as u64) << 2) | ((self.read as u64) << 1) | (self.write as u64)
    }
}

/// A (ring, domain) pair.  Keys and locks share this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct AccessKey {
    pub ring: u64,
    pub domain: u64,
}

pub type AccessLock = AccessKey;

impl AccessKey {
    /// The key which is granted all permissions regardless of lock.
    pub const MASTER: AccessKey = AccessKey {
        ring: 0o3,
        domain: 0o177_777,
    };

    #[must_use]
    pub const fn new(ring: u64, domain: u64) -> AccessKey {
        AccessKey {
            ring: ring & 0o3,
            domain: domain & 0o177_777,
        }
    }

    /// Decode from the 18-bit composite form: ring in the top two
    /// bits, domain in the low sixteen.
    #[must_use]
    pub const fn from_composite(value: u64) -> AccessKey {
        AccessKey::new(value >> 16, value)
    }

    #[must_use]
    pub const fn composite(&self) -> u64 {
        ((self.ring & 0o3) << 16) | (self.domain & 0o177_777)
    }

    #[must_use]
    pub fn is_master(&self) -> bool {
        *self == AccessKey::MASTER
    }

    /// The permissions a `key` gets against this lock: the special set
    /// when the key is the master key, the key's ring is more
    /// privileged than the lock's, or the domains match; the general
    /// set otherwise.
    #[must_use]
    pub fn effective_permissions(
        &self,
        key: &AccessKey,
        general: AccessPermissions,
        special: AccessPermissions,
    ) -> AccessPermissions {
        if key.is_master() {
            AccessPermissions::ALL
        } else if key.ring < self.ring || key.domain == self.domain {
            special
        } else {
            general
        }
    }
}

impl Display for AccessKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:06o}", self.ring, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAP: AccessPermissions = AccessPermissions::new(false, true, false);
    const SAP: AccessPermissions = AccessPermissions::new(true, true, true);

    #[test]
    fn test_composites() {
        let k = AccessKey::new(2, 0o1234);
        assert_eq!(k.composite(), 0o401234);
        assert_eq!(AccessKey::from_composite(0o401234), k);
        assert_eq!(AccessKey::MASTER.composite(), 0o777777);
        assert_eq!(AccessPermissions::from_composite(0o5).composite(), 0o5);
    }

    #[test]
    fn test_effective_permissions() {
        let lock = AccessLock::new(2, 0o100);
        assert_eq!(lock.effective_permissions(&AccessKey::MASTER, GAP, SAP), AccessPermissions::ALL);
        assert_eq!(lock.effective_permissions(&AccessKey::new(1, 0o7), GAP, SAP), SAP);
        assert_eq!(lock.effective_permissions(&AccessKey::new(3, 0o100), GAP, SAP), SAP);
        assert_eq!(lock.effective_permissions(&AccessKey::new(3, 0o7), GAP, SAP), GAP);
        assert_eq!(lock.effective_permissions(&AccessKey::new(2, 0o7), GAP, SAP), GAP);
    }
}
