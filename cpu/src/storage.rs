//! Main storage and storage locks.
//!
//! Storage is a set of segments, each an ordered sequence of words,
//! addressed by [`AbsoluteAddress`].  It knows nothing of banks or
//! ones-complement arithmetic.  Several engines may share one
//! `MainStorage`; each access takes the internal mutex for just that
//! access, so a multi-word operation which must appear atomic to other
//! engines has to hold a storage lock (see [`StorageLocks`]).
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{event, Level};

use base::prelude::*;

/// Failures in managing (rather than accessing) storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    SegmentTableFull,
    SegmentInUse(u64),
    NoSuchSegment(u64),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::SegmentTableFull => f.write_str("main storage segment table is full"),
            StorageError::SegmentInUse(seg) => write!(f, "segment {seg:o} is already allocated"),
            StorageError::NoSuchSegment(seg) => write!(f, "segment {seg:o} is not allocated"),
        }
    }
}

impl Error for StorageError {}

fn hardware_check(segment: u64, offset: u64) -> Interrupt {
    Interrupt::HardwareCheck {
        address: AbsoluteAddress::new(segment, offset),
    }
}

#[derive(Debug)]
pub struct MainStorage {
    max_segments: usize,
    segments: Mutex<HashMap<u64, Vec<Word36>>>,
}

impl MainStorage {
    #[must_use]
    pub fn new(max_segments: usize) -> MainStorage {
        MainStorage {
            max_segments,
            segments: Mutex::new(HashMap::new()),
        }
    }

    fn segments(&self) -> MutexGuard<'_, HashMap<u64, Vec<Word36>>> {
        self.segments.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a zeroed segment of `length` words at the lowest free
    /// segment number.
    pub fn allocate(&self, length: usize) -> Result<u64, StorageError> {
        let mut segments = self.segments();
        if segments.len() >= self.max_segments {
            return Err(StorageError::SegmentTableFull);
        }
        let seg = (0..)
            .find(|n| !segments.contains_key(n))
            .ok_or(StorageError::SegmentTableFull)?;
        segments.insert(seg, vec![Word36::ZERO; length]);
        event!(Level::DEBUG, "allocated segment {seg:o} of {length:o} words");
        Ok(seg)
    }

    /// Allocate a zeroed segment with a particular number.
    pub fn allocate_at(&self, segment: u64, length: usize) -> Result<(), StorageError> {
        let mut segments = self.segments();
        if segments.contains_key(&segment) {
            return Err(StorageError::SegmentInUse(segment));
        }
        if segments.len() >= self.max_segments {
            return Err(StorageError::SegmentTableFull);
        }
        segments.insert(segment, vec![Word36::ZERO; length]);
        event!(Level::DEBUG, "allocated segment {segment:o} of {length:o} words");
        Ok(())
    }

    pub fn release(&self, segment: u64) -> Result<(), StorageError> {
        match self.segments().remove(&segment) {
            Some(_) => Ok(()),
            None => Err(StorageError::NoSuchSegment(segment)),
        }
    }

    /// Grow or shrink a segment, zero-filling any new words.
    pub fn resize(&self, segment: u64, length: usize) -> Result<(), StorageError> {
        match self.segments().get_mut(&segment) {
            Some(words) => {
                words.resize(length, Word36::ZERO);
                Ok(())
            }
            None => Err(StorageError::NoSuchSegment(segment)),
        }
    }

    pub fn clear(&self) {
        self.segments().clear();
    }

    #[must_use]
    pub fn segment_len(&self, segment: u64) -> Option<usize> {
        self.segments().get(&segment).map(Vec::len)
    }

    /// Copies `length` words starting at `address`.  Out-of-segment
    /// references are hardware checks.
    pub fn read_slice(&self, address: AbsoluteAddress, length: u64) -> Result<Vec<Word36>, Interrupt> {
        let segments = self.segments();
        let words = segments
            .get(&address.segment)
            .ok_or_else(|| hardware_check(address.segment, address.offset))?;
        let start = usize::try_from(address.offset).map_err(|_| hardware_check(address.segment, address.offset))?;
        let end = usize::try_from(address.offset + length)
            .map_err(|_| hardware_check(address.segment, address.offset))?;
        words
            .get(start..end)
            .map(<[Word36]>::to_vec)
            .ok_or_else(|| hardware_check(address.segment, address.offset))
    }

    pub fn read(&self, address: AbsoluteAddress) -> Result<Word36, Interrupt> {
        self.read_slice(address, 1).map(|words| words[0])
    }

    pub fn write_slice(&self, address: AbsoluteAddress, values: &[Word36]) -> Result<(), Interrupt> {
        let mut segments = self.segments();
        let words = segments
            .get_mut(&address.segment)
            .ok_or_else(|| hardware_check(address.segment, address.offset))?;
        let start = usize::try_from(address.offset).map_err(|_| hardware_check(address.segment, address.offset))?;
        match words.get_mut(start..start + values.len()) {
            Some(dest) => {
                dest.copy_from_slice(values);
                Ok(())
            }
            None => Err(hardware_check(address.segment, address.offset)),
        }
    }

    pub fn write(&self, address: AbsoluteAddress, value: Word36) -> Result<(), Interrupt> {
        self.write_slice(address, &[value])
    }

    /// Log the contents of every segment at TRACE level.
    pub fn dump(&self) {
        let segments = self.segments();
        let mut numbers: Vec<&u64> = segments.keys().collect();
        numbers.sort();
        for seg in numbers {
            event!(Level::TRACE, "segment {seg:o}:");
            if let Some(words) = segments.get(seg) {
                for (row, chunk) in words.chunks(8).enumerate() {
                    let text: Vec<String> = chunk.iter().map(ToString::to_string).collect();
                    event!(Level::TRACE, "  {:08o}: {}", row * 8, text.join(" "));
                }
            }
        }
    }
}

/// Cooperative locks on storage words, each held by a named client.
/// The map is ordered by address, so a client which needs several
/// locks can take them in ascending order.
#[derive(Debug, Default)]
pub struct StorageLocks {
    locks: Mutex<BTreeMap<AbsoluteAddress, String>>,
}

impl StorageLocks {
    #[must_use]
    pub fn new() -> StorageLocks {
        StorageLocks::default()
    }

    fn locks(&self) -> MutexGuard<'_, BTreeMap<AbsoluteAddress, String>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock on `address` for `client`.  Returns false if some
    /// client (including this one) already holds it.
    pub fn lock(&self, address: AbsoluteAddress, client: &str) -> bool {
        let mut locks = self.locks();
        if locks.contains_key(&address) {
            return false;
        }
        locks.insert(address, client.to_owned());
        true
    }

    /// Release one lock.  Returns false if `client` did not hold it.
    pub fn release(&self, address: AbsoluteAddress, client: &str) -> bool {
        let mut locks = self.locks();
        match locks.get(&address) {
            Some(holder) if holder == client => {
                locks.remove(&address);
                true
            }
            _ => false,
        }
    }

    pub fn release_all(&self, client: &str) {
        self.locks().retain(|_, holder| holder != client);
    }

    #[must_use]
    pub fn held_by(&self, client: &str) -> Vec<AbsoluteAddress> {
        self.locks()
            .iter()
            .filter(|(_, holder)| holder.as_str() == client)
            .map(|(addr, _)| *addr)
            .collect()
    }

    #[must_use]
    pub fn is_locked(&self, address: AbsoluteAddress) -> bool {
        self.locks().contains_key(&address)
    }

    pub fn dump(&self) {
        for (addr, holder) in self.locks().iter() {
            event!(Level::DEBUG, "storage lock {addr} held by {holder}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_access() {
        let storage = MainStorage::new(4);
        let seg = storage.allocate(16).expect("allocation should succeed");
        assert_eq!(seg, 0);
        storage.allocate_at(3, 4).expect("allocation should succeed");
        assert_eq!(storage.allocate_at(3, 4), Err(StorageError::SegmentInUse(3)));

        let addr = AbsoluteAddress::new(seg, 5);
        storage.write(addr, Word36::masked(0o123)).expect("in range");
        assert_eq!(storage.read(addr), Ok(Word36::masked(0o123)));
        assert_eq!(
            storage.read_slice(addr, 2),
            Ok(vec![Word36::masked(0o123), Word36::ZERO])
        );
    }

    #[test]
    fn test_out_of_range_is_hardware_check() {
        let storage = MainStorage::new(1);
        storage.allocate_at(2, 8).expect("allocation should succeed");
        assert!(matches!(
            storage.read(AbsoluteAddress::new(2, 8)),
            Err(Interrupt::HardwareCheck { .. })
        ));
        assert!(storage.write(AbsoluteAddress::new(1, 0), Word36::ZERO).is_err());
        assert_eq!(storage.allocate(1), Err(StorageError::SegmentTableFull));
    }

    #[test]
    fn test_storage_locks() {
        let locks = StorageLocks::new();
        let a = AbsoluteAddress::new(0, 0o100);
        let b = AbsoluteAddress::new(0, 0o50);
        assert!(locks.lock(a, "IP0"));
        assert!(!locks.lock(a, "IP1"));
        assert!(locks.lock(b, "IP0"));
        assert_eq!(locks.held_by("IP0"), vec![b, a]);
        assert!(!locks.release(a, "IP1"));
        locks.release_all("IP0");
        assert!(!locks.is_locked(a));
        assert!(locks.held_by("IP0").is_empty());
    }
}
