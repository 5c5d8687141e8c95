//! Container types shared by the emulator.
pub mod pq;
