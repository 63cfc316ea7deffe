//! Pairing of scanned files into comparison candidates.

pub mod pairer;
