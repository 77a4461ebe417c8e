//! FCP Device Registry Module
//!
//! Row-level operations on the `fcp` table: usage counters, reservation and
//! hardware sync.

pub mod device_registry;

pub use device_registry::*;
