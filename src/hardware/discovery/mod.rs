//! FCP Discovery Module
//!
//! Inventory sources that report the FCP devices visible on the fleet.

pub mod inventory;

pub use inventory::*;
