//! Hardware Module
//!
//! FCP device registry, multipath templates, path-aware allocation and
//! fleet discovery.

pub mod allocation;
pub mod discovery;
pub mod range;
pub mod registry;
pub mod templates;

#[cfg(test)]
pub(crate) mod testing;

pub use allocation::*;
pub use discovery::*;
pub use range::*;
pub use registry::*;
pub use templates::*;
