//! Domain layer - Core record types and port definitions
//!
//! This module defines the table rows of the FCP store and the traits
//! (ports) that adapters implement, following hexagonal architecture
//! principles.

pub mod fcp;
pub mod ports;
pub mod template;

pub use fcp::*;
pub use ports::*;
pub use template::*;
