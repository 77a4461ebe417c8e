//! Control Plane Module
//!
//! The engine facade that composes the FCP components, and the API that
//! exposes it.

pub mod api;
pub mod engine;

pub use api::*;
pub use engine::*;
