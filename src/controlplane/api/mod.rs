//! API Module
//!
//! REST surface of the FCP engine and the server that hosts it.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
