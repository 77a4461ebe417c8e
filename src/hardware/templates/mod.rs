//! Multipath Template Module
//!
//! Template lifecycle, default bindings and usage reporting.

pub mod defaults;
pub mod report;
pub mod store;

pub use defaults::DefaultBindingResolver;
pub use store::TemplateStore;
