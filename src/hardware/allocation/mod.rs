//! Allocation Module
//!
//! Path-aware FCP device selection and the select-and-reserve workflow.

pub mod allocator;
pub mod selection;

pub use allocator::*;
pub use selection::{
    common_free_indices, effective_min_paths, select_fcp_devices,
    select_fcp_devices_with_same_index, PathSlots,
};
