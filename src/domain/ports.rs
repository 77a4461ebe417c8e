//! Domain Ports - trait definitions at the engine's outer seams
//!
//! Adapters implement these traits to feed the engine with data it does not
//! own, such as what the hypervisor fleet currently reports.

use super::fcp::FcpInfo;
use crate::error::Result;
use std::sync::Arc;

// =============================================================================
// FCP Inventory Port
// =============================================================================

/// Source of the FCP devices the fleet currently reports
pub trait FcpInventory: Send + Sync {
    /// All FCP devices visible on the fleet right now
    fn discover(&self) -> Result<Vec<FcpInfo>>;

    /// Name of the inventory source, for logging
    fn source_name(&self) -> &str;
}

impl std::fmt::Debug for dyn FcpInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FcpInventory({})", self.source_name())
    }
}

pub type FcpInventoryRef = Arc<dyn FcpInventory>;
