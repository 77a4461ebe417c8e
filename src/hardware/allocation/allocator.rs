//! FCP Allocation Engine
//!
//! Hands out devices from a template and reserves them for a guest. The
//! select-and-reserve sequence runs as one transaction, so two concurrent
//! requests can never pick the same device.

use super::selection::{path_slots, select_fcp_devices, select_fcp_devices_with_same_index};
use crate::config::{AllocationConfig, SelectionStrategy};
use crate::db::{Database, Tables};
use crate::domain::{AllocatedFcp, FcpId};
use crate::error::{Error, Result};
use crate::hardware::range::shrink_fcp_list;
use crate::hardware::registry::device_registry::{
    allocated_fcps_from_assigner, reserve, reserved_fcps_from_assigner, unreserve,
};
use crate::hardware::templates::defaults::{resolve, templates_of_assigner};
use crate::metrics::{EngineMetrics, RESULT_ALLOCATED, RESULT_EXHAUSTED, RESULT_RELEASED, RESULT_REUSED};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Allocation Result
// =============================================================================

/// Devices reserved for a guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcpAllocation {
    pub assigner_id: String,
    pub tmpl_id: String,
    pub fcps: Vec<AllocatedFcp>,
    /// The guest already held these devices under the template
    pub reused: bool,
}

// =============================================================================
// FCP Allocator
// =============================================================================

pub struct FcpAllocator {
    db: Arc<Database>,
    /// Locked inside the store transaction only
    rng: Mutex<StdRng>,
    strategy: SelectionStrategy,
    metrics: Arc<EngineMetrics>,
}

impl std::fmt::Debug for FcpAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcpAllocator")
            .field("db", &self.db.name())
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl FcpAllocator {
    /// Create an allocator, entropy-seeded unless the config fixes a seed
    pub fn new(db: Arc<Database>, config: &AllocationConfig, metrics: Arc<EngineMetrics>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(db, config.strategy, rng, metrics)
    }

    pub fn with_rng(
        db: Arc<Database>,
        strategy: SelectionStrategy,
        rng: StdRng,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            db,
            rng: Mutex::new(rng),
            strategy,
            metrics,
        }
    }

    pub fn strategy(&self) -> SelectionStrategy {
        self.strategy
    }

    fn pick_random(&self, t: &Tables, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        let min = t.template(tmpl_id)?.min_fcp_paths_count;
        let paths = path_slots(t, tmpl_id);
        Ok(select_fcp_devices(&mut *self.rng.lock(), &paths, min))
    }

    fn pick_same_index(&self, t: &Tables, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        t.template(tmpl_id)?;
        let paths = path_slots(t, tmpl_id);
        Ok(select_fcp_devices_with_same_index(&mut *self.rng.lock(), &paths))
    }

    fn pick(&self, t: &Tables, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        match self.strategy {
            SelectionStrategy::Random => self.pick_random(t, tmpl_id),
            SelectionStrategy::SameIndex => self.pick_same_index(t, tmpl_id),
        }
    }

    /// One random free device per path; empty when too few paths have one
    pub fn get_fcp_devices(&self, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        self.db.read(|t| self.pick_random(t, tmpl_id))
    }

    /// One free device per path, all at the same index; empty when none
    pub fn get_fcp_devices_with_same_index(&self, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        self.db.read(|t| self.pick_same_index(t, tmpl_id))
    }

    /// Select and reserve devices for a guest in one critical section
    ///
    /// The template is the one named, else the storage provider's default,
    /// else the host default. Devices the guest already holds under that
    /// template are handed out again instead of new ones.
    pub fn reserve_fcp_devices(
        &self,
        assigner_id: &str,
        tmpl_id: Option<&str>,
        sp_name: Option<&str>,
    ) -> Result<FcpAllocation> {
        let outcome = self.db.transaction(|t| {
            let tmpl_id = resolve(t, tmpl_id, sp_name)?;

            let held: Vec<AllocatedFcp> = allocated_fcps_from_assigner(t, assigner_id, &tmpl_id)
                .iter()
                .map(|dev| dev.allocated())
                .collect();
            let (fcps, reused) = if held.is_empty() {
                (self.pick(t, &tmpl_id)?, false)
            } else {
                (held, true)
            };
            if fcps.is_empty() {
                return Err(Error::NoAvailableFcp {
                    template_id: tmpl_id,
                });
            }

            let ids: Vec<FcpId> = fcps.iter().map(|a| a.fcp_id.clone()).collect();
            reserve(t, &ids, assigner_id, &tmpl_id)?;
            Ok((
                FcpAllocation {
                    assigner_id: assigner_id.to_string(),
                    tmpl_id,
                    fcps,
                    reused,
                },
                reserved_count(t),
            ))
        });

        match outcome {
            Ok((allocation, reserved)) => {
                self.metrics.set_devices_reserved(reserved);
                self.metrics.record_allocation(if allocation.reused {
                    RESULT_REUSED
                } else {
                    RESULT_ALLOCATED
                });
                info!(
                    "Reserved FCP devices {} for {} from template {} (reused: {})",
                    shrink_fcp_list(allocation.fcps.iter().map(|a| &a.fcp_id)),
                    assigner_id,
                    allocation.tmpl_id,
                    allocation.reused
                );
                Ok(allocation)
            }
            Err(e @ Error::NoAvailableFcp { .. }) => {
                self.metrics.record_allocation(RESULT_EXHAUSTED);
                warn!("Allocation for {} failed: {}", assigner_id, e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Release the guest's reservations
    ///
    /// Without a template, every template the guest holds devices from is
    /// released. Returns the devices that were unreserved.
    pub fn unreserve_fcp_devices(&self, assigner_id: &str, tmpl_id: Option<&str>) -> Result<Vec<FcpId>> {
        let (released, reserved) = self.db.transaction(|t| {
            let tmpl_ids: Vec<String> = match tmpl_id {
                Some(id) => vec![t.template(id)?.id.clone()],
                None => templates_of_assigner(t, assigner_id)
                    .into_iter()
                    .map(|info| info.id)
                    .collect(),
            };
            let ids: Vec<FcpId> = tmpl_ids
                .iter()
                .flat_map(|id| reserved_fcps_from_assigner(t, assigner_id, id))
                .map(|dev| dev.fcp_id)
                .collect();
            unreserve(t, &ids)?;
            Ok((ids, reserved_count(t)))
        })?;

        self.metrics.set_devices_reserved(reserved);
        if released.is_empty() {
            debug!("No reserved FCP devices to release for {}", assigner_id);
        } else {
            self.metrics.record_allocation(RESULT_RELEASED);
            info!(
                "Unreserved FCP devices {} of {}",
                shrink_fcp_list(&released),
                assigner_id
            );
        }
        Ok(released)
    }
}

fn reserved_count(t: &Tables) -> usize {
    t.fcp.values().filter(|dev| dev.reserved).count()
}
