//! FCP Engine
//!
//! Wires the FCP store, device registry, template store, default-binding
//! resolver and allocator together, and is the single entry point the API
//! layer and the binary talk to.

use crate::config::{AllocationConfig, EngineConfig};
use crate::db::Database;
use crate::domain::{
    AllocatedFcp, FcpId, FcpInventoryRef, TemplateBasicInfo, TemplateDetails, TemplateEdit,
    TemplateSpec,
};
use crate::error::{Error, Result};
use crate::hardware::allocation::{FcpAllocation, FcpAllocator};
use crate::hardware::discovery::StaticInventory;
use crate::hardware::registry::{DeviceRegistry, SyncReport};
use crate::hardware::templates::{DefaultBindingResolver, TemplateStore};
use crate::metrics::EngineMetrics;
use std::sync::Arc;
use tracing::{info, warn};

/// The FCP multipath template and allocation engine
#[derive(Debug)]
pub struct FcpEngine {
    db: Arc<Database>,
    registry: DeviceRegistry,
    templates: TemplateStore,
    defaults: DefaultBindingResolver,
    allocator: FcpAllocator,
    inventory: Option<FcpInventoryRef>,
    metrics: Arc<EngineMetrics>,
}

impl FcpEngine {
    /// Open the store and build the engine described by `config`
    pub fn from_config(config: &EngineConfig) -> Result<Arc<Self>> {
        let db = Database::from_config(&config.database)?;
        let inventory: Option<FcpInventoryRef> = config
            .inventory_path
            .as_ref()
            .map(|path| Arc::new(StaticInventory::from_file(path)) as FcpInventoryRef);
        Self::new(db, &config.allocation, inventory)
    }

    pub fn new(
        db: Arc<Database>,
        allocation: &AllocationConfig,
        inventory: Option<FcpInventoryRef>,
    ) -> Result<Arc<Self>> {
        let metrics = Arc::new(EngineMetrics::new()?);
        info!(
            "FCP engine on database {} (strategy: {}, inventory: {})",
            db.name(),
            allocation.strategy,
            inventory
                .as_ref()
                .map(|i| i.source_name().to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(Arc::new(Self {
            registry: DeviceRegistry::new(db.clone()),
            templates: TemplateStore::new(db.clone()),
            defaults: DefaultBindingResolver::new(db.clone()),
            allocator: FcpAllocator::new(db.clone(), allocation, metrics.clone()),
            db,
            inventory,
            metrics,
        }))
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn defaults(&self) -> &DefaultBindingResolver {
        &self.defaults
    }

    pub fn allocator(&self) -> &FcpAllocator {
        &self.allocator
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    // =========================================================================
    // Template Lifecycle
    // =========================================================================

    pub fn create_fcp_template(&self, spec: &TemplateSpec) -> Result<TemplateBasicInfo> {
        let info = self.templates.create_fcp_template(spec)?;
        self.metrics.record_template_operation("create");
        Ok(info)
    }

    pub fn edit_fcp_template(&self, tmpl_id: &str, changes: &TemplateEdit) -> Result<TemplateBasicInfo> {
        let info = self.templates.edit_fcp_template(tmpl_id, changes)?;
        self.metrics.record_template_operation("edit");
        Ok(info)
    }

    pub fn delete_fcp_template(&self, tmpl_id: &str) -> Result<()> {
        self.templates.delete_fcp_template(tmpl_id)?;
        self.metrics.record_template_operation("delete");
        self.refresh_devices_reserved()?;
        Ok(())
    }

    pub fn get_fcp_templates(&self, tmpl_ids: Option<&[String]>) -> Result<Vec<TemplateBasicInfo>> {
        self.templates.get_fcp_templates(tmpl_ids)
    }

    /// Template reports, optionally refreshing the device table first
    pub fn get_fcp_templates_details(
        &self,
        tmpl_ids: Option<&[String]>,
        raw: bool,
        statistics: bool,
        sync_with_zvm: bool,
    ) -> Result<Vec<TemplateDetails>> {
        if sync_with_zvm {
            match &self.inventory {
                Some(_) => {
                    self.sync_fcp_devices()?;
                }
                None => warn!("sync_with_zvm requested but no FCP inventory is configured"),
            }
        }
        self.templates
            .get_fcp_templates_details(tmpl_ids, raw, statistics)
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    pub fn get_fcp_devices(&self, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        self.allocator.get_fcp_devices(tmpl_id)
    }

    pub fn get_fcp_devices_with_same_index(&self, tmpl_id: &str) -> Result<Vec<AllocatedFcp>> {
        self.allocator.get_fcp_devices_with_same_index(tmpl_id)
    }

    pub fn reserve_fcp_devices(
        &self,
        assigner_id: &str,
        tmpl_id: Option<&str>,
        sp_name: Option<&str>,
    ) -> Result<FcpAllocation> {
        self.allocator
            .reserve_fcp_devices(assigner_id, tmpl_id, sp_name)
    }

    pub fn unreserve_fcp_devices(&self, assigner_id: &str, tmpl_id: Option<&str>) -> Result<Vec<FcpId>> {
        self.allocator.unreserve_fcp_devices(assigner_id, tmpl_id)
    }

    // =========================================================================
    // Fleet Sync & Lifecycle
    // =========================================================================

    /// Reconcile the device table with the configured inventory
    pub fn sync_fcp_devices(&self) -> Result<SyncReport> {
        let inventory = self.inventory.as_ref().ok_or_else(|| {
            Error::Configuration("no FCP inventory is configured".to_string())
        })?;
        let reported = inventory.discover()?;
        let report = self.registry.sync_with_fleet(&reported)?;
        self.refresh_devices_reserved()?;
        Ok(report)
    }

    pub fn has_inventory(&self) -> bool {
        self.inventory.is_some()
    }

    // =========================================================================
    // Metrics
    // =========================================================================

    /// Recount reserved devices into the `fcp_devices_reserved` gauge
    ///
    /// Registry writes that bypass the allocator leave the gauge behind
    /// until the next recount.
    pub fn refresh_devices_reserved(&self) -> Result<usize> {
        let reserved = self
            .db
            .read(|t| Ok(t.fcp.values().filter(|dev| dev.reserved).count()))?;
        self.metrics.set_devices_reserved(reserved);
        Ok(reserved)
    }

    /// Text exposition of the engine metrics with a fresh reserved count
    pub fn encode_metrics(&self) -> Result<(String, String)> {
        self.refresh_devices_reserved()?;
        self.metrics.encode()
    }

    /// Persist and close the store
    pub fn close(&self) -> Result<()> {
        self.db.close()
    }
}
