//! FCP Device Registry
//!
//! Authoritative record of every FCP device the fleet reports together with
//! its usage counters. Rows are created and destroyed by hardware sync only;
//! allocation workflows touch the usage columns.

use crate::db::{Database, Tables};
use crate::domain::{FcpDevice, FcpId, FcpInfo, FcpInfoPatch, FcpState, FcpUsage};
use crate::error::{Error, Result};
use crate::hardware::range::shrink_fcp_list;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

// =============================================================================
// Sync Report
// =============================================================================

/// Outcome of reconciling the `fcp` table with what the fleet reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub added: Vec<FcpId>,
    pub updated: Vec<FcpId>,
    pub deleted: Vec<FcpId>,
    /// In use but no longer reported, kept with state `notfound`
    pub marked_notfound: Vec<FcpId>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.deleted.is_empty()
            && self.marked_notfound.is_empty()
    }
}

// =============================================================================
// Table Operations
// =============================================================================
//
// Building blocks run inside an open transaction. The allocation engine and
// the template store compose them so that multi-step workflows stay in one
// critical section.

pub(crate) fn usage_of(t: &Tables, fcp_id: &FcpId) -> Result<FcpUsage> {
    Ok(t.fcp_row(fcp_id)?.usage())
}

pub(crate) fn update_usage(
    t: &mut Tables,
    fcp_id: &FcpId,
    assigner_id: &str,
    reserved: bool,
    connections: u32,
    tmpl_id: &str,
) -> Result<()> {
    let row = t.fcp_row_mut(fcp_id)?;
    row.assigner_id = assigner_id.to_string();
    row.reserved = reserved;
    row.connections = connections;
    row.tmpl_id = tmpl_id.to_string();
    Ok(())
}

pub(crate) fn increase_connections(t: &mut Tables, fcp_id: &FcpId) -> Result<u32> {
    let row = t.fcp_row_mut(fcp_id)?;
    row.connections += 1;
    Ok(row.connections)
}

pub(crate) fn decrease_connections(t: &mut Tables, fcp_id: &FcpId) -> Result<u32> {
    let row = t.fcp_row_mut(fcp_id)?;
    if row.connections == 0 {
        return Err(Error::FcpNoConnections {
            fcp_id: fcp_id.to_string(),
        });
    }
    row.connections -= 1;
    Ok(row.connections)
}

/// Fail with `FcpNotFound` naming the first unknown id
fn ensure_known(t: &Tables, fcp_ids: &[FcpId]) -> Result<()> {
    match fcp_ids.iter().find(|id| !t.fcp.contains_key(*id)) {
        Some(missing) => Err(Error::FcpNotFound {
            fcp_id: missing.to_string(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn reserve(
    t: &mut Tables,
    fcp_ids: &[FcpId],
    assigner_id: &str,
    tmpl_id: &str,
) -> Result<()> {
    ensure_known(t, fcp_ids)?;
    for fcp_id in fcp_ids {
        let row = t.fcp_row_mut(fcp_id)?;
        row.reserved = true;
        row.assigner_id = assigner_id.to_string();
        row.tmpl_id = tmpl_id.to_string();
    }
    Ok(())
}

pub(crate) fn unreserve(t: &mut Tables, fcp_ids: &[FcpId]) -> Result<()> {
    ensure_known(t, fcp_ids)?;
    for fcp_id in fcp_ids {
        let row = t.fcp_row_mut(fcp_id)?;
        row.reserved = false;
        row.assigner_id.clear();
        row.tmpl_id.clear();
    }
    Ok(())
}

pub(crate) fn bulk_insert(t: &mut Tables, rows: &[FcpInfo]) -> Result<()> {
    let mut batch = BTreeSet::new();
    let duplicates: Vec<&FcpId> = rows
        .iter()
        .map(|r| &r.fcp_id)
        .filter(|id| t.fcp.contains_key(*id) || !batch.insert((*id).clone()))
        .collect();
    if !duplicates.is_empty() {
        return Err(Error::DuplicateFcp {
            fcp_ids: shrink_fcp_list(duplicates),
        });
    }
    for info in rows {
        t.fcp.insert(info.fcp_id.clone(), FcpDevice::from_info(info));
    }
    Ok(())
}

pub(crate) fn bulk_patch(t: &mut Tables, patches: &[(FcpId, FcpInfoPatch)]) -> Result<()> {
    let ids: Vec<FcpId> = patches.iter().map(|(id, _)| id.clone()).collect();
    ensure_known(t, &ids)?;
    for (fcp_id, patch) in patches {
        patch.apply(t.fcp_row_mut(fcp_id)?);
    }
    Ok(())
}

pub(crate) fn bulk_update_state(t: &mut Tables, fcp_ids: &[FcpId], state: FcpState) -> Result<()> {
    let patch = FcpInfoPatch {
        state: Some(state),
        ..Default::default()
    };
    let patches: Vec<(FcpId, FcpInfoPatch)> =
        fcp_ids.iter().map(|id| (id.clone(), patch.clone())).collect();
    bulk_patch(t, &patches)
}

pub(crate) fn bulk_delete(t: &mut Tables, fcp_ids: &[FcpId]) -> usize {
    fcp_ids
        .iter()
        .filter(|id| t.fcp.remove(*id).is_some())
        .count()
}

pub(crate) fn all_fcps_of_assigner(t: &Tables, assigner_id: Option<&str>) -> Result<Vec<FcpDevice>> {
    let rows: Vec<FcpDevice> = t
        .fcp
        .values()
        .filter(|row| assigner_id.map_or(true, |a| row.assigner_id == a))
        .cloned()
        .collect();
    if rows.is_empty() {
        let scope = match assigner_id {
            Some(a) => format!("in table fcp with userid {}", a),
            None => "in table fcp".to_string(),
        };
        return Err(Error::NoFcpRecords { scope });
    }
    Ok(rows)
}

pub(crate) fn allocated_fcps_from_assigner(
    t: &Tables,
    assigner_id: &str,
    tmpl_id: &str,
) -> Vec<FcpDevice> {
    t.fcp
        .values()
        .filter(|row| row.assigner_id == assigner_id && row.tmpl_id == tmpl_id && row.is_in_use())
        .cloned()
        .collect()
}

pub(crate) fn reserved_fcps_from_assigner(
    t: &Tables,
    assigner_id: &str,
    tmpl_id: &str,
) -> Vec<FcpDevice> {
    t.fcp
        .values()
        .filter(|row| row.assigner_id == assigner_id && row.tmpl_id == tmpl_id && row.reserved)
        .cloned()
        .collect()
}

/// In-use devices mapped to the template or accounted against it
pub(crate) fn inuse_by_template(t: &Tables, tmpl_id: &str) -> Vec<FcpDevice> {
    t.fcp
        .values()
        .filter(|row| {
            row.is_in_use()
                && (row.tmpl_id == tmpl_id || t.mapped_template(&row.fcp_id) == Some(tmpl_id))
        })
        .cloned()
        .collect()
}

pub(crate) fn sync_with_fleet(t: &mut Tables, reported: &[FcpInfo]) -> Result<SyncReport> {
    let reported: BTreeMap<&FcpId, &FcpInfo> = reported.iter().map(|r| (&r.fcp_id, r)).collect();
    let mut report = SyncReport::default();

    // new devices
    let new_rows: Vec<FcpInfo> = reported
        .values()
        .filter(|info| !t.fcp.contains_key(&info.fcp_id))
        .map(|info| (*info).clone())
        .collect();
    report.added = new_rows.iter().map(|r| r.fcp_id.clone()).collect();
    bulk_insert(t, &new_rows)?;

    // gone from the fleet: drop unused rows, keep in-use ones as notfound
    let (gone_in_use, gone_unused): (Vec<&FcpDevice>, Vec<&FcpDevice>) = t
        .fcp
        .values()
        .filter(|row| !reported.contains_key(&row.fcp_id))
        .partition(|row| row.is_in_use());
    report.deleted = gone_unused.iter().map(|r| r.fcp_id.clone()).collect();
    report.marked_notfound = gone_in_use
        .iter()
        .filter(|r| r.state != FcpState::NotFound)
        .map(|r| r.fcp_id.clone())
        .collect();
    bulk_delete(t, &report.deleted);
    bulk_update_state(t, &report.marked_notfound, FcpState::NotFound)?;

    // still present: refresh changed columns
    let patches: Vec<(FcpId, FcpInfoPatch)> = t
        .fcp
        .values()
        .filter_map(|row| {
            let info = reported.get(&row.fcp_id)?;
            FcpInfoPatch::diff(row, info).map(|p| (row.fcp_id.clone(), p))
        })
        .collect();
    report.updated = patches
        .iter()
        .map(|(id, _)| id.clone())
        .filter(|id| !report.added.contains(id))
        .collect();
    bulk_patch(t, &patches)?;

    Ok(report)
}

// =============================================================================
// Device Registry
// =============================================================================

/// Device registry over the FCP store
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    db: Arc<Database>,
}

impl DeviceRegistry {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Full row of one device
    pub fn get_fcp(&self, fcp_id: &FcpId) -> Result<FcpDevice> {
        self.db.read(|t| t.fcp_row(fcp_id).cloned())
    }

    pub fn get_all_fcps(&self) -> Result<Vec<FcpDevice>> {
        self.db.read(|t| Ok(t.fcp.values().cloned().collect()))
    }

    pub fn get_usage_of_fcp(&self, fcp_id: &FcpId) -> Result<FcpUsage> {
        self.db.read(|t| usage_of(t, fcp_id))
    }

    /// Overwrite the usage columns of a device
    pub fn update_usage_of_fcp(
        &self,
        fcp_id: &FcpId,
        assigner_id: &str,
        reserved: bool,
        connections: u32,
        tmpl_id: &str,
    ) -> Result<()> {
        debug!(
            "Updating usage of FCP {}: assigner={} reserved={} connections={} template={}",
            fcp_id, assigner_id, reserved, connections, tmpl_id
        );
        self.db.transaction(|t| {
            update_usage(t, fcp_id, assigner_id, reserved, connections, tmpl_id)
        })
    }

    pub fn increase_connections(&self, fcp_id: &FcpId) -> Result<u32> {
        let count = self.db.transaction(|t| increase_connections(t, fcp_id))?;
        debug!("FCP {} connections increased to {}", fcp_id, count);
        Ok(count)
    }

    /// Decrement the connection counter
    ///
    /// Decrementing an idle device is a caller bug and fails with a
    /// not-exist error rather than clamping at zero.
    pub fn decrease_connections(&self, fcp_id: &FcpId) -> Result<u32> {
        let count = self.db.transaction(|t| decrease_connections(t, fcp_id))?;
        debug!("FCP {} connections decreased to {}", fcp_id, count);
        Ok(count)
    }

    /// Increase connections of several devices in one transaction
    pub fn increase_fcp_connections(&self, fcp_ids: &[FcpId]) -> Result<BTreeMap<FcpId, u32>> {
        self.db.transaction(|t| {
            fcp_ids
                .iter()
                .map(|id| -> Result<(FcpId, u32)> {
                    Ok((id.clone(), increase_connections(t, id)?))
                })
                .collect()
        })
    }

    /// Decrease connections of several devices in one transaction
    pub fn decrease_fcp_connections(&self, fcp_ids: &[FcpId]) -> Result<BTreeMap<FcpId, u32>> {
        self.db.transaction(|t| {
            fcp_ids
                .iter()
                .map(|id| -> Result<(FcpId, u32)> {
                    Ok((id.clone(), decrease_connections(t, id)?))
                })
                .collect()
        })
    }

    pub fn reserve_fcps(&self, fcp_ids: &[FcpId], assigner_id: &str, tmpl_id: &str) -> Result<()> {
        self.db
            .transaction(|t| reserve(t, fcp_ids, assigner_id, tmpl_id))?;
        info!(
            "Reserved FCP devices {} for {} from template {}",
            shrink_fcp_list(fcp_ids),
            assigner_id,
            tmpl_id
        );
        Ok(())
    }

    pub fn unreserve_fcps(&self, fcp_ids: &[FcpId]) -> Result<()> {
        self.db.transaction(|t| unreserve(t, fcp_ids))?;
        info!("Unreserved FCP devices {}", shrink_fcp_list(fcp_ids));
        Ok(())
    }

    /// Insert hardware-discovered rows
    ///
    /// A duplicate id fails the whole batch with `DuplicateFcp`.
    pub fn bulk_insert_zvm_fcp_info_into_fcp_table(&self, rows: &[FcpInfo]) -> Result<()> {
        self.db.transaction(|t| bulk_insert(t, rows))?;
        info!("Inserted {} FCP devices into table fcp", rows.len());
        Ok(())
    }

    /// Overwrite the hardware-discovered columns of existing rows
    pub fn bulk_update_zvm_fcp_info_in_fcp_table(&self, rows: &[FcpInfo]) -> Result<()> {
        let patches: Vec<(FcpId, FcpInfoPatch)> = rows
            .iter()
            .map(|info| (info.fcp_id.clone(), FcpInfoPatch::from(info)))
            .collect();
        self.db.transaction(|t| bulk_patch(t, &patches))?;
        info!("Updated {} FCP devices in table fcp", rows.len());
        Ok(())
    }

    /// Apply per-device partial updates
    pub fn bulk_patch_fcp_info(&self, patches: &[(FcpId, FcpInfoPatch)]) -> Result<()> {
        self.db.transaction(|t| bulk_patch(t, patches))
    }

    pub fn bulk_update_state_in_fcp_table(&self, fcp_ids: &[FcpId], state: FcpState) -> Result<()> {
        self.db
            .transaction(|t| bulk_update_state(t, fcp_ids, state))?;
        info!(
            "Set state of FCP devices {} to {:?}",
            shrink_fcp_list(fcp_ids),
            state.as_str()
        );
        Ok(())
    }

    /// Delete rows; unknown ids are ignored. Returns the number deleted.
    pub fn bulk_delete_from_fcp_table(&self, fcp_ids: &[FcpId]) -> Result<usize> {
        let deleted = self.db.transaction(|t| Ok(bulk_delete(t, fcp_ids)))?;
        info!("Deleted {} FCP devices from table fcp", deleted);
        Ok(deleted)
    }

    pub fn get_all_fcps_of_assigner(&self, assigner_id: Option<&str>) -> Result<Vec<FcpDevice>> {
        self.db.read(|t| all_fcps_of_assigner(t, assigner_id))
    }

    /// Devices attached or reserved for the assigner under the template
    pub fn get_allocated_fcps_from_assigner(
        &self,
        assigner_id: &str,
        tmpl_id: &str,
    ) -> Result<Vec<FcpDevice>> {
        self.db
            .read(|t| Ok(allocated_fcps_from_assigner(t, assigner_id, tmpl_id)))
    }

    pub fn get_reserved_fcps_from_assigner(
        &self,
        assigner_id: &str,
        tmpl_id: &str,
    ) -> Result<Vec<FcpDevice>> {
        self.db
            .read(|t| Ok(reserved_fcps_from_assigner(t, assigner_id, tmpl_id)))
    }

    pub fn get_inuse_fcp_device_by_fcp_template(&self, tmpl_id: &str) -> Result<Vec<FcpDevice>> {
        self.db.read(|t| Ok(inuse_by_template(t, tmpl_id)))
    }

    /// Reconcile the `fcp` table with the devices the fleet reports
    pub fn sync_with_fleet(&self, reported: &[FcpInfo]) -> Result<SyncReport> {
        let report = self.db.transaction(|t| sync_with_fleet(t, reported))?;
        if !report.marked_notfound.is_empty() {
            warn!(
                "FCP devices {} are in use but no longer reported by the fleet",
                shrink_fcp_list(&report.marked_notfound)
            );
        }
        info!(
            "FCP table synced: {} added, {} updated, {} deleted, {} marked notfound",
            report.added.len(),
            report.updated.len(),
            report.deleted.len(),
            report.marked_notfound.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PathMapping;
    use crate::hardware::testing::{fcp, fcp_info, fcps, seeded_db};
    use assert_matches::assert_matches;

    fn registry(shorthand: &str) -> DeviceRegistry {
        DeviceRegistry::new(seeded_db(shorthand))
    }

    #[test]
    fn test_reserve_and_unreserve() {
        let registry = registry("1111");
        registry.increase_connections(&fcp("1111")).unwrap();

        registry
            .reserve_fcps(&fcps(&["1111"]), "user1", "tmplA")
            .unwrap();
        let usage = registry.get_usage_of_fcp(&fcp("1111")).unwrap();
        assert_eq!(
            usage,
            FcpUsage {
                assigner_id: "user1".into(),
                reserved: true,
                connections: 1,
                tmpl_id: "tmplA".into(),
            }
        );

        registry.unreserve_fcps(&fcps(&["1111"])).unwrap();
        let usage = registry.get_usage_of_fcp(&fcp("1111")).unwrap();
        assert_eq!(usage.assigner_id, "");
        assert!(!usage.reserved);
        assert_eq!(usage.tmpl_id, "");
        assert_eq!(usage.connections, 1);
    }

    #[test]
    fn test_reserve_unknown_fcp_changes_nothing() {
        let registry = registry("1111");
        let result = registry.reserve_fcps(&fcps(&["1111", "2222"]), "user1", "tmplA");
        assert_matches!(result, Err(Error::FcpNotFound { .. }));
        assert!(!registry.get_usage_of_fcp(&fcp("1111")).unwrap().reserved);
    }

    #[test]
    fn test_usage_of_unknown_fcp() {
        let registry = registry("1111");
        let err = registry.get_usage_of_fcp(&fcp("9999")).unwrap_err();
        assert!(err.is_not_exist());
    }

    #[test]
    fn test_update_usage() {
        let registry = registry("1111");
        registry
            .update_usage_of_fcp(&fcp("1111"), "user2", false, 3, "tmplB")
            .unwrap();
        let usage = registry.get_usage_of_fcp(&fcp("1111")).unwrap();
        assert_eq!(usage.assigner_id, "user2");
        assert_eq!(usage.connections, 3);
        assert_eq!(usage.tmpl_id, "tmplB");
    }

    #[test]
    fn test_connections() {
        let registry = registry("1111");
        let id = fcp("1111");

        assert_matches!(
            registry.decrease_connections(&id),
            Err(Error::FcpNoConnections { .. })
        );

        assert_eq!(registry.increase_connections(&id).unwrap(), 1);
        assert_eq!(registry.increase_connections(&id).unwrap(), 2);
        assert_eq!(registry.decrease_connections(&id).unwrap(), 1);
        assert_eq!(registry.get_usage_of_fcp(&id).unwrap().connections, 1);

        assert!(registry
            .increase_connections(&fcp("9999"))
            .unwrap_err()
            .is_not_exist());
    }

    #[test]
    fn test_bulk_connections_are_atomic() {
        let registry = registry("1a00-1a01");
        registry.increase_connections(&fcp("1a00")).unwrap();

        // 1a01 has no connections, so nothing is decremented
        let result = registry.decrease_fcp_connections(&fcps(&["1a00", "1a01"]));
        assert!(result.unwrap_err().is_not_exist());
        assert_eq!(registry.get_usage_of_fcp(&fcp("1a00")).unwrap().connections, 1);

        let counts = registry
            .increase_fcp_connections(&fcps(&["1a00", "1a01"]))
            .unwrap();
        assert_eq!(counts[&fcp("1a00")], 2);
        assert_eq!(counts[&fcp("1a01")], 1);
    }

    #[test]
    fn test_bulk_insert_duplicate_fails_whole_batch() {
        let registry = registry("1a00");
        let rows = vec![
            fcp_info("1a01", FcpState::Free),
            fcp_info("1a00", FcpState::Free),
        ];
        let err = registry
            .bulk_insert_zvm_fcp_info_into_fcp_table(&rows)
            .unwrap_err();
        assert!(err.is_already_exists());
        assert!(err.to_string().contains("1A00"));
        assert!(registry.get_fcp(&fcp("1a01")).is_err());

        // duplicates inside one batch are rejected too
        let rows = vec![
            fcp_info("1b00", FcpState::Free),
            fcp_info("1b00", FcpState::Free),
        ];
        assert!(registry
            .bulk_insert_zvm_fcp_info_into_fcp_table(&rows)
            .unwrap_err()
            .is_already_exists());
    }

    #[test]
    fn test_bulk_update_and_delete() {
        let registry = registry("1a00-1a02");

        let mut info = fcp_info("1a00", FcpState::Active);
        info.owner = "zvm2".into();
        registry
            .bulk_update_zvm_fcp_info_in_fcp_table(&[info])
            .unwrap();
        let row = registry.get_fcp(&fcp("1a00")).unwrap();
        assert_eq!(row.state, FcpState::Active);
        assert_eq!(row.owner, "zvm2");

        registry
            .bulk_update_state_in_fcp_table(&fcps(&["1a01", "1a02"]), FcpState::Offline)
            .unwrap();
        assert_eq!(registry.get_fcp(&fcp("1a02")).unwrap().state, FcpState::Offline);

        let deleted = registry
            .bulk_delete_from_fcp_table(&fcps(&["1a01", "9999"]))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(registry.get_all_fcps().unwrap().len(), 2);
    }

    #[test]
    fn test_assigner_queries() {
        let registry = registry("1a00-1a03");
        registry
            .reserve_fcps(&fcps(&["1a00", "1a01"]), "user1", "t1")
            .unwrap();
        registry
            .update_usage_of_fcp(&fcp("1a02"), "user1", false, 1, "t1")
            .unwrap();
        registry
            .update_usage_of_fcp(&fcp("1a03"), "user1", false, 0, "t1")
            .unwrap();

        assert_eq!(
            registry
                .get_all_fcps_of_assigner(Some("user1"))
                .unwrap()
                .len(),
            4
        );
        assert_eq!(registry.get_all_fcps_of_assigner(None).unwrap().len(), 4);
        assert!(registry
            .get_all_fcps_of_assigner(Some("user9"))
            .unwrap_err()
            .is_not_exist());

        let allocated = registry
            .get_allocated_fcps_from_assigner("user1", "t1")
            .unwrap();
        assert_eq!(allocated.len(), 3);
        let reserved = registry
            .get_reserved_fcps_from_assigner("user1", "t1")
            .unwrap();
        assert_eq!(reserved.len(), 2);
        assert!(registry
            .get_allocated_fcps_from_assigner("user1", "t2")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_empty_registry_has_no_records() {
        let registry = DeviceRegistry::new(Database::in_memory("empty"));
        assert_matches!(
            registry.get_all_fcps_of_assigner(None),
            Err(Error::NoFcpRecords { .. })
        );
    }

    #[test]
    fn test_inuse_by_template_follows_mapping_and_usage() {
        let db = seeded_db("1a00-1a02");
        db.transaction(|t| {
            t.template_fcp_mapping.insert(
                fcp("1a00"),
                PathMapping {
                    tmpl_id: "t1".into(),
                    path: 0,
                },
            );
            Ok(())
        })
        .unwrap();
        let registry = DeviceRegistry::new(db);
        registry.increase_connections(&fcp("1a00")).unwrap();
        registry
            .reserve_fcps(&fcps(&["1a01"]), "user1", "t1")
            .unwrap();
        registry
            .reserve_fcps(&fcps(&["1a02"]), "user1", "t2")
            .unwrap();

        let inuse: Vec<FcpId> = registry
            .get_inuse_fcp_device_by_fcp_template("t1")
            .unwrap()
            .into_iter()
            .map(|d| d.fcp_id)
            .collect();
        assert_eq!(inuse, fcps(&["1a00", "1a01"]));
    }

    #[test]
    fn test_sync_with_fleet() {
        let registry = registry("1a00-1a03");
        registry.increase_connections(&fcp("1a03")).unwrap();

        let mut changed = fcp_info("1a00", FcpState::Active);
        changed.owner = "zvm2".into();
        let reported = vec![
            changed,
            fcp_info("1a01", FcpState::Free),
            fcp_info("1b00", FcpState::Free),
        ];
        let report = registry.sync_with_fleet(&reported).unwrap();

        assert_eq!(report.added, fcps(&["1b00"]));
        assert_eq!(report.updated, fcps(&["1a00"]));
        assert_eq!(report.deleted, fcps(&["1a02"]));
        assert_eq!(report.marked_notfound, fcps(&["1a03"]));

        assert!(registry.get_fcp(&fcp("1a02")).is_err());
        let kept = registry.get_fcp(&fcp("1a03")).unwrap();
        assert_eq!(kept.state, FcpState::NotFound);
        assert_eq!(kept.connections, 1);
        assert_eq!(registry.get_fcp(&fcp("1a00")).unwrap().owner, "zvm2");

        // a second identical sync only keeps the notfound row
        let report = registry.sync_with_fleet(&reported).unwrap();
        assert!(report.is_noop());
    }
}
