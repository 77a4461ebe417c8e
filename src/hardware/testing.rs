//! Shared fixtures for unit tests

use crate::db::Database;
use crate::domain::{FcpId, FcpInfo, FcpState};
use crate::hardware::range::expand_fcp_list;
use crate::hardware::registry::DeviceRegistry;
use std::sync::Arc;

pub fn fcp(id: &str) -> FcpId {
    id.parse().unwrap()
}

pub fn fcps(ids: &[&str]) -> Vec<FcpId> {
    ids.iter().map(|s| fcp(s)).collect()
}

pub fn fcp_info(id: &str, state: FcpState) -> FcpInfo {
    let id = fcp(id);
    FcpInfo {
        wwpn_npiv: format!("c05076de3300{}", id.as_str()),
        wwpn_phy: format!("c05076de3302{}", id.as_str()),
        chpid: id.as_str()[..2].to_uppercase(),
        state,
        owner: "zvm1".to_string(),
        fcp_id: id,
    }
}

/// Database holding every device of `shorthand` as free and visible
pub fn seeded_db(shorthand: &str) -> Arc<Database> {
    let db = Database::in_memory("fcp-test");
    let registry = DeviceRegistry::new(db.clone());
    let rows: Vec<FcpInfo> = expand_fcp_list(shorthand)
        .unwrap()
        .values()
        .flatten()
        .map(|id| fcp_info(id.as_str(), FcpState::Free))
        .collect();
    registry
        .bulk_insert_zvm_fcp_info_into_fcp_table(&rows)
        .unwrap();
    db
}
