//! Template details and per-path usage statistics

use crate::db::Tables;
use crate::domain::{
    FcpDetailRow, FcpDevice, FcpId, FcpState, MultipathTemplate, PathStatistics, TemplateDetails,
};
use crate::hardware::range::{shrink_fcp_list, shrink_fcp_paths};
use std::collections::BTreeMap;

/// Every mapped device of a template joined with its registry row
pub(crate) fn detail_rows(t: &Tables, tmpl_id: &str) -> Vec<FcpDetailRow> {
    t.template_paths(tmpl_id)
        .into_iter()
        .flat_map(|(path, devices)| {
            devices.into_iter().map(move |fcp_id| FcpDetailRow {
                tmpl_id: tmpl_id.to_string(),
                path,
                device: t.fcp.get(&fcp_id).cloned(),
                fcp_id,
            })
        })
        .collect()
}

#[derive(Default)]
struct PathBuckets<'a> {
    total: Vec<&'a FcpId>,
    available: Vec<&'a FcpId>,
    allocated: Vec<&'a FcpId>,
    reserve_only: Vec<&'a FcpId>,
    connection_only: Vec<&'a FcpId>,
    unallocated_but_active: BTreeMap<String, Vec<&'a FcpId>>,
    allocated_but_free: Vec<&'a FcpId>,
    notfound: Vec<&'a FcpId>,
    offline: Vec<&'a FcpId>,
    chpids: BTreeMap<String, Vec<&'a FcpId>>,
}

impl<'a> PathBuckets<'a> {
    fn add(&mut self, fcp_id: &'a FcpId, device: Option<&'a FcpDevice>) {
        self.total.push(fcp_id);
        let Some(dev) = device else {
            // mapped but unknown to the registry
            self.notfound.push(fcp_id);
            return;
        };

        if dev.is_eligible() {
            self.available.push(fcp_id);
        }
        match (dev.reserved, dev.connections > 0) {
            (true, true) => self.allocated.push(fcp_id),
            (true, false) => {
                self.allocated.push(fcp_id);
                self.reserve_only.push(fcp_id);
            }
            (false, true) => {
                self.allocated.push(fcp_id);
                self.connection_only.push(fcp_id);
            }
            (false, false) => {}
        }
        match dev.state {
            FcpState::Active if !dev.is_in_use() => self
                .unallocated_but_active
                .entry(dev.owner.clone())
                .or_default()
                .push(fcp_id),
            FcpState::Free if dev.is_in_use() => self.allocated_but_free.push(fcp_id),
            FcpState::NotFound => self.notfound.push(fcp_id),
            FcpState::Offline => self.offline.push(fcp_id),
            _ => {}
        }
        if !dev.chpid.is_empty() {
            self.chpids
                .entry(dev.chpid.to_uppercase())
                .or_default()
                .push(fcp_id);
        }
    }

    fn finish(self) -> PathStatistics {
        let shrink_map = |m: BTreeMap<String, Vec<&FcpId>>| -> BTreeMap<String, String> {
            m.into_iter()
                .map(|(k, ids)| (k, shrink_fcp_list(ids)))
                .collect()
        };
        PathStatistics {
            total_count: self.total.len(),
            total: shrink_fcp_list(self.total),
            available_count: self.available.len(),
            available: shrink_fcp_list(self.available),
            allocated: shrink_fcp_list(self.allocated),
            reserve_only: shrink_fcp_list(self.reserve_only),
            connection_only: shrink_fcp_list(self.connection_only),
            unallocated_but_active: shrink_map(self.unallocated_but_active),
            allocated_but_free: shrink_fcp_list(self.allocated_but_free),
            notfound: shrink_fcp_list(self.notfound),
            offline: shrink_fcp_list(self.offline),
            chpids: shrink_map(self.chpids),
        }
    }
}

/// Usage statistics of each path of a template
pub(crate) fn path_statistics(t: &Tables, tmpl_id: &str) -> BTreeMap<usize, PathStatistics> {
    t.template_paths(tmpl_id)
        .iter()
        .map(|(path, devices)| {
            let mut buckets = PathBuckets::default();
            for fcp_id in devices {
                buckets.add(fcp_id, t.fcp.get(fcp_id));
            }
            (*path, buckets.finish())
        })
        .collect()
}

/// Build the report of one template
pub(crate) fn template_details(
    t: &Tables,
    tmpl: &MultipathTemplate,
    raw: bool,
    statistics: bool,
) -> TemplateDetails {
    TemplateDetails {
        info: t.basic_info(tmpl),
        fcp_devices: shrink_fcp_paths(&t.template_paths(&tmpl.id)),
        raw: raw.then(|| detail_rows(t, &tmpl.id)),
        statistics: statistics.then(|| path_statistics(t, &tmpl.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TemplateSpec;
    use crate::hardware::registry::DeviceRegistry;
    use crate::hardware::templates::TemplateStore;
    use crate::hardware::testing::{fcp, fcp_info, fcps, seeded_db};

    #[test]
    fn test_path_statistics() {
        let db = seeded_db("1a00-1a05;1b00-1b05");
        let store = TemplateStore::new(db.clone());
        let registry = DeviceRegistry::new(db.clone());
        // 1a06 is mapped but never discovered
        store
            .create_fcp_template(&TemplateSpec::new("t1", "1a00-1a06;1b00-1b05").with_id("t1"))
            .unwrap();

        registry
            .reserve_fcps(&fcps(&["1a00"]), "user1", "t1")
            .unwrap();
        registry.increase_connections(&fcp("1a00")).unwrap();
        registry.increase_connections(&fcp("1a01")).unwrap();
        registry
            .reserve_fcps(&fcps(&["1a02"]), "user2", "t1")
            .unwrap();

        let mut active = fcp_info("1a03", FcpState::Active);
        active.owner = "zvm9".into();
        registry
            .bulk_update_zvm_fcp_info_in_fcp_table(&[
                active,
                fcp_info("1a04", FcpState::Offline),
                fcp_info("1a05", FcpState::NotFound),
            ])
            .unwrap();

        let stats = db.read(|t| Ok(path_statistics(t, "t1"))).unwrap();
        let p0 = &stats[&0];
        assert_eq!(p0.total, "1A00-1A06");
        assert_eq!(p0.total_count, 7);
        assert_eq!(p0.available, "");
        assert_eq!(p0.available_count, 0);
        assert_eq!(p0.allocated, "1A00-1A02");
        assert_eq!(p0.reserve_only, "1A02");
        assert_eq!(p0.connection_only, "1A01");
        assert_eq!(p0.allocated_but_free, "1A00-1A02");
        assert_eq!(p0.unallocated_but_active["zvm9"], "1A03");
        assert_eq!(p0.offline, "1A04");
        assert_eq!(p0.notfound, "1A05-1A06");
        assert_eq!(p0.chpids["1A"], "1A00-1A05");

        let p1 = &stats[&1];
        assert_eq!(p1.available, "1B00-1B05");
        assert_eq!(p1.available_count, 6);
        assert_eq!(p1.chpids["1B"], "1B00-1B05");
    }

    #[test]
    fn test_template_details() {
        let db = seeded_db("1a00-1a01;1b00-1b01");
        let store = TemplateStore::new(db.clone());
        store
            .create_fcp_template(
                &TemplateSpec::new("t1", "1a00-1a01;1b00-1b01")
                    .with_id("t1")
                    .default_sp_list(["sp1"]),
            )
            .unwrap();

        let details = db
            .read(|t| Ok(template_details(t, t.template("t1")?, true, false)))
            .unwrap();
        assert_eq!(details.fcp_devices, "1A00-1A01;1B00-1B01");
        assert_eq!(details.info.storage_providers, vec!["sp1"]);
        assert!(details.statistics.is_none());

        let raw = details.raw.unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[2].path, 1);
        assert_eq!(raw[2].fcp_id, fcp("1b00"));
        assert!(raw.iter().all(|r| r.device.is_some()));
    }
}
