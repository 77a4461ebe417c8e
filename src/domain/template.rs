//! Multipath template records

use super::fcp::{FcpDevice, FcpId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel for "use the template's actual path count"
pub const MIN_FCP_PATHS_UNSET: i32 = -1;

/// Devices of a template grouped by zero-based path index
pub type FcpPaths = BTreeMap<usize, BTreeSet<FcpId>>;

/// One row of the `template` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipathTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub min_fcp_paths_count: i32,
}

/// One row of the `template_fcp_mapping` table, keyed by FCP id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub tmpl_id: String,
    pub path: usize,
}

/// Input of template creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Caller-supplied id, generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Shorthand device list, e.g. `1A00-1A03;1B00-1B03`
    #[serde(default)]
    pub fcp_devices: String,
    #[serde(default)]
    pub host_default: bool,
    #[serde(default)]
    pub default_sp_list: Vec<String>,
    #[serde(default = "default_min_fcp_paths_count")]
    pub min_fcp_paths_count: i32,
}

fn default_min_fcp_paths_count() -> i32 {
    MIN_FCP_PATHS_UNSET
}

impl TemplateSpec {
    pub fn new(name: impl Into<String>, fcp_devices: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fcp_devices: fcp_devices.into(),
            min_fcp_paths_count: MIN_FCP_PATHS_UNSET,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn host_default(mut self, host_default: bool) -> Self {
        self.host_default = host_default;
        self
    }

    pub fn default_sp_list<S: Into<String>>(mut self, sps: impl IntoIterator<Item = S>) -> Self {
        self.default_sp_list = sps.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_fcp_paths_count(mut self, count: i32) -> Self {
        self.min_fcp_paths_count = count;
        self
    }
}

/// Partial template update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateEdit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fcp_devices: Option<String>,
    #[serde(default)]
    pub host_default: Option<bool>,
    #[serde(default)]
    pub default_sp_list: Option<Vec<String>>,
    #[serde(default)]
    pub min_fcp_paths_count: Option<i32>,
}

impl TemplateEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.fcp_devices.is_none()
            && self.host_default.is_none()
            && self.default_sp_list.is_none()
            && self.min_fcp_paths_count.is_none()
    }
}

/// Basic template information returned by create/edit/list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBasicInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub host_default: bool,
    pub storage_providers: Vec<String>,
    pub min_fcp_paths_count: i32,
}

/// One device of a template joined with its registry row
///
/// `device` is `None` when the mapped address is unknown to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcpDetailRow {
    pub tmpl_id: String,
    pub path: usize,
    pub fcp_id: FcpId,
    pub device: Option<FcpDevice>,
}

/// Usage statistics of one path of a template
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStatistics {
    pub total: String,
    pub total_count: usize,
    pub available: String,
    pub available_count: usize,
    pub allocated: String,
    pub reserve_only: String,
    pub connection_only: String,
    /// Unallocated devices the hypervisor reports active, by owner
    pub unallocated_but_active: BTreeMap<String, String>,
    pub allocated_but_free: String,
    pub notfound: String,
    pub offline: String,
    /// Devices by channel path id
    pub chpids: BTreeMap<String, String>,
}

/// Full report of one template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDetails {
    #[serde(flatten)]
    pub info: TemplateBasicInfo,
    pub fcp_devices: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<FcpDetailRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BTreeMap<usize, PathStatistics>>,
}
