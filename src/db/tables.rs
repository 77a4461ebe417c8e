//! In-memory rendition of the FCP store's four tables
//!
//! `fcp(fcp_id PK, ...)`, `template(id PK, ...)`,
//! `template_fcp_mapping(fcp_id, tmpl_id, path)` and
//! `template_sp_mapping(sp_name, tmpl_id)`. The helpers here are the
//! single-statement building blocks the components compose inside one
//! transaction.

use crate::domain::{
    FcpDevice, FcpId, FcpPaths, MultipathTemplate, PathMapping, TemplateBasicInfo,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All rows of the FCP store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    /// `fcp` table
    pub fcp: BTreeMap<FcpId, FcpDevice>,
    /// `template` table
    pub templates: BTreeMap<String, MultipathTemplate>,
    /// `template_fcp_mapping`; an FCP maps to one (template, path) at a time
    pub template_fcp_mapping: BTreeMap<FcpId, PathMapping>,
    /// `template_sp_mapping`; sp_name -> template id
    pub template_sp_mapping: BTreeMap<String, String>,
}

impl Tables {
    // =========================================================================
    // fcp
    // =========================================================================

    pub fn fcp_row(&self, fcp_id: &FcpId) -> Result<&FcpDevice> {
        self.fcp.get(fcp_id).ok_or_else(|| Error::FcpNotFound {
            fcp_id: fcp_id.to_string(),
        })
    }

    pub fn fcp_row_mut(&mut self, fcp_id: &FcpId) -> Result<&mut FcpDevice> {
        self.fcp.get_mut(fcp_id).ok_or_else(|| Error::FcpNotFound {
            fcp_id: fcp_id.to_string(),
        })
    }

    // =========================================================================
    // template
    // =========================================================================

    pub fn template(&self, tmpl_id: &str) -> Result<&MultipathTemplate> {
        self.templates
            .get(tmpl_id)
            .ok_or_else(|| Error::TemplateNotFound {
                template_id: tmpl_id.to_string(),
            })
    }

    pub fn template_mut(&mut self, tmpl_id: &str) -> Result<&mut MultipathTemplate> {
        self.templates
            .get_mut(tmpl_id)
            .ok_or_else(|| Error::TemplateNotFound {
                template_id: tmpl_id.to_string(),
            })
    }

    /// Clear `is_default` on every template
    pub fn clear_host_default(&mut self) {
        for tmpl in self.templates.values_mut() {
            tmpl.is_default = false;
        }
    }

    pub fn basic_info(&self, tmpl: &MultipathTemplate) -> TemplateBasicInfo {
        TemplateBasicInfo {
            id: tmpl.id.clone(),
            name: tmpl.name.clone(),
            description: tmpl.description.clone(),
            host_default: tmpl.is_default,
            storage_providers: self.sp_names_of(&tmpl.id),
            min_fcp_paths_count: tmpl.min_fcp_paths_count,
        }
    }

    // =========================================================================
    // template_fcp_mapping
    // =========================================================================

    /// Devices of a template grouped by path
    pub fn template_paths(&self, tmpl_id: &str) -> FcpPaths {
        let mut paths = FcpPaths::new();
        for (fcp_id, mapping) in &self.template_fcp_mapping {
            if mapping.tmpl_id == tmpl_id {
                paths
                    .entry(mapping.path)
                    .or_default()
                    .insert(fcp_id.clone());
            }
        }
        paths
    }

    /// Number of distinct paths holding at least one device
    pub fn path_count(&self, tmpl_id: &str) -> usize {
        self.template_paths(tmpl_id).len()
    }

    /// Template the device is mapped to, if any
    pub fn mapped_template(&self, fcp_id: &FcpId) -> Option<&str> {
        self.template_fcp_mapping
            .get(fcp_id)
            .map(|m| m.tmpl_id.as_str())
    }

    pub fn unmap_template(&mut self, tmpl_id: &str) {
        self.template_fcp_mapping.retain(|_, m| m.tmpl_id != tmpl_id);
    }

    // =========================================================================
    // template_sp_mapping
    // =========================================================================

    pub fn sp_names_of(&self, tmpl_id: &str) -> Vec<String> {
        self.template_sp_mapping
            .iter()
            .filter(|(_, t)| t.as_str() == tmpl_id)
            .map(|(sp, _)| sp.clone())
            .collect()
    }

    pub fn unbind_template(&mut self, tmpl_id: &str) {
        self.template_sp_mapping.retain(|_, t| t != tmpl_id);
    }
}
