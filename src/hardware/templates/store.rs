//! Multipath Template Store
//!
//! Create, edit and delete templates together with their path mappings and
//! storage-provider bindings. Every operation validates completely before it
//! mutates, and runs in a single transaction.

use super::defaults::bind_sp_defaults;
use super::report::template_details;
use crate::db::{Database, Tables};
use crate::domain::{
    FcpId, FcpPaths, MultipathTemplate, PathMapping, TemplateBasicInfo, TemplateEdit,
    TemplateDetails, TemplateSpec, MIN_FCP_PATHS_UNSET,
};
use crate::error::{Error, Result};
use crate::hardware::range::{expand_fcp_list, shrink_fcp_list};
use crate::hardware::registry::device_registry::inuse_by_template;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

// =============================================================================
// Validation
// =============================================================================

/// Check `min_fcp_paths_count` against the path count
///
/// Either side may be omitted, in which case the stored value of `tmpl_id`
/// is used. `-1` always passes.
pub(crate) fn validate_min_fcp_paths_count(
    t: &Tables,
    fcp_devices: Option<&FcpPaths>,
    min_fcp_paths_count: Option<i32>,
    tmpl_id: &str,
) -> Result<()> {
    let min = match min_fcp_paths_count {
        Some(min) => min,
        None => t.template(tmpl_id)?.min_fcp_paths_count,
    };
    if min != MIN_FCP_PATHS_UNSET && min < 1 {
        return Err(Error::InvalidInput(format!(
            "min_fcp_paths_count must be -1 or a positive integer, got {}",
            min
        )));
    }
    if min == MIN_FCP_PATHS_UNSET {
        return Ok(());
    }

    let path_count = match fcp_devices {
        Some(paths) => paths.len(),
        None => t.path_count(tmpl_id),
    };
    if min as usize > path_count {
        return Err(Error::MinPathsExceeded {
            min_fcp_paths_count: min,
            path_count,
        });
    }
    Ok(())
}

/// Reject devices that are already mapped to another template
fn ensure_unmapped_elsewhere<'a>(
    t: &Tables,
    tmpl_id: &str,
    fcp_ids: impl IntoIterator<Item = &'a FcpId>,
) -> Result<()> {
    let mut conflicts: Vec<(&str, &FcpId)> = fcp_ids
        .into_iter()
        .filter_map(|id| match t.mapped_template(id) {
            Some(owner) if owner != tmpl_id => Some((owner, id)),
            _ => None,
        })
        .collect();
    if conflicts.is_empty() {
        return Ok(());
    }
    conflicts.sort();
    let owner = conflicts[0].0.to_string();
    Err(Error::FcpMappedElsewhere {
        fcp_ids: shrink_fcp_list(conflicts.iter().map(|(_, id)| *id)),
        owner,
    })
}

fn map_paths(t: &mut Tables, tmpl_id: &str, paths: &FcpPaths) {
    for (path, devices) in paths {
        for fcp_id in devices {
            t.template_fcp_mapping.insert(
                fcp_id.clone(),
                PathMapping {
                    tmpl_id: tmpl_id.to_string(),
                    path: *path,
                },
            );
        }
    }
}

fn set_host_default(t: &mut Tables, tmpl_id: &str, host_default: bool) -> Result<()> {
    if host_default {
        t.clear_host_default();
    }
    t.template_mut(tmpl_id)?.is_default = host_default;
    Ok(())
}

// =============================================================================
// Table Operations
// =============================================================================

pub(crate) fn create(t: &mut Tables, spec: &TemplateSpec, tmpl_id: &str) -> Result<TemplateBasicInfo> {
    if t.templates.contains_key(tmpl_id) {
        return Err(Error::TemplateExists {
            template_id: tmpl_id.to_string(),
        });
    }
    let paths = expand_fcp_list(&spec.fcp_devices)?;
    validate_min_fcp_paths_count(t, Some(&paths), Some(spec.min_fcp_paths_count), tmpl_id)?;
    ensure_unmapped_elsewhere(t, tmpl_id, paths.values().flatten())?;

    t.templates.insert(
        tmpl_id.to_string(),
        MultipathTemplate {
            id: tmpl_id.to_string(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            is_default: false,
            min_fcp_paths_count: spec.min_fcp_paths_count,
        },
    );
    set_host_default(t, tmpl_id, spec.host_default)?;
    map_paths(t, tmpl_id, &paths);
    bind_sp_defaults(t, tmpl_id, &spec.default_sp_list)?;

    Ok(t.basic_info(t.template(tmpl_id)?))
}

pub(crate) fn edit(t: &mut Tables, tmpl_id: &str, edit: &TemplateEdit) -> Result<TemplateBasicInfo> {
    t.template(tmpl_id)?;
    if edit.is_empty() {
        return Err(Error::InvalidInput(format!(
            "nothing to change in FCP Multipath Template {}",
            tmpl_id
        )));
    }

    let new_paths = edit
        .fcp_devices
        .as_deref()
        .map(expand_fcp_list)
        .transpose()?;
    validate_min_fcp_paths_count(t, new_paths.as_ref(), edit.min_fcp_paths_count, tmpl_id)?;

    if let Some(new_paths) = &new_paths {
        let current = t.template_paths(tmpl_id);
        if !current.is_empty() && current.len() != new_paths.len() {
            return Err(Error::PathCountChange {
                template_id: tmpl_id.to_string(),
                current: current.len(),
                requested: new_paths.len(),
            });
        }

        let old: BTreeSet<&FcpId> = current.values().flatten().collect();
        let new: BTreeSet<&FcpId> = new_paths.values().flatten().collect();

        let in_use_elsewhere: Vec<&FcpId> = old
            .difference(&new)
            .copied()
            .filter(|id| {
                t.fcp
                    .get(*id)
                    .map_or(false, |row| row.is_in_use() && row.tmpl_id != tmpl_id)
            })
            .collect();
        if !in_use_elsewhere.is_empty() {
            return Err(Error::FcpInUse {
                template_id: tmpl_id.to_string(),
                fcp_ids: shrink_fcp_list(in_use_elsewhere),
            });
        }
        ensure_unmapped_elsewhere(t, tmpl_id, new.difference(&old).copied())?;

        debug!(
            "Template {}: removing [{}], adding [{}]",
            tmpl_id,
            shrink_fcp_list(old.difference(&new).copied()),
            shrink_fcp_list(new.difference(&old).copied())
        );
    }

    // validation complete
    if let Some(new_paths) = &new_paths {
        t.unmap_template(tmpl_id);
        map_paths(t, tmpl_id, new_paths);
    }
    {
        let tmpl = t.template_mut(tmpl_id)?;
        if let Some(name) = &edit.name {
            tmpl.name = name.clone();
        }
        if let Some(description) = &edit.description {
            tmpl.description = description.clone();
        }
        if let Some(min) = edit.min_fcp_paths_count {
            tmpl.min_fcp_paths_count = min;
        }
    }
    if let Some(host_default) = edit.host_default {
        set_host_default(t, tmpl_id, host_default)?;
    }
    if let Some(sp_list) = &edit.default_sp_list {
        t.unbind_template(tmpl_id);
        bind_sp_defaults(t, tmpl_id, sp_list)?;
    }

    Ok(t.basic_info(t.template(tmpl_id)?))
}

pub(crate) fn delete(t: &mut Tables, tmpl_id: &str) -> Result<()> {
    t.template(tmpl_id)?;
    let in_use = inuse_by_template(t, tmpl_id);
    if !in_use.is_empty() {
        return Err(Error::TemplateInUse {
            template_id: tmpl_id.to_string(),
            fcp_ids: shrink_fcp_list(in_use.iter().map(|d| &d.fcp_id)),
        });
    }
    t.templates.remove(tmpl_id);
    t.unmap_template(tmpl_id);
    t.unbind_template(tmpl_id);
    Ok(())
}

/// Templates in id order; unknown ids in `tmpl_ids` are an error
pub(crate) fn select<'a>(t: &'a Tables, tmpl_ids: Option<&[String]>) -> Result<Vec<&'a MultipathTemplate>> {
    match tmpl_ids {
        None => Ok(t.templates.values().collect()),
        Some(ids) => ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|id| t.template(id))
            .collect(),
    }
}

// =============================================================================
// Template Store
// =============================================================================

/// Template lifecycle over the FCP store
#[derive(Debug, Clone)]
pub struct TemplateStore {
    db: Arc<Database>,
}

impl TemplateStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a template; a missing id is generated
    pub fn create_fcp_template(&self, spec: &TemplateSpec) -> Result<TemplateBasicInfo> {
        let tmpl_id = spec
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let info = self.db.transaction(|t| create(t, spec, &tmpl_id))?;
        info!(
            "Created FCP Multipath Template {} ({}) with devices {:?}",
            info.id, info.name, spec.fcp_devices
        );
        Ok(info)
    }

    /// Apply a partial update
    pub fn edit_fcp_template(&self, tmpl_id: &str, changes: &TemplateEdit) -> Result<TemplateBasicInfo> {
        let info = self.db.transaction(|t| edit(t, tmpl_id, changes))?;
        info!("Edited FCP Multipath Template {}", tmpl_id);
        Ok(info)
    }

    pub fn delete_fcp_template(&self, tmpl_id: &str) -> Result<()> {
        self.db.transaction(|t| delete(t, tmpl_id))?;
        info!("Deleted FCP Multipath Template {}", tmpl_id);
        Ok(())
    }

    /// All templates, or the ones named
    pub fn get_fcp_templates(&self, tmpl_ids: Option<&[String]>) -> Result<Vec<TemplateBasicInfo>> {
        self.db.read(|t| {
            Ok(select(t, tmpl_ids)?
                .into_iter()
                .map(|tmpl| t.basic_info(tmpl))
                .collect())
        })
    }

    /// Templates joined with the usage of their devices
    ///
    /// `raw` adds one row per mapped device, `statistics` the per-path
    /// usage breakdown.
    pub fn get_fcp_templates_details(
        &self,
        tmpl_ids: Option<&[String]>,
        raw: bool,
        statistics: bool,
    ) -> Result<Vec<TemplateDetails>> {
        self.db.read(|t| {
            Ok(select(t, tmpl_ids)?
                .into_iter()
                .map(|tmpl| template_details(t, tmpl, raw, statistics))
                .collect())
        })
    }

    /// Devices of a template grouped by path
    pub fn get_fcp_paths(&self, tmpl_id: &str) -> Result<FcpPaths> {
        self.db.read(|t| {
            t.template(tmpl_id)?;
            Ok(t.template_paths(tmpl_id))
        })
    }

    pub fn get_path_count(&self, tmpl_id: &str) -> Result<usize> {
        Ok(self.get_fcp_paths(tmpl_id)?.len())
    }

    /// Validate `min_fcp_paths_count` against supplied or stored values
    pub fn validate_min_fcp_paths_count(
        &self,
        fcp_devices: Option<&str>,
        min_fcp_paths_count: Option<i32>,
        tmpl_id: &str,
    ) -> Result<()> {
        let paths = fcp_devices.map(expand_fcp_list).transpose()?;
        self.db.read(|t| {
            validate_min_fcp_paths_count(t, paths.as_ref(), min_fcp_paths_count, tmpl_id)
        })
    }
}
