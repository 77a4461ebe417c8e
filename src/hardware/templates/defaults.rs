//! Default-Binding Resolver
//!
//! Decides which template an allocation request falls back to when it does
//! not name one: the storage provider's default first, then the host default.
//! At most one template is the host default and every storage provider name
//! resolves to at most one template.

use crate::db::{Database, Tables};
use crate::domain::TemplateBasicInfo;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Bind each name to `tmpl_id`, replacing any previous binding of that name
pub(crate) fn bind_sp_defaults(t: &mut Tables, tmpl_id: &str, sp_names: &[String]) -> Result<()> {
    t.template(tmpl_id)?;
    for sp_name in sp_names {
        let sp_name = sp_name.trim();
        if sp_name.is_empty() {
            continue;
        }
        if let Some(previous) = t
            .template_sp_mapping
            .insert(sp_name.to_string(), tmpl_id.to_string())
        {
            if previous != tmpl_id {
                debug!(
                    "Storage provider {} default moved from template {} to {}",
                    sp_name, previous, tmpl_id
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn host_default_templates(t: &Tables, is_default: bool) -> Vec<TemplateBasicInfo> {
    t.templates
        .values()
        .filter(|tmpl| tmpl.is_default == is_default)
        .map(|tmpl| t.basic_info(tmpl))
        .collect()
}

/// Templates bound to the given storage providers, or to any when empty
pub(crate) fn sp_default_templates(t: &Tables, sp_names: &[String]) -> Vec<TemplateBasicInfo> {
    let ids: BTreeSet<&str> = t
        .template_sp_mapping
        .iter()
        .filter(|(sp, _)| sp_names.is_empty() || sp_names.iter().any(|n| n == *sp))
        .map(|(_, tmpl_id)| tmpl_id.as_str())
        .collect();
    ids.into_iter()
        .filter_map(|id| t.templates.get(id))
        .map(|tmpl| t.basic_info(tmpl))
        .collect()
}

/// Templates recorded on the devices currently assigned to a guest
pub(crate) fn templates_of_assigner(t: &Tables, assigner_id: &str) -> Vec<TemplateBasicInfo> {
    let ids: BTreeSet<&str> = t
        .fcp
        .values()
        .filter(|row| row.assigner_id == assigner_id && !row.tmpl_id.is_empty())
        .map(|row| row.tmpl_id.as_str())
        .collect();
    ids.into_iter()
        .filter_map(|id| t.templates.get(id))
        .map(|tmpl| t.basic_info(tmpl))
        .collect()
}

/// Template id an allocation request should use
///
/// An explicit id must exist. Otherwise the storage provider's default wins
/// over the host default.
pub(crate) fn resolve(t: &Tables, tmpl_id: Option<&str>, sp_name: Option<&str>) -> Result<String> {
    if let Some(id) = tmpl_id.filter(|id| !id.is_empty()) {
        return Ok(t.template(id)?.id.clone());
    }
    if let Some(id) = sp_name.and_then(|sp| t.template_sp_mapping.get(sp)) {
        return Ok(id.clone());
    }
    t.templates
        .values()
        .find(|tmpl| tmpl.is_default)
        .map(|tmpl| tmpl.id.clone())
        .ok_or(Error::NoDefaultTemplate)
}

/// Default-binding lookups and updates over the FCP store
#[derive(Debug, Clone)]
pub struct DefaultBindingResolver {
    db: Arc<Database>,
}

impl DefaultBindingResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn bulk_set_sp_default_by_fcp_template(&self, tmpl_id: &str, sp_names: &[String]) -> Result<()> {
        self.db
            .transaction(|t| bind_sp_defaults(t, tmpl_id, sp_names))?;
        info!(
            "Storage providers {:?} now default to FCP Multipath Template {}",
            sp_names, tmpl_id
        );
        Ok(())
    }

    /// Templates whose host-default flag equals `is_default`
    pub fn get_host_default_fcp_template(&self, is_default: bool) -> Result<Vec<TemplateBasicInfo>> {
        self.db.read(|t| Ok(host_default_templates(t, is_default)))
    }

    pub fn get_sp_default_fcp_template(&self, sp_names: &[String]) -> Result<Vec<TemplateBasicInfo>> {
        self.db.read(|t| Ok(sp_default_templates(t, sp_names)))
    }

    pub fn get_fcp_template_by_assigner_id(&self, assigner_id: &str) -> Result<Vec<TemplateBasicInfo>> {
        self.db.read(|t| Ok(templates_of_assigner(t, assigner_id)))
    }

    pub fn resolve_template(&self, tmpl_id: Option<&str>, sp_name: Option<&str>) -> Result<String> {
        self.db.read(|t| resolve(t, tmpl_id, sp_name))
    }
}
