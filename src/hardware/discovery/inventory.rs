//! Static FCP Inventory
//!
//! Reads the devices the fleet reports from a YAML document, one entry per
//! device:
//!
//! ```yaml
//! - fcp_id: 1a00
//!   wwpn_npiv: c05076de33000a00
//!   wwpn_phy: c05076de33002600
//!   chpid: "27"
//!   state: free
//!   owner: zvm1
//! ```

use crate::domain::{FcpInfo, FcpInventory};
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Fixed(Vec<FcpInfo>),
}

/// Inventory backed by a YAML file or a fixed list
#[derive(Debug, Clone)]
pub struct StaticInventory {
    source: Source,
    name: String,
}

impl StaticInventory {
    /// Inventory re-read from `path` on every discovery
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            source: Source::File(path),
        }
    }

    pub fn from_devices(devices: Vec<FcpInfo>) -> Self {
        Self {
            name: "static".to_string(),
            source: Source::Fixed(devices),
        }
    }

    /// Parse a YAML device list
    pub fn parse(raw: &str) -> Result<Vec<FcpInfo>> {
        let devices: Vec<FcpInfo> = serde_yaml::from_str(raw)?;
        let mut seen = BTreeSet::new();
        if let Some(dup) = devices.iter().find(|d| !seen.insert(d.fcp_id.clone())) {
            return Err(Error::InvalidInput(format!(
                "FCP device {} is listed twice in the inventory",
                dup.fcp_id.to_upper()
            )));
        }
        Ok(devices)
    }
}

impl FcpInventory for StaticInventory {
    fn discover(&self) -> Result<Vec<FcpInfo>> {
        let devices = match &self.source {
            Source::File(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Configuration(format!("cannot read inventory {}: {}", path.display(), e))
                })?;
                Self::parse(&raw)?
            }
            Source::Fixed(devices) => devices.clone(),
        };
        debug!("Inventory {} reports {} FCP devices", self.name, devices.len());
        Ok(devices)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FcpState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const INVENTORY: &str = r#"
- fcp_id: 1A00
  wwpn_npiv: c05076de33000a00
  wwpn_phy: c05076de33002600
  chpid: "27"
  state: free
  owner: zvm1
- fcp_id: 1b00
  state: notfound
"#;

    #[test]
    fn test_parse() {
        let devices = StaticInventory::parse(INVENTORY).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].fcp_id.as_str(), "1a00");
        assert_eq!(devices[0].state, FcpState::Free);
        assert_eq!(devices[1].state, FcpState::NotFound);
        assert!(devices[1].wwpn_npiv.is_empty());
    }

    #[test]
    fn test_parse_rejects_duplicates_and_bad_ids() {
        let dup = "- fcp_id: 1a00\n- fcp_id: 1A00\n";
        assert!(StaticInventory::parse(dup).is_err());
        assert!(StaticInventory::parse("- fcp_id: xyz1\n").is_err());
    }

    #[test]
    fn test_file_inventory_is_reread() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(INVENTORY.as_bytes()).unwrap();
        let inventory = StaticInventory::from_file(file.path());
        assert_eq!(inventory.discover().unwrap().len(), 2);
        assert!(inventory.source_name().starts_with("file:"));

        std::fs::write(file.path(), "- fcp_id: 1c00\n").unwrap();
        let devices = inventory.discover().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].fcp_id.as_str(), "1c00");
    }

    #[test]
    fn test_missing_file() {
        let inventory = StaticInventory::from_file("/nonexistent/inventory.yaml");
        assert_matches::assert_matches!(inventory.discover(), Err(Error::Configuration(_)));
    }
}
