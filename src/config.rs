//! Engine Configuration
//!
//! Defaults are usable as-is; a YAML file can override any section and the
//! command line overrides individual values on top of that.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Database Configuration
// =============================================================================

/// Where the FCP store keeps committed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Process memory only
    Memory,
    /// JSON snapshot file
    File { path: PathBuf },
}

/// Configuration of the FCP store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Store name used in logs
    pub name: String,
    pub backend: DatabaseBackend,
    /// fsync each committed snapshot
    pub sync_writes: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "fcp".to_string(),
            backend: DatabaseBackend::Memory,
            sync_writes: true,
        }
    }
}

// =============================================================================
// Allocation Configuration
// =============================================================================

/// How devices are picked from a template's paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// One random free device per path
    #[default]
    Random,
    /// One device per path, all at the same index
    SameIndex,
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::Random => write!(f, "random"),
            SelectionStrategy::SameIndex => write!(f, "same_index"),
        }
    }
}

/// Configuration of the allocation engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub strategy: SelectionStrategy,
    /// Fixed RNG seed; entropy-seeded when absent
    pub rng_seed: Option<u64>,
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub allocation: AllocationConfig,
    /// YAML list of the FCP devices the fleet reports
    pub inventory_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.database.backend, DatabaseBackend::Memory);
        assert_eq!(config.allocation.strategy, SelectionStrategy::Random);
        assert!(config.allocation.rng_seed.is_none());
        assert!(config.inventory_path.is_none());
    }

    #[test]
    fn test_from_yaml() {
        let config = EngineConfig::from_yaml(
            r#"
database:
  backend:
    type: file
    path: /var/lib/zvm/fcp.json
allocation:
  strategy: same_index
  rng_seed: 7
"#,
        )
        .unwrap();

        assert_eq!(
            config.database.backend,
            DatabaseBackend::File {
                path: PathBuf::from("/var/lib/zvm/fcp.json")
            }
        );
        assert_eq!(config.database.name, "fcp");
        assert_eq!(config.allocation.strategy, SelectionStrategy::SameIndex);
        assert_eq!(config.allocation.rng_seed, Some(7));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(EngineConfig::from_yaml("allocation: [1, 2").is_err());
        assert!(EngineConfig::from_file("/nonexistent/fcp.yaml").is_err());
    }
}
