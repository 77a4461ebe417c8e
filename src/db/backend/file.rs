//! JSON file snapshot backend

use super::{Snapshot, SnapshotBackend};
use crate::db::tables::Tables;
use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Snapshot backend writing one JSON document per commit
///
/// Writes go to `<path>.tmp` first and are renamed over `path`, so a crash
/// leaves either the previous or the new state on disk.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    tmp_path: PathBuf,
    sync_writes: bool,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
            sync_writes: true,
        }
    }

    /// Skip fsync on each commit
    pub fn without_sync(mut self) -> Self {
        self.sync_writes = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotBackend for FileBackend {
    fn load(&self) -> Result<Option<Tables>> {
        if !self.path.exists() {
            info!("No FCP database at {}, starting empty", self.path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        info!(
            "Loaded FCP database from {} (saved at {}, {} FCP devices, {} templates)",
            self.path.display(),
            snapshot.saved_at,
            snapshot.tables.fcp.len(),
            snapshot.tables.templates.len()
        );
        Ok(Some(snapshot.tables))
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_vec_pretty(&Snapshot::now(tables))?;
        {
            let mut file = fs::File::create(&self.tmp_path)?;
            file.write_all(&data)?;
            if self.sync_writes {
                file.sync_all()?;
            }
        }
        fs::rename(&self.tmp_path, &self.path)?;

        debug!("Persisted FCP database to {} ({} bytes)", self.path.display(), data.len());
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}
