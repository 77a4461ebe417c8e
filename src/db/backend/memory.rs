//! In-memory snapshot backend
//!
//! Keeps the last committed snapshot in process memory. Used by tests and
//! by deployments that rebuild the FCP table from a fleet sync on start.

use super::{Snapshot, SnapshotBackend};
use crate::db::tables::Tables;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot backend held in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: RwLock<Option<Snapshot>>,
    persist_count: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with committed state
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            snapshot: RwLock::new(Some(Snapshot::now(&tables))),
            persist_count: AtomicU64::new(0),
        }
    }

    /// Number of committed snapshots written
    pub fn persist_count(&self) -> u64 {
        self.persist_count.load(Ordering::Relaxed)
    }
}

impl SnapshotBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Tables>> {
        Ok(self.snapshot.read().as_ref().map(|s| s.tables.clone()))
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        *self.snapshot.write() = Some(Snapshot::now(tables));
        self.persist_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let backend = MemoryBackend::new();
        assert!(backend.load().unwrap().is_none());

        let mut tables = Tables::default();
        tables
            .template_sp_mapping
            .insert("sp1".into(), "t1".into());
        backend.persist(&tables).unwrap();

        assert_eq!(backend.load().unwrap(), Some(tables));
        assert_eq!(backend.persist_count(), 1);
    }
}
