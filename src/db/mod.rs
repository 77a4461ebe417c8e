//! FCP Store
//!
//! Serializes every access to the FCP tables through one lock owned by the
//! store object, and gives each mutation a transaction boundary: the body
//! runs against a working copy that is committed only when it returns `Ok`.
//!
//! Components never take the lock themselves. Multi-step sequences (such as
//! select-then-reserve) are written as one closure over `&mut Tables` so the
//! whole sequence is a single critical section.

pub mod backend;
pub mod tables;

pub use backend::{FileBackend, MemoryBackend, Snapshot, SnapshotBackend};
pub use tables::Tables;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transaction counters
#[derive(Debug, Default)]
pub struct DatabaseStats {
    pub commits: AtomicU64,
    pub rollbacks: AtomicU64,
}

/// Lock-guarded, transactional FCP store
pub struct Database {
    name: String,
    /// `None` once closed
    tables: Mutex<Option<Tables>>,
    backend: Arc<dyn SnapshotBackend>,
    stats: DatabaseStats,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("backend", &self.backend.backend_name())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// Open a store, loading committed state from the backend
    pub fn open(name: impl Into<String>, backend: Arc<dyn SnapshotBackend>) -> Result<Arc<Self>> {
        let name = name.into();
        let tables = backend.load()?.unwrap_or_default();
        info!(
            "Opened database {} on {} backend ({} FCP devices, {} templates)",
            name,
            backend.backend_name(),
            tables.fcp.len(),
            tables.templates.len()
        );
        Ok(Arc::new(Self {
            name,
            tables: Mutex::new(Some(tables)),
            backend,
            stats: DatabaseStats::default(),
        }))
    }

    /// Empty store on a fresh memory backend
    pub fn in_memory(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            tables: Mutex::new(Some(Tables::default())),
            backend: Arc::new(MemoryBackend::new()),
            stats: DatabaseStats::default(),
        })
    }

    /// Open a store as described by configuration
    pub fn from_config(config: &DatabaseConfig) -> Result<Arc<Self>> {
        let backend: Arc<dyn SnapshotBackend> = match &config.backend {
            DatabaseBackend::Memory => Arc::new(MemoryBackend::new()),
            DatabaseBackend::File { path } => {
                let backend = FileBackend::new(path.clone());
                if config.sync_writes {
                    Arc::new(backend)
                } else {
                    Arc::new(backend.without_sync())
                }
            }
        };
        Self::open(config.name.clone(), backend)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.tables.lock().is_some()
    }

    /// Persist the current state and refuse further access
    pub fn close(&self) -> Result<()> {
        let mut guard = self.tables.lock();
        match guard.take() {
            Some(tables) => {
                if let Err(e) = self.backend.persist(&tables) {
                    *guard = Some(tables);
                    return Err(e);
                }
                info!("Closed database {}", self.name);
                Ok(())
            }
            None => {
                warn!("Database {} already closed", self.name);
                Ok(())
            }
        }
    }

    /// Run a read-only query under the store lock
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> Result<T>) -> Result<T> {
        let guard = self.tables.lock();
        let tables = guard.as_ref().ok_or_else(|| self.closed())?;
        f(tables)
    }

    /// Run a read-modify-write sequence as one transaction
    ///
    /// The closure sees a working copy. An `Err` from the closure (or from
    /// persisting the result) discards every change it made.
    ///
    /// Every transaction clones all tables and a changed copy is persisted as
    /// a full snapshot, so the cost of a write grows with the device fleet.
    /// Unchanged copies skip the backend.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.lock();
        let current = guard.as_ref().ok_or_else(|| self.closed())?;
        let mut working = current.clone();

        let out = match f(&mut working) {
            Ok(out) => out,
            Err(e) => {
                self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
                debug!("Transaction on {} rolled back: {}", self.name, e);
                return Err(e);
            }
        };

        if &working != current {
            if let Err(e) = self.backend.persist(&working) {
                self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
                warn!("Persisting {} failed, transaction rolled back: {}", self.name, e);
                return Err(e);
            }
            *guard = Some(working);
        }
        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        Ok(out)
    }

    pub fn commit_count(&self) -> u64 {
        self.stats.commits.load(Ordering::Relaxed)
    }

    pub fn rollback_count(&self) -> u64 {
        self.stats.rollbacks.load(Ordering::Relaxed)
    }

    fn closed(&self) -> Error {
        Error::DatabaseClosed {
            name: self.name.clone(),
        }
    }
}
