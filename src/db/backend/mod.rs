//! Snapshot Backends
//!
//! Where committed table state is kept between transactions and across
//! restarts.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::db::tables::Tables;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Snapshot
// =============================================================================

/// Committed table state as written by a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: DateTime<Utc>,
    pub tables: Tables,
}

impl Snapshot {
    pub fn now(tables: &Tables) -> Self {
        Self {
            saved_at: Utc::now(),
            tables: tables.clone(),
        }
    }
}

// =============================================================================
// SnapshotBackend Trait
// =============================================================================

/// Trait for persisting committed table state
///
/// `persist` is called with the lock of the owning database held, after the
/// transaction body succeeded and before the new state becomes visible. A
/// failing `persist` rolls the transaction back.
pub trait SnapshotBackend: Send + Sync {
    /// Load the last committed state, `None` for a fresh store
    fn load(&self) -> Result<Option<Tables>>;

    /// Persist a newly committed state
    fn persist(&self, tables: &Tables) -> Result<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &str;
}
