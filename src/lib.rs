//! z/VM FCP Manager - Multipath Template & Device Allocation Engine
//!
//! Tracks the Fibre Channel Protocol (FCP) devices of a z/VM hypervisor,
//! groups them into FCP Multipath Templates, and hands guests one device per
//! path when they attach SAN volumes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        REST API (axum)                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                          FCP Engine                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  ┌──────────┐  │
//! │  │   Template   │  │   Default    │  │     FCP      │  │ Fleet    │  │
//! │  │    Store     │  │   Bindings   │  │  Allocator   │  │ Sync     │  │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘  └────┬─────┘  │
//! │         └─────────────────┴────────┬────────┴───────────────┘        │
//! │                        ┌───────────┴───────────┐                     │
//! │                        │    Device Registry    │                     │
//! │                        └───────────┬───────────┘                     │
//! ├────────────────────────────────────┴─────────────────────────────────┤
//! │           FCP Store (single lock, transactional tables)              │
//! │        ┌──────────────────┐        ┌──────────────────┐              │
//! │        │  Memory backend  │        │   File backend   │              │
//! │        └──────────────────┘        └──────────────────┘              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`controlplane`]: Engine facade and REST API
//! - [`hardware`]: Device registry, templates, allocation and discovery
//! - [`db`]: Transactional FCP store and its persistence backends
//! - [`domain`]: Table rows and port definitions
//! - [`config`]: Engine configuration
//! - [`metrics`]: Prometheus metrics
//! - [`error`]: Error types and handling

pub mod config;
pub mod controlplane;
pub mod db;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod metrics;

// Re-export commonly used types
pub use config::{AllocationConfig, DatabaseBackend, DatabaseConfig, EngineConfig, SelectionStrategy};

pub use controlplane::{ApiServer, ApiServerConfig, FcpEngine, RestRouter};

pub use db::Database;

pub use domain::{
    AllocatedFcp, FcpDevice, FcpId, FcpInfo, FcpInventory, FcpPaths, FcpState, FcpUsage,
    MultipathTemplate, PathStatistics, TemplateBasicInfo, TemplateDetails, TemplateEdit,
    TemplateSpec, MIN_FCP_PATHS_UNSET,
};

pub use error::{Error, ErrorKind, Result};

pub use hardware::{
    expand_fcp_list, shrink_fcp_list, DefaultBindingResolver, DeviceRegistry, FcpAllocation,
    FcpAllocator, StaticInventory, SyncReport, TemplateStore,
};

pub use metrics::EngineMetrics;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
