//! agentfs-kernel: per-tenant sandboxed virtual filesystems.
//!
//! This crate provides:
//!
//! - **InstanceRegistry**: one lazily built filesystem per tenant, shared by
//!   every caller asking for that tenant
//! - **VirtualFilesystem**: the handle callers read and write through
//! - **Teardown**: `close` / `close_all` release storage and forget tenants
//! - **Backends**: in-memory and on-disk storage behind `FilesystemFactory`
//!
//! ```rust,ignore
//! use agentfs_kernel::InstanceRegistry;
//!
//! let registry = InstanceRegistry::in_memory();
//! let fs = registry.get_for_tenant("user-1").await?;
//! fs.write_file("/workspace/query.sql", "SELECT 1").await?;
//! assert_eq!(fs.read_to_string("/workspace/query.sql").await?, "SELECT 1");
//! registry.close_all().await?;
//! ```

pub mod config;
pub mod factory;
pub mod instance;
mod lifecycle;
#[cfg(feature = "native")]
pub mod paths;
pub mod registry;
pub mod vfs;

pub use agentfs_types::{
    AgentFsError, DirEntry, DirEntryKind, Encoding, Result, TeardownFailure, TenantKey,
};
pub use config::{AgentFsConfig, StorageConfig};
#[cfg(feature = "native")]
pub use factory::LocalFactory;
pub use factory::{FilesystemFactory, MemoryFactory};
pub use instance::VirtualFilesystem;
pub use registry::{EntryState, InstanceRegistry};
