//! Backend storage for tenant filesystems.
//!
//! A backend is the storage handle a [`VirtualFilesystem`](crate::VirtualFilesystem)
//! owns exclusively. The registry never looks inside one:
//!
//! - **MemoryFs**: In-memory ephemeral storage (default, tests)
//! - **LocalFs**: One real directory per tenant (feature `native`)
//!
//! Backends speak `std::io::Result` and relative paths; the instance layer
//! maps errors into `AgentFsError` and enforces the closed state.

#[cfg(feature = "native")]
mod local;
mod memory;
mod traits;

#[cfg(feature = "native")]
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use traits::Filesystem;
