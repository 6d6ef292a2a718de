//! Pure data types for agentfs: tenant keys, encodings, directory entries and errors.
//!
//! This crate is a leaf dependency with no async runtime and no I/O. Callers
//! that only need to name tenants or match on errors can depend on it without
//! pulling in agentfs-kernel.

pub mod dir_entry;
pub mod encoding;
pub mod error;
pub mod tenant;

// Flat re-exports for convenience
pub use dir_entry::*;
pub use encoding::*;
pub use error::*;
pub use tenant::*;
