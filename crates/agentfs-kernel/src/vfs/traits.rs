//! Core backend trait.

use agentfs_types::{DirEntry, DirEntryKind};
use async_trait::async_trait;
use std::io;
use std::path::Path;

/// Abstract storage backend for one tenant.
///
/// All operations use paths relative to the backend root.
/// For example, if a `LocalFs` is rooted at `/var/lib/agentfs/tenants/default`,
/// then `read("workspace/test.sql")` reads
/// `/var/lib/agentfs/tenants/default/workspace/test.sql`.
/// A leading `/` is ignored.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Read the entire contents of a file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write data to a file, creating it and any missing parent
    /// directories. Overwrites existing files.
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// List entries in a directory, sorted by name.
    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Get metadata for a file or directory.
    async fn stat(&self, path: &Path) -> io::Result<DirEntry>;

    /// Create a directory (and parent directories if needed).
    async fn mkdir(&self, path: &Path) -> io::Result<()>;

    /// Remove a file or empty directory.
    async fn remove(&self, path: &Path) -> io::Result<()>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Rename (move) a file or directory.
    ///
    /// The default implementation falls back to copy+delete, which is not
    /// atomic and only handles files.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let entry = self.stat(from).await?;
        if entry.kind == DirEntryKind::Directory {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "rename directories not supported by this filesystem",
            ));
        }
        let data = self.read(from).await?;
        self.write(to, &data).await?;
        self.remove(from).await?;
        Ok(())
    }

    /// Release the underlying storage.
    ///
    /// Called exactly once, when the owning instance is closed. No other
    /// method is called afterwards.
    async fn release(&self) -> io::Result<()> {
        Ok(())
    }
}
