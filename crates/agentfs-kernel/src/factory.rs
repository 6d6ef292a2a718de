//! Construction of tenant backends.
//!
//! The registry calls a [`FilesystemFactory`] at most once per tenant per
//! epoch. Factories may be slow (they can touch the disk) and may fail. Every
//! call must hand out an empty backend that shares nothing with any other
//! backend they have produced, including earlier epochs of the same tenant.

use std::io;
#[cfg(feature = "native")]
use std::path::PathBuf;

use agentfs_types::TenantKey;
use async_trait::async_trait;
#[cfg(feature = "native")]
use sha2::{Digest, Sha256};
#[cfg(feature = "native")]
use tokio::fs;

#[cfg(feature = "native")]
use crate::vfs::LocalFs;
use crate::vfs::{Filesystem, MemoryFs};

/// Builds the storage backend for a tenant.
#[async_trait]
pub trait FilesystemFactory: Send + Sync {
    /// Create a fresh backend for `key`.
    ///
    /// `epoch` is unique per registry and increases with every construction.
    async fn create(&self, key: &TenantKey, epoch: u64) -> io::Result<Box<dyn Filesystem>>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

/// Hands every tenant its own empty [`MemoryFs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryFactory;

#[async_trait]
impl FilesystemFactory for MemoryFactory {
    async fn create(&self, _key: &TenantKey, _epoch: u64) -> io::Result<Box<dyn Filesystem>> {
        Ok(Box::new(MemoryFs::new()))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// Hands every tenant its own directory under `root`.
///
/// The default tenant lives in `root/default`. Named tenants live in
/// `root/t-<sha256 of the id, hex>`, so ids of any spelling (slashes, `..`,
/// mixed case) map to distinct, safe directory names.
///
/// Each epoch gets a new directory inside the tenant's, `e<epoch>`, created
/// exclusively. Closing one epoch never touches the storage of the next, and
/// a new epoch never sees files an earlier one left behind.
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct LocalFactory {
    root: PathBuf,
    remove_on_close: bool,
}

#[cfg(feature = "native")]
impl LocalFactory {
    /// Create a factory storing tenants under `root`.
    ///
    /// With `remove_on_close`, an epoch's directory is deleted when its
    /// instance is closed. Without it the directory stays on disk, but no
    /// later instance opens it.
    pub fn new(root: impl Into<PathBuf>, remove_on_close: bool) -> Self {
        Self {
            root: root.into(),
            remove_on_close,
        }
    }

    /// Root directory holding all tenant directories.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Directory holding every epoch directory of a tenant.
    pub fn tenant_dir(&self, key: &TenantKey) -> PathBuf {
        self.root.join(Self::dir_name(key))
    }

    fn dir_name(key: &TenantKey) -> String {
        match key {
            TenantKey::Default => "default".to_string(),
            TenantKey::Tenant(id) => {
                let digest = Sha256::digest(id.as_bytes());
                format!("t-{}", hex::encode(digest))
            }
        }
    }

    /// Exclusively create a new directory for one epoch of `key`.
    ///
    /// `e<epoch>` is tried first. It can already exist when another registry
    /// (an earlier process, say) used the same root, so on collision a
    /// numeric suffix is added until an unused name is found.
    async fn create_epoch_dir(&self, key: &TenantKey, epoch: u64) -> io::Result<PathBuf> {
        let tenant_dir = self.tenant_dir(key);
        fs::create_dir_all(&tenant_dir).await?;

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("e{epoch}")
            } else {
                format!("e{epoch}.{attempt}")
            };
            let dir = tenant_dir.join(name);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(feature = "native")]
#[async_trait]
impl FilesystemFactory for LocalFactory {
    async fn create(&self, key: &TenantKey, epoch: u64) -> io::Result<Box<dyn Filesystem>> {
        let dir = self.create_epoch_dir(key, epoch).await?;
        tracing::debug!(tenant = %key, epoch, dir = %dir.display(), "opened epoch directory");
        let fs = LocalFs::open(dir, self.remove_on_close).await?;
        Ok(Box::new(fs))
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}
