//! A tenant's filesystem handle.
//!
//! [`VirtualFilesystem`] wraps one backend and is the only thing callers ever
//! hold. It maps backend I/O errors into [`AgentFsError`] and turns every
//! operation after [`close`](VirtualFilesystem::close) into `Closed`.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use agentfs_types::{AgentFsError, DirEntry, Encoding, Result, TenantKey};
use tokio::sync::RwLock;

use crate::vfs::Filesystem;

/// One tenant's isolated file tree.
///
/// Operations share the backend through a read lock; `close` takes the write
/// lock, so it waits for in-flight operations and nothing runs on a released
/// backend.
pub struct VirtualFilesystem {
    key: TenantKey,
    epoch: u64,
    backend: RwLock<Option<Box<dyn Filesystem>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for VirtualFilesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualFilesystem")
            .field("key", &self.key)
            .field("epoch", &self.epoch)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl VirtualFilesystem {
    /// Wrap a freshly constructed backend.
    pub fn new(key: TenantKey, epoch: u64, backend: Box<dyn Filesystem>) -> Self {
        Self {
            key,
            epoch,
            backend: RwLock::new(Some(backend)),
            closed: AtomicBool::new(false),
        }
    }

    /// The tenant this instance belongs to.
    pub fn key(&self) -> &TenantKey {
        &self.key
    }

    /// Construction number assigned by the registry.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns true once the backend has been released.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> AgentFsError {
        AgentFsError::Closed {
            key: self.key.to_string(),
        }
    }

    /// Create or overwrite the file at `path`.
    pub async fn write_file(&self, path: &str, data: impl AsRef<[u8]>) -> Result<()> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.write(Path::new(path), data.as_ref())
            .await
            .map_err(|e| AgentFsError::from_io_write(e, path))
    }

    /// Write text, converting it to bytes per `encoding`.
    pub async fn write_file_encoded(
        &self,
        path: &str,
        text: &str,
        encoding: Encoding,
    ) -> Result<()> {
        let bytes = encoding.decode(text).map_err(|e| e.with_path(path))?;
        self.write_file(path, bytes).await
    }

    /// Return the exact bytes last written at `path`.
    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.read(Path::new(path))
            .await
            .map_err(|e| AgentFsError::from_io(e, path))
    }

    /// Read a file and render it as text per `encoding`.
    pub async fn read_file_encoded(&self, path: &str, encoding: Encoding) -> Result<String> {
        let bytes = self.read_file(path).await?;
        encoding.encode(bytes).map_err(|e| e.with_path(path))
    }

    /// Read a file as UTF-8 text.
    pub async fn read_to_string(&self, path: &str) -> Result<String> {
        self.read_file_encoded(path, Encoding::Utf8).await
    }

    /// Remove a file or empty directory.
    pub async fn remove(&self, path: &str) -> Result<()> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.remove(Path::new(path))
            .await
            .map_err(|e| AgentFsError::from_io(e, path))
    }

    /// Check whether anything exists at `path`.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        Ok(fs.exists(Path::new(path)).await)
    }

    /// List a directory, sorted by name.
    pub async fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.list(Path::new(path))
            .await
            .map_err(|e| AgentFsError::from_io(e, path))
    }

    /// Metadata for a file or directory.
    pub async fn stat(&self, path: &str) -> Result<DirEntry> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.stat(Path::new(path))
            .await
            .map_err(|e| AgentFsError::from_io(e, path))
    }

    /// Create a directory and any missing parents.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.mkdir(Path::new(path))
            .await
            .map_err(|e| AgentFsError::from_io_write(e, path))
    }

    /// Move a file or directory.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let guard = self.backend.read().await;
        let fs = guard.as_ref().ok_or_else(|| self.closed_error())?;
        fs.rename(Path::new(from), Path::new(to))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AgentFsError::from_io(e, from),
                _ => AgentFsError::from_io_write(e, to),
            })
    }

    /// Release the backend.
    ///
    /// Idempotent: closing an already-closed instance is a no-op. The
    /// instance counts as closed even when the release itself fails.
    #[tracing::instrument(level = "debug", skip(self), fields(tenant = %self.key, epoch = self.epoch))]
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.backend.write().await;
        let Some(fs) = guard.take() else {
            return Ok(());
        };
        self.closed.store(true, Ordering::Release);

        match fs.release().await {
            Ok(()) => {
                tracing::info!(tenant = %self.key, epoch = self.epoch, "filesystem closed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(tenant = %self.key, epoch = self.epoch, error = %e, "filesystem release failed");
                Err(AgentFsError::ReleaseFailed {
                    key: self.key.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;

    fn memory_instance(key: TenantKey) -> VirtualFilesystem {
        VirtualFilesystem::new(key, 0, Box::new(MemoryFs::new()))
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let fs = memory_instance(TenantKey::Default);
        fs.write_file("/workspace/test.sql", "SELECT * FROM test_table")
            .await
            .unwrap();

        let text = fs
            .read_file_encoded("/workspace/test.sql", "utf-8".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(text, "SELECT * FROM test_table");
    }

    #[tokio::test]
    async fn binary_content_is_preserved() {
        let fs = memory_instance(TenantKey::Default);
        let data: Vec<u8> = (0..=255).collect();
        fs.write_file("blob.bin", &data).await.unwrap();
        assert_eq!(fs.read_file("blob.bin").await.unwrap(), data);
    }

    #[tokio::test]
    async fn base64_write_stores_decoded_bytes() {
        let fs = memory_instance(TenantKey::Default);
        fs.write_file_encoded("img.png", "iVBORw==", Encoding::Base64)
            .await
            .unwrap();
        assert_eq!(
            fs.read_file("img.png").await.unwrap(),
            vec![0x89, 0x50, 0x4e, 0x47]
        );
        assert_eq!(
            fs.read_file_encoded("img.png", Encoding::Base64).await.unwrap(),
            "iVBORw=="
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let fs = memory_instance(TenantKey::Default);
        let err = fs.read_file("/nope.txt").await.unwrap_err();
        assert!(matches!(err, AgentFsError::NotFound { ref path } if path == "/nope.txt"));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error_with_path() {
        let fs = memory_instance(TenantKey::Default);
        fs.write_file("bin", [0xffu8, 0x00]).await.unwrap();
        let err = fs.read_to_string("bin").await.unwrap_err();
        assert!(matches!(err, AgentFsError::Decode { ref path, .. } if path == "bin"));
    }

    #[tokio::test]
    async fn writing_over_a_directory_is_not_writable() {
        let fs = memory_instance(TenantKey::Default);
        fs.mkdir("/out").await.unwrap();
        let err = fs.write_file("/out", "x").await.unwrap_err();
        assert!(matches!(err, AgentFsError::NotWritable { .. }));
    }

    #[tokio::test]
    async fn remove_exists_list_stat() {
        let fs = memory_instance(TenantKey::tenant("user-1").unwrap());
        fs.write_file("/dir/a.txt", "a").await.unwrap();
        fs.write_file("/dir/b.txt", "bb").await.unwrap();

        assert!(fs.exists("/dir/a.txt").await.unwrap());
        let names: Vec<_> = fs
            .list("/dir")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(fs.stat("/dir/b.txt").await.unwrap().size, 2);

        let err = fs.remove("/dir").await.unwrap_err();
        assert!(matches!(err, AgentFsError::DirectoryNotEmpty { .. }));

        fs.remove("/dir/a.txt").await.unwrap();
        assert!(!fs.exists("/dir/a.txt").await.unwrap());
        assert!(fs.remove("/dir/a.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rename_moves_content() {
        let fs = memory_instance(TenantKey::Default);
        fs.write_file("draft.md", "body").await.unwrap();
        fs.rename("draft.md", "final/report.md").await.unwrap();

        assert_eq!(fs.read_to_string("final/report.md").await.unwrap(), "body");
        assert!(!fs.exists("draft.md").await.unwrap());
        assert!(fs.rename("draft.md", "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn every_operation_fails_after_close() {
        let fs = memory_instance(TenantKey::tenant("user-1").unwrap());
        fs.write_file("f", "x").await.unwrap();
        fs.close().await.unwrap();
        assert!(fs.is_closed());

        assert!(fs.read_file("f").await.unwrap_err().is_closed());
        assert!(fs.write_file("f", "y").await.unwrap_err().is_closed());
        assert!(fs.exists("f").await.unwrap_err().is_closed());
        assert!(fs.list("/").await.unwrap_err().is_closed());
        assert!(fs.stat("f").await.unwrap_err().is_closed());
        assert!(fs.mkdir("d").await.unwrap_err().is_closed());
        assert!(fs.remove("f").await.unwrap_err().is_closed());
        assert!(fs.rename("f", "g").await.unwrap_err().is_closed());

        let err = fs.read_file("f").await.unwrap_err();
        assert!(matches!(err, AgentFsError::Closed { ref key } if key == "user-1"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let fs = memory_instance(TenantKey::Default);
        fs.close().await.unwrap();
        fs.close().await.unwrap();
        assert!(fs.is_closed());
    }
}
