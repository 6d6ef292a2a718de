//! Local filesystem backend.
//!
//! Stores one tenant's files under a real directory. Used when storage is
//! configured as `kind = "local"`.

use super::traits::Filesystem;
use agentfs_types::DirEntry;
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/var/lib/agentfs/tenants/default/e1`, then `read("workspace/test.sql")` reads
/// `/var/lib/agentfs/tenants/default/e1/workspace/test.sql`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    remove_on_release: bool,
}

impl LocalFs {
    /// Open a local filesystem rooted at the given path, creating the
    /// directory if needed.
    pub async fn open(root: impl Into<PathBuf>, remove_on_release: bool) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            remove_on_release,
        })
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path within the root.
    ///
    /// `.` and `..` are resolved lexically and `..` stops at the root, so the
    /// result is always inside the tenant directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    relative.pop();
                }
                Component::Normal(c) => relative.push(c),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        self.root.join(relative)
    }

    fn entry_from_metadata(name: String, meta: &std::fs::Metadata) -> DirEntry {
        let entry = if meta.is_dir() {
            DirEntry::directory(name)
        } else {
            DirEntry::file(name, meta.len())
        };
        match meta.modified() {
            Ok(modified) => entry.with_modified(modified),
            Err(_) => entry,
        }
    }

    fn name_of(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let full_path = self.resolve(path);
        if fs::metadata(&full_path).await?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            ));
        }
        fs::read(&full_path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full_path = self.resolve(path);
        if full_path == self.root {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                "is a directory: /",
            ));
        }

        // Ensure parent directory exists
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(&full_path, data).await
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let full_path = self.resolve(path);
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::entry_from_metadata(name, &metadata));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        let full_path = self.resolve(path);
        let metadata = fs::metadata(&full_path).await?;
        let name = if full_path == self.root {
            String::new()
        } else {
            Self::name_of(&full_path)
        };
        Ok(Self::entry_from_metadata(name, &metadata))
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        let full_path = self.resolve(path);
        fs::create_dir_all(&full_path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let full_path = self.resolve(path);
        if full_path == self.root {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot remove root directory",
            ));
        }

        let meta = fs::metadata(&full_path).await?;
        if meta.is_dir() {
            fs::remove_dir(&full_path).await
        } else {
            fs::remove_file(&full_path).await
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from_path = self.resolve(from);
        let to_path = self.resolve(to);

        if from_path == self.root {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot rename root directory",
            ));
        }

        // Ensure parent directory exists for destination
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&from_path, &to_path).await
    }

    async fn release(&self) -> io::Result<()> {
        if !self.remove_on_release {
            return Ok(());
        }
        match fs::remove_dir_all(&self.root).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("tenants").join("default");
        let fs = LocalFs::open(&root, false).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(fs.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp = tempdir().unwrap();
        let fs = LocalFs::open(temp.path(), false).await.unwrap();

        fs.write(Path::new("/workspace/test.sql"), b"SELECT 1")
            .await
            .unwrap();
        let data = fs.read(Path::new("workspace/test.sql")).await.unwrap();
        assert_eq!(data, b"SELECT 1");
        assert!(temp.path().join("workspace").join("test.sql").is_file());
    }

    #[tokio::test]
    async fn test_read_directory_fails() {
        let temp = tempdir().unwrap();
        let fs = LocalFs::open(temp.path(), false).await.unwrap();
        fs.mkdir(Path::new("dir")).await.unwrap();

        let err = fs.read(Path::new("dir")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }

    #[tokio::test]
    async fn test_parent_dir_cannot_escape_root() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("inner");
        let fs = LocalFs::open(&root, false).await.unwrap();

        fs.write(Path::new("../../escaped.txt"), b"x").await.unwrap();
        assert!(root.join("escaped.txt").is_file());
        assert!(!temp.path().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn test_list_and_stat() {
        let temp = tempdir().unwrap();
        let fs = LocalFs::open(temp.path(), false).await.unwrap();
        fs.write(Path::new("b.txt"), b"bb").await.unwrap();
        fs.write(Path::new("a.txt"), b"a").await.unwrap();
        fs.mkdir(Path::new("sub")).await.unwrap();

        let entries = fs.list(Path::new("/")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);

        let meta = fs.stat(Path::new("b.txt")).await.unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, 2);
        assert!(fs.stat(Path::new("/")).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_remove_file_and_empty_dir() {
        let temp = tempdir().unwrap();
        let fs = LocalFs::open(temp.path(), false).await.unwrap();
        fs.write(Path::new("d/f.txt"), b"x").await.unwrap();

        assert!(fs.remove(Path::new("d")).await.is_err());
        fs.remove(Path::new("d/f.txt")).await.unwrap();
        fs.remove(Path::new("d")).await.unwrap();
        assert!(!fs.exists(Path::new("d")).await);
    }

    #[tokio::test]
    async fn test_release_removes_root_when_asked() {
        let temp = tempdir().unwrap();
        let kept = temp.path().join("kept");
        let dropped = temp.path().join("dropped");

        let fs = LocalFs::open(&kept, false).await.unwrap();
        fs.write(Path::new("f"), b"x").await.unwrap();
        fs.release().await.unwrap();
        assert!(kept.join("f").is_file());

        let fs = LocalFs::open(&dropped, true).await.unwrap();
        fs.write(Path::new("f"), b"x").await.unwrap();
        fs.release().await.unwrap();
        assert!(!dropped.exists());
    }
}
