//! In-memory filesystem implementation.
//!
//! Used for the default storage kind and for testing. All data is ephemeral.

use super::traits::Filesystem;
use agentfs_types::DirEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, modified: SystemTime },
    Directory { modified: SystemTime },
}

type Entries = HashMap<PathBuf, Entry>;

/// In-memory filesystem.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped or
/// released.
#[derive(Debug)]
pub struct MemoryFs {
    entries: RwLock<Entries>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Self::root_only()),
        }
    }

    fn root_only() -> Entries {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(
            PathBuf::new(),
            Entry::Directory {
                modified: SystemTime::now(),
            },
        );
        entries
    }

    /// Normalize a path: remove leading `/`, resolve `.` and `..`.
    ///
    /// `..` at the root stays at the root, so no path can name anything
    /// outside this filesystem.
    fn normalize(path: &Path) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    result.pop();
                }
                Component::Normal(s) => {
                    result.push(s);
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }
        result
    }

    /// Ensure all parent directories exist. Caller holds the write lock.
    fn ensure_parents(entries: &mut Entries, path: &Path, display: &Path) -> io::Result<()> {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            if let Component::Normal(s) = component {
                current.push(s);
                match entries.get(&current) {
                    Some(Entry::Directory { .. }) => {}
                    Some(Entry::File { .. }) => {
                        return Err(io::Error::new(
                            io::ErrorKind::NotADirectory,
                            format!("not a directory: {}", display.display()),
                        ));
                    }
                    None => {
                        entries.insert(
                            current.clone(),
                            Entry::Directory {
                                modified: SystemTime::now(),
                            },
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("not found: {}", path.display()),
        )
    }

    fn name_of(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Filesystem for MemoryFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read().await;

        match entries.get(&normalized) {
            Some(Entry::File { data, .. }) => Ok(data.clone()),
            Some(Entry::Directory { .. }) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            )),
            None => Err(Self::not_found(path)),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write().await;

        // Check we're not overwriting a directory (the root included)
        if let Some(Entry::Directory { .. }) = entries.get(&normalized) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("is a directory: {}", path.display()),
            ));
        }

        Self::ensure_parents(&mut entries, &normalized, path)?;

        entries.insert(
            normalized,
            Entry::File {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read().await;

        // Verify the path is a directory
        match entries.get(&normalized) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", path.display()),
                ));
            }
            None => return Err(Self::not_found(path)),
        }

        // Find all direct children
        let mut result: Vec<DirEntry> = entries
            .iter()
            .filter(|(entry_path, _)| {
                *entry_path != &normalized && entry_path.parent() == Some(normalized.as_path())
            })
            .map(|(entry_path, entry)| {
                let name = Self::name_of(entry_path);
                match entry {
                    Entry::File { data, modified } => {
                        DirEntry::file(name, data.len() as u64).with_modified(*modified)
                    }
                    Entry::Directory { modified } => {
                        DirEntry::directory(name).with_modified(*modified)
                    }
                }
            })
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        let normalized = Self::normalize(path);
        let entries = self.entries.read().await;
        let name = Self::name_of(&normalized);

        match entries.get(&normalized) {
            Some(Entry::File { data, modified }) => {
                Ok(DirEntry::file(name, data.len() as u64).with_modified(*modified))
            }
            Some(Entry::Directory { modified }) => {
                Ok(DirEntry::directory(name).with_modified(*modified))
            }
            None => Err(Self::not_found(path)),
        }
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        let normalized = Self::normalize(path);
        let mut entries = self.entries.write().await;

        // Check if something already exists
        if let Some(existing) = entries.get(&normalized) {
            return match existing {
                Entry::Directory { .. } => Ok(()), // Already exists, fine
                Entry::File { .. } => Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("file exists: {}", path.display()),
                )),
            };
        }

        Self::ensure_parents(&mut entries, &normalized, path)?;

        entries.insert(
            normalized,
            Entry::Directory {
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let normalized = Self::normalize(path);

        if normalized.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot remove root directory",
            ));
        }

        let mut entries = self.entries.write().await;

        // Check if it's a non-empty directory
        if let Some(Entry::Directory { .. }) = entries.get(&normalized) {
            let has_children = entries
                .keys()
                .any(|k| k.parent() == Some(normalized.as_path()));
            if has_children {
                return Err(io::Error::new(
                    io::ErrorKind::DirectoryNotEmpty,
                    format!("directory not empty: {}", path.display()),
                ));
            }
        }

        entries
            .remove(&normalized)
            .ok_or_else(|| Self::not_found(path))?;
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from_normalized = Self::normalize(from);
        let to_normalized = Self::normalize(to);

        if from_normalized.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot rename root directory",
            ));
        }
        if to_normalized.starts_with(&from_normalized) && to_normalized != from_normalized {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot move {} into itself", from.display()),
            ));
        }

        let mut entries = self.entries.write().await;

        let entry = entries
            .get(&from_normalized)
            .cloned()
            .ok_or_else(|| Self::not_found(from))?;

        // Check we're not overwriting a directory with a file or vice versa
        match (&entry, entries.get(&to_normalized)) {
            (Entry::File { .. }, Some(Entry::Directory { .. })) => {
                return Err(io::Error::new(
                    io::ErrorKind::IsADirectory,
                    format!("destination is a directory: {}", to.display()),
                ));
            }
            (Entry::Directory { .. }, Some(Entry::File { .. })) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("destination is not a directory: {}", to.display()),
                ));
            }
            _ => {}
        }

        Self::ensure_parents(&mut entries, &to_normalized, to)?;
        entries.remove(&from_normalized);

        // For directories, we need to rename all children too
        if matches!(entry, Entry::Directory { .. }) {
            let children: Vec<PathBuf> = entries
                .keys()
                .filter(|k| k.starts_with(&from_normalized))
                .cloned()
                .collect();

            for old_path in children {
                if let (Some(child), Ok(relative)) = (
                    entries.remove(&old_path),
                    old_path.strip_prefix(&from_normalized),
                ) {
                    entries.insert(to_normalized.join(relative), child);
                }
            }
        }

        entries.insert(to_normalized, entry);
        Ok(())
    }

    async fn release(&self) -> io::Result<()> {
        let mut entries = self.entries.write().await;
        *entries = Self::root_only();
        Ok(())
    }
}
