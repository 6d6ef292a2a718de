//! Directory entry types returned by `list()` and `stat()`.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Kind of directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirEntryKind {
    File,
    Directory,
}

/// A directory entry, also used for stat results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry (not full path). Empty for the root.
    pub name: String,
    /// Kind of entry.
    pub kind: DirEntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time, if available.
    pub modified: Option<SystemTime>,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DirEntryKind::Directory,
            size: 0,
            modified: None,
        }
    }

    /// Create a new file entry.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: DirEntryKind::File,
            size,
            modified: None,
        }
    }

    /// Attach a modification time.
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Returns true if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == DirEntryKind::Directory
    }

    /// Returns true if this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == DirEntryKind::File
    }
}
