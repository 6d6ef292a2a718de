//! Error types shared by every agentfs layer.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type for agentfs operations.
pub type Result<T> = std::result::Result<T, AgentFsError>;

/// Errors surfaced by the registry and by filesystem handles.
///
/// `Clone` so one construction failure can be handed to every task that was
/// waiting on the same build.
#[derive(Debug, Clone, Error)]
pub enum AgentFsError {
    #[error("failed to construct filesystem for tenant {key}: {message}")]
    ConstructionFailed { key: String, message: String },
    #[error("not found: {path}")]
    NotFound { path: String },
    #[error("filesystem for tenant {key} is closed")]
    Closed { key: String },
    #[error("not writable: {path}: {reason}")]
    NotWritable { path: String, reason: String },
    #[error("is a directory: {path}")]
    IsADirectory { path: String },
    #[error("not a directory: {path}")]
    NotADirectory { path: String },
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: String },
    #[error("invalid tenant key {key:?}: {reason}")]
    InvalidTenantKey { key: String, reason: String },
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("cannot decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to release filesystem for tenant {key}: {message}")]
    ReleaseFailed { key: String, message: String },
    #[error("teardown failed for {} instance(s): {}", failures.len(), TeardownFailures(failures))]
    TeardownPartialFailure { failures: Vec<TeardownFailure> },
}

/// One instance that could not be released during `close_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// Display form of the tenant key.
    pub key: String,
    /// What went wrong.
    pub message: String,
}

struct TeardownFailures<'a>(&'a [TeardownFailure]);

impl fmt::Display for TeardownFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", failure.key, failure.message)?;
        }
        Ok(())
    }
}

impl AgentFsError {
    /// Map a backend I/O error on a read-side operation.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        let path = path.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => AgentFsError::NotFound { path },
            io::ErrorKind::IsADirectory => AgentFsError::IsADirectory { path },
            io::ErrorKind::NotADirectory => AgentFsError::NotADirectory { path },
            io::ErrorKind::DirectoryNotEmpty => AgentFsError::DirectoryNotEmpty { path },
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                AgentFsError::NotWritable {
                    path,
                    reason: err.to_string(),
                }
            }
            io::ErrorKind::InvalidData => AgentFsError::Decode {
                path,
                message: err.to_string(),
            },
            _ => AgentFsError::Io {
                path,
                message: err.to_string(),
            },
        }
    }

    /// Map a backend I/O error on a write-side operation.
    ///
    /// Writing over a directory, or underneath a file, is reported as
    /// `NotWritable` rather than as a shape error.
    pub fn from_io_write(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::IsADirectory
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::AlreadyExists => AgentFsError::NotWritable {
                path: path.to_string(),
                reason: err.to_string(),
            },
            _ => Self::from_io(err, path),
        }
    }

    /// Fill in the path on errors produced before a path was known.
    pub fn with_path(self, path: &str) -> Self {
        match self {
            AgentFsError::Decode { message, .. } => AgentFsError::Decode {
                path: path.to_string(),
                message,
            },
            other => other,
        }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentFsError::NotFound { .. })
    }

    /// Returns true for `Closed`.
    pub fn is_closed(&self) -> bool {
        matches!(self, AgentFsError::Closed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_variants() {
        let err = AgentFsError::from_io(io::Error::from(io::ErrorKind::NotFound), "/a");
        assert!(err.is_not_found());

        let err = AgentFsError::from_io(io::Error::from(io::ErrorKind::IsADirectory), "/a");
        assert!(matches!(err, AgentFsError::IsADirectory { .. }));

        let err = AgentFsError::from_io(io::Error::other("disk on fire"), "/a");
        assert!(matches!(err, AgentFsError::Io { ref message, .. } if message.contains("disk on fire")));
    }

    #[test]
    fn write_side_shape_errors_are_not_writable() {
        let err = AgentFsError::from_io_write(io::Error::from(io::ErrorKind::IsADirectory), "/dir");
        assert!(matches!(err, AgentFsError::NotWritable { ref path, .. } if path == "/dir"));

        let err = AgentFsError::from_io_write(io::Error::from(io::ErrorKind::NotFound), "/x");
        assert!(err.is_not_found());
    }

    #[test]
    fn teardown_failure_lists_every_key() {
        let err = AgentFsError::TeardownPartialFailure {
            failures: vec![
                TeardownFailure {
                    key: "user-1".into(),
                    message: "busy".into(),
                },
                TeardownFailure {
                    key: "user-2".into(),
                    message: "gone".into(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("2 instance(s)"));
        assert!(text.contains("user-1: busy"));
        assert!(text.contains("user-2: gone"));
    }

    #[test]
    fn with_path_fills_decode_errors_only() {
        let err = AgentFsError::Decode {
            path: String::new(),
            message: "bad".into(),
        }
        .with_path("/f.txt");
        assert!(matches!(err, AgentFsError::Decode { ref path, .. } if path == "/f.txt"));

        let err = AgentFsError::UnsupportedEncoding("x".into()).with_path("/f.txt");
        assert!(matches!(err, AgentFsError::UnsupportedEncoding(_)));
    }
}
