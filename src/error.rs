//! Error types for the tar filesystem.

use std::io;
use std::path::PathBuf;

/// Filesystem error type with contextual variants.
///
/// Construction failures are always [`FsError::Format`] (or [`FsError::Io`] if
/// the backing storage itself fails); lookup failures carry the path that was
/// asked for. Uses `#[non_exhaustive]` for forward compatibility.
///
/// # Examples
///
/// ```rust
/// use tarfs::FsError;
/// use std::path::PathBuf;
///
/// let err = FsError::NotFound { path: PathBuf::from("etc/os-release") };
/// assert_eq!(err.to_string(), "not found: etc/os-release");
/// ```
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    // Construction Errors
    /// The archive is not a valid tar stream.
    ///
    /// Bad checksums, truncated blocks, payloads running past the end of the
    /// stream and unresolvable hard links all land here.
    #[error("malformed archive at byte {offset}: {details}")]
    Format {
        /// Byte offset of the header that failed to decode.
        offset: u64,
        /// What was wrong with it.
        details: String,
    },

    // Path/File Errors
    /// Path does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Expected a file but found something else.
    #[error("not a file: {path}")]
    NotAFile {
        /// The path that is not a file.
        path: PathBuf,
    },

    /// Expected a directory but found something else.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The path that is not a directory.
        path: PathBuf,
    },

    /// The path cannot be looked up (parent segments, non-UTF-8 bytes).
    #[error("invalid path: {path} ({reason})")]
    InvalidPath {
        /// The offending path.
        path: PathBuf,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The entry exists but its content is not what was asked for
    /// (non-UTF-8 text, `read_link` on a non-symlink).
    #[error("invalid data: {path} ({details})")]
    InvalidData {
        /// The path with invalid data.
        path: PathBuf,
        /// Details about the invalid data.
        details: String,
    },

    /// Too many symlinks were followed while resolving a path.
    #[error("too many levels of symbolic links: {path}")]
    SymlinkLoop {
        /// The path being resolved.
        path: PathBuf,
    },

    /// The handle was already closed.
    #[error("file already closed: {path}")]
    Closed {
        /// The path the handle was opened on.
        path: PathBuf,
    },

    // Backend Errors
    /// I/O error with context.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        operation: &'static str,
        /// The path involved in the operation.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub(crate) fn format(offset: u64, details: impl Into<String>) -> Self {
        FsError::Format {
            offset,
            details: details.into(),
        }
    }

    /// The closest [`io::ErrorKind`] for this error.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::Format { .. } => io::ErrorKind::InvalidData,
            FsError::NotFound { .. } => io::ErrorKind::NotFound,
            FsError::NotAFile { .. } => io::ErrorKind::IsADirectory,
            FsError::NotADirectory { .. } => io::ErrorKind::NotADirectory,
            FsError::InvalidPath { .. } => io::ErrorKind::InvalidInput,
            FsError::InvalidData { .. } => io::ErrorKind::InvalidData,
            FsError::SymlinkLoop { .. } => io::ErrorKind::Other,
            FsError::Closed { .. } => io::ErrorKind::Other,
            FsError::Io { source, .. } => source.kind(),
        }
    }
}

impl From<io::Error> for FsError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                path: PathBuf::new(),
            },
            _ => FsError::Io {
                operation: "io",
                path: PathBuf::new(),
                source: error,
            },
        }
    }
}

impl From<FsError> for io::Error {
    fn from(error: FsError) -> Self {
        match error {
            FsError::Io { source, .. } => source,
            other => io::Error::new(other.kind(), other),
        }
    }
}
