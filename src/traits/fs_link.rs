//! Symlink inspection.

use std::path::{Path, PathBuf};

use crate::{FsError, Metadata};

/// Symlink inspection without following.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`. Methods use `&self` to allow
/// concurrent access.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FsLink`.
pub trait FsLink: Send + Sync {
    /// Read the target of a symbolic link.
    ///
    /// Returns the raw target as stored in the archive (not canonicalized).
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    /// - [`FsError::InvalidData`] if `path` is not a symlink
    fn read_link(&self, path: &Path) -> Result<PathBuf, FsError>;

    /// Get metadata without following a final symlink.
    ///
    /// Unlike [`FsRead::metadata`](super::FsRead::metadata), if `path` is a
    /// symlink this returns the symlink's own metadata.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `path` does not exist
    fn symlink_metadata(&self, path: &Path) -> Result<Metadata, FsError>;
}
