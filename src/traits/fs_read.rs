//! Read operations.

use std::path::Path;

use crate::{FsError, Handle, Metadata};

/// Read operations for an archive filesystem.
///
/// Lookups follow symlinks in every path segment.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`. Methods use `&self` to allow
/// concurrent access.
///
/// # Object Safety
///
/// This trait is object-safe and can be used as `dyn FsRead`.
pub trait FsRead: Send + Sync {
    /// Open a path.
    ///
    /// Regular files (and hard links to them) give a byte-readable
    /// [`Handle::File`] with its own cursor; directories give a
    /// [`Handle::Dir`] that only lists.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist, including paths
    ///   that continue beneath a regular file
    /// - [`FsError::InvalidPath`] if the path contains `..` or is not UTF-8
    /// - [`FsError::SymlinkLoop`] if symlink resolution does not terminate
    fn open(&self, path: &Path) -> Result<Handle, FsError>;

    /// Get metadata for a path without opening it.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    fn metadata(&self, path: &Path) -> Result<Metadata, FsError>;

    /// Read entire file contents as bytes.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::NotAFile`] if the path is a directory
    /// - [`FsError::Io`] if the backing storage fails
    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError>;

    /// Read file contents as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::NotAFile`] if the path is a directory
    /// - [`FsError::InvalidData`] if the file contains invalid UTF-8
    fn read_to_string(&self, path: &Path) -> Result<String, FsError>;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Returns fewer bytes (possibly none) when the range runs past the end
    /// of the file.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::NotAFile`] if the path is a directory
    fn read_range(&self, path: &Path, offset: u64, len: usize) -> Result<Vec<u8>, FsError>;

    /// Check if a path exists.
    ///
    /// Returns `Ok(false)` for missing paths, including paths beneath a
    /// regular file. Malformed paths and symlink loops are still errors.
    fn exists(&self, path: &Path) -> Result<bool, FsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_read_is_object_safe() {
        fn _check(_: &dyn FsRead) {}
    }

    #[test]
    fn fs_read_requires_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        fn _check<T: FsRead>() {
            _assert_send_sync::<T>();
        }
        _check::<crate::TarFs>();
    }
}
