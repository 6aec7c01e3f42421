//! # Extension Traits
//!
//! Convenience methods layered on [`Fs`].
//!
//! ## Available Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | [`is_file`](FsExt::is_file) | Check if path is a regular file |
//! | [`is_dir`](FsExt::is_dir) | Check if path is a directory |
//! | [`is_symlink`](FsExt::is_symlink) | Check if path itself is a symlink |
//! | [`file_size`](FsExt::file_size) | Size of a file in bytes |
//! | [`walk`](FsExt::walk) | Every path beneath a directory, depth-first |
//!
//! ## JSON Support (Feature-Gated)
//!
//! With the `serde` feature enabled, `FsExtJson::read_json` deserializes a
//! member straight into a typed value.
//!
//! ```toml
//! [dependencies]
//! tarfs = { version = "0.1", features = ["serde"] }
//! ```

use crate::{DirEntry, Fs, FsError};
use std::path::Path;

/// Extension methods for any [`Fs`].
///
/// All methods have default implementations and a blanket impl, so every
/// filesystem gets them automatically.
///
/// # Example
///
/// ```rust
/// use tarfs::{Fs, FsExt, FsError};
/// use std::path::Path;
///
/// fn has_os_release<F: Fs>(fs: &F) -> Result<bool, FsError> {
///     Ok(fs.is_file(Path::new("etc/os-release"))?
///         || fs.is_file(Path::new("usr/lib/os-release"))?)
/// }
/// ```
pub trait FsExt: Fs {
    /// Check if the path resolves to a regular file.
    ///
    /// Returns `Ok(false)` if the path doesn't exist.
    fn is_file(&self, path: &Path) -> Result<bool, FsError> {
        match self.metadata(path) {
            Ok(m) => Ok(m.is_file()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path resolves to a directory.
    ///
    /// Returns `Ok(false)` if the path doesn't exist.
    fn is_dir(&self, path: &Path) -> Result<bool, FsError> {
        match self.metadata(path) {
            Ok(m) => Ok(m.is_dir()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if the path is itself a symbolic link.
    ///
    /// Uses [`symlink_metadata`](crate::FsLink::symlink_metadata), so a
    /// dangling link still counts. Returns `Ok(false)` if the path doesn't
    /// exist.
    fn is_symlink(&self, path: &Path) -> Result<bool, FsError> {
        match self.symlink_metadata(path) {
            Ok(m) => Ok(m.is_symlink()),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Get the size of a file in bytes.
    ///
    /// # Errors
    ///
    /// Returns `FsError::NotFound` if the path doesn't exist.
    fn file_size(&self, path: &Path) -> Result<u64, FsError> {
        Ok(self.metadata(path)?.size)
    }

    /// List every path beneath `dir`, depth-first, each directory's children
    /// in sorted order and a directory before its contents.
    ///
    /// Symlinked directories are reported but not descended into.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if `dir` does not exist
    /// - [`FsError::NotADirectory`] if `dir` is not a directory
    ///
    /// # Example
    ///
    /// ```rust
    /// use tarfs::{Fs, FsExt, FsError};
    /// use std::path::Path;
    ///
    /// fn total_bytes<F: Fs>(fs: &F) -> Result<u64, FsError> {
    ///     Ok(fs
    ///         .walk(Path::new("."))?
    ///         .iter()
    ///         .filter(|e| e.metadata.is_file())
    ///         .map(|e| e.metadata.size)
    ///         .sum())
    /// }
    /// ```
    fn walk(&self, dir: &Path) -> Result<Vec<DirEntry>, FsError> {
        let mut out = Vec::new();
        let mut stack: Vec<DirEntry> = self.read_dir(dir)?.collect_all()?;
        stack.reverse();
        while let Some(entry) = stack.pop() {
            if entry.is_dir() {
                let mut children = self.read_dir(&entry.path)?.collect_all()?;
                children.reverse();
                stack.extend(children);
            }
            out.push(entry);
        }
        Ok(out)
    }
}

impl<B: Fs + ?Sized> FsExt for B {}

#[cfg(feature = "serde")]
mod json {
    use super::*;
    use serde::de::DeserializeOwned;

    /// JSON deserialization extension methods.
    ///
    /// Available when the `serde` feature is enabled.
    pub trait FsExtJson: Fs {
        /// Read a file and deserialize it as JSON.
        ///
        /// # Errors
        ///
        /// - `FsError::NotFound` if the file doesn't exist
        /// - `FsError::InvalidData` if the file isn't valid UTF-8 or valid JSON
        ///
        /// # Example
        ///
        /// ```rust
        /// use tarfs::{Fs, FsError};
        /// #[cfg(feature = "serde")]
        /// use tarfs::FsExtJson;
        /// use std::path::Path;
        ///
        /// #[cfg(feature = "serde")]
        /// fn load_manifest<F: Fs>(fs: &F) -> Result<serde_json::Value, FsError> {
        ///     fs.read_json(Path::new("manifest.json"))
        /// }
        /// ```
        fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, FsError> {
            let data = self.read_to_string(path)?;
            serde_json::from_str(&data).map_err(|e| FsError::InvalidData {
                path: path.to_path_buf(),
                details: e.to_string(),
            })
        }
    }

    impl<B: Fs + ?Sized> FsExtJson for B {}
}

#[cfg(feature = "serde")]
pub use json::FsExtJson;
