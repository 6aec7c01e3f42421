//! # Filesystem Traits
//!
//! The capability set a read-only archive filesystem offers.
//!
//! ## Component Traits
//!
//! | Trait | Operations |
//! |-------|------------|
//! | [`FsRead`] | `open`, `metadata`, `read`, `read_to_string`, `read_range`, `exists` |
//! | [`FsDir`] | `read_dir` |
//! | [`FsSub`] | `sub` |
//! | [`FsLink`] | `read_link`, `symlink_metadata` |
//!
//! [`Fs`] combines all four and has a blanket implementation: implement the
//! components and the composite comes for free.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`. Methods take `&self`, so one value can be
//! shared across threads behind a plain reference or an `Arc`.
//!
//! ## Object Safety
//!
//! [`FsRead`], [`FsDir`] and [`FsLink`] are object-safe. [`FsSub::sub`] returns
//! `Self` and is therefore only callable on sized types.
//!
//! ```rust
//! use std::path::Path;
//! use tarfs::{FsError, FsRead};
//!
//! fn manifest(fs: &dyn FsRead) -> Result<String, FsError> {
//!     fs.read_to_string(Path::new("manifest.json"))
//! }
//! ```

mod fs_dir;
mod fs_link;
mod fs_read;
mod fs_sub;

pub use fs_dir::{FsDir, ReadDirIter};
pub use fs_link::FsLink;
pub use fs_read::FsRead;
pub use fs_sub::FsSub;

/// Everything a tar-backed filesystem can do.
///
/// # Blanket Implementation
///
/// Automatically implemented for any type that implements all four
/// component traits.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use tarfs::{Fs, FsError};
///
/// // Count regular files directly under `dir`, following a symlinked `dir`.
/// fn count_files<F: Fs>(fs: &F, dir: &Path) -> Result<usize, FsError> {
///     let view = fs.sub(dir)?;
///     let mut n = 0;
///     for entry in view.read_dir(Path::new("."))? {
///         if entry?.metadata.is_file() {
///             n += 1;
///         }
///     }
///     Ok(n)
/// }
/// ```
pub trait Fs: FsRead + FsDir + FsSub + FsLink {}

impl<T: FsRead + FsDir + FsSub + FsLink> Fs for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TarFs;

    #[test]
    fn tar_fs_implements_fs() {
        fn assert_fs<T: Fs>() {}
        assert_fs::<TarFs>();
    }
}
