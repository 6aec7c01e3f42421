//! Rooted sub-views.

use std::path::Path;

use crate::FsError;

/// Re-rooting a filesystem at one of its directories.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`.
pub trait FsSub: Send + Sync {
    /// A view of the same filesystem rooted at `path`.
    ///
    /// The view shares everything with `self`; only lookups change, each
    /// one being resolved as `path/<lookup>`. `sub(".")` is equivalent to
    /// `self`.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotFound`] if the path does not exist
    /// - [`FsError::NotADirectory`] if the path is not a directory
    fn sub(&self, path: &Path) -> Result<Self, FsError>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_sub_requires_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        fn _check<T: FsSub>() {
            _assert_send_sync::<T>();
        }
        _check::<crate::TarFs>();
    }
}
