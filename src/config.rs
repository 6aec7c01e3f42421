//! Construction limits.

/// Bounds applied while scanning and resolving paths.
///
/// The defaults match what common tar readers accept.
///
/// ```rust
/// use tarfs::Limits;
///
/// let limits = Limits {
///     max_symlink_hops: 8,
///     ..Limits::default()
/// };
/// assert_eq!(limits.max_extended_header_size, 1 << 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Largest GNU long-name/long-link or PAX header payload accepted, in bytes.
    pub max_extended_header_size: u64,
    /// Maximum number of symlinks followed while resolving one path.
    pub max_symlink_hops: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_extended_header_size: 1 << 20,
            max_symlink_hops: 40,
        }
    }
}
