//! # Filesystem Façade
//!
//! [`TarFs`] answers path lookups against the index and hands out
//! handles that read straight from the backing storage.
//!
//! ## Construction
//!
//! Building a `TarFs` scans the whole stream once and indexes every member.
//! After that the index never changes: every lookup is a hash-map probe and
//! every read is a positioned read. Nothing is cached.
//!
//! ## Views
//!
//! [`FsSub::sub`] returns a view rooted at a directory. It shares the index
//! and storage with its parent through an `Arc` and only differs in the
//! prefix it joins onto incoming paths. A symlink that resolves outside the
//! view's root is reported as not found.
//!
//! ## Paths
//!
//! Lookup paths are `/`-separated and relative to the view's root. Leading
//! `/` and `./`, repeated separators and `.` segments are ignored; `..` is
//! rejected with [`FsError::InvalidPath`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::file::{Dir, File, Handle};
use crate::index::{Entry, EntryKind, Index, LookupError, ROOT, join, normalize};
use crate::scan::scan;
use crate::storage::ReadAt;
use crate::{
    DirEntry, FsDir, FsError, FsLink, FsRead, FsSub, Limits, Metadata, ReadDirIter,
};

struct Shared {
    index: Index,
    storage: Arc<dyn ReadAt>,
    limits: Limits,
}

/// Read-only filesystem over a tar stream.
///
/// Cheap to clone; clones and sub-views share one index and one storage.
/// `TarFs` is `Send + Sync` and every method takes `&self`, so one value can
/// serve any number of threads.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use tarfs::{FsDir, FsRead, FsSub, TarFs};
///
/// # fn archive() -> Vec<u8> {
/// #     let mut b = tar::Builder::new(Vec::new());
/// #     for (name, data) in [("a/b.txt", &b"hi"[..]), ("a/.gitignore", &b"*.tar"[..])] {
/// #         let mut h = tar::Header::new_ustar();
/// #         h.set_size(data.len() as u64);
/// #         h.set_mode(0o644);
/// #         h.set_cksum();
/// #         b.append_data(&mut h, name, data).unwrap();
/// #     }
/// #     b.into_inner().unwrap()
/// # }
/// let fs = TarFs::new(archive())?;
///
/// assert_eq!(fs.read(Path::new("a/b.txt"))?, b"hi");
/// assert!(fs.metadata(Path::new("a"))?.is_dir());
///
/// let names: Vec<String> = fs
///     .read_dir(Path::new("a"))?
///     .map(|e| e.map(|e| e.name))
///     .collect::<Result<_, _>>()?;
/// assert_eq!(names, [".gitignore", "b.txt"]);
///
/// let a = fs.sub(Path::new("a"))?;
/// assert_eq!(a.read(Path::new("b.txt"))?, b"hi");
/// # Ok::<(), tarfs::FsError>(())
/// ```
#[derive(Clone)]
pub struct TarFs {
    shared: Arc<Shared>,
    root: String,
}

impl TarFs {
    /// Index `storage` with default [`Limits`].
    ///
    /// # Errors
    ///
    /// - [`FsError::Format`] if the stream is not a well-formed tar archive
    /// - [`FsError::Io`] if the storage cannot be read
    pub fn new<R: ReadAt + 'static>(storage: R) -> Result<Self, FsError> {
        Self::with_limits(storage, Limits::default())
    }

    /// Index `storage` with explicit limits.
    ///
    /// # Errors
    ///
    /// Same as [`TarFs::new`].
    pub fn with_limits<R: ReadAt + 'static>(storage: R, limits: Limits) -> Result<Self, FsError> {
        Self::from_storage(Arc::new(storage), limits)
    }

    /// Index storage that is already shared.
    ///
    /// Handy when the caller keeps its own reference, for example to
    /// [`close`](crate::LockedReader::close) a [`LockedReader`](crate::LockedReader)
    /// once it is done with the filesystem.
    ///
    /// # Errors
    ///
    /// Same as [`TarFs::new`].
    pub fn from_storage(storage: Arc<dyn ReadAt>, limits: Limits) -> Result<Self, FsError> {
        let members = scan(storage.as_ref(), &limits)?;
        let index = Index::build(members)?;
        Ok(Self {
            shared: Arc::new(Shared {
                index,
                storage,
                limits,
            }),
            root: ROOT.to_owned(),
        })
    }

    /// Number of indexed paths, counting the root and synthesized directories.
    ///
    /// The count covers the whole archive, not just this view.
    pub fn len(&self) -> usize {
        self.shared.index.len()
    }

    /// Returns `true` if the archive has no members (only the root exists).
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// The limits this filesystem was built with.
    pub fn limits(&self) -> &Limits {
        &self.shared.limits
    }

    /// Normalize a lookup path.
    ///
    /// Returns the path relative to this view and the full index key.
    fn locate(&self, path: &Path) -> Result<(String, String), FsError> {
        let invalid = |reason| FsError::InvalidPath {
            path: path.to_path_buf(),
            reason,
        };
        let text = path.to_str().ok_or_else(|| invalid("not valid UTF-8"))?;
        let rel = normalize(text).map_err(invalid)?;
        let full = if self.root == ROOT {
            rel.clone()
        } else if rel == ROOT {
            self.root.clone()
        } else {
            join(&self.root, &rel)
        };
        Ok((rel, full))
    }

    fn lookup(&self, path: &Path, follow_last: bool) -> Result<(String, &Entry), FsError> {
        let (rel, full) = self.locate(path)?;
        let entry = self
            .shared
            .index
            .resolve(&full, follow_last, self.shared.limits.max_symlink_hops)
            .map_err(|e| lookup_error(e, path))?;
        if !self.contains(&entry.path) {
            return Err(FsError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Ok((rel, entry))
    }

    fn contains(&self, key: &str) -> bool {
        self.root == ROOT
            || key == self.root
            || key
                .strip_prefix(self.root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Listing of a resolved directory; entry paths are relative to this view.
    fn listing(&self, rel: &str, dir: &Entry) -> Vec<DirEntry> {
        let index = &self.shared.index;
        index
            .children(&dir.path)
            .unwrap_or_default()
            .iter()
            .filter_map(|name| {
                let child = index.get(&join(&dir.path, name))?;
                Some(DirEntry {
                    name: name.clone(),
                    path: PathBuf::from(join(rel, name)),
                    metadata: child.metadata(),
                })
            })
            .collect()
    }

    /// Read `len` bytes of a file entry starting at `offset`, clamped to its size.
    fn read_entry(&self, path: &Path, entry: &Entry, offset: u64, len: usize) -> Result<Vec<u8>, FsError> {
        if !entry.has_data() {
            return Err(FsError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        if offset >= entry.size {
            return Ok(Vec::new());
        }
        let available = entry.size - offset;
        let want = usize::try_from(available).map_or(len, |a| a.min(len));
        let mut buf = vec![0u8; want];
        self.shared
            .storage
            .read_exact_at(&mut buf, entry.data_offset + offset)
            .map_err(|source| FsError::Io {
                operation: "read",
                path: path.to_path_buf(),
                source,
            })?;
        Ok(buf)
    }
}

fn lookup_error(error: LookupError, path: &Path) -> FsError {
    let path = path.to_path_buf();
    match error {
        LookupError::NotFound => FsError::NotFound { path },
        LookupError::SymlinkLoop => FsError::SymlinkLoop { path },
    }
}

impl std::fmt::Debug for TarFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarFs")
            .field("root", &self.root)
            .field("entries", &self.shared.index.len())
            .field("limits", &self.shared.limits)
            .finish()
    }
}

impl FsRead for TarFs {
    fn open(&self, path: &Path) -> Result<Handle, FsError> {
        let (rel, entry) = self.lookup(path, true)?;
        match entry.kind {
            EntryKind::Directory => Ok(Handle::Dir(Dir::new(
                path.to_path_buf(),
                entry.metadata(),
                self.listing(&rel, entry),
            ))),
            EntryKind::File | EntryKind::HardLink => Ok(Handle::File(File::new(
                Arc::clone(&self.shared.storage),
                path.to_path_buf(),
                entry.metadata(),
                entry.data_offset,
                entry.size,
            ))),
            EntryKind::Symlink | EntryKind::Other => Err(FsError::NotAFile {
                path: path.to_path_buf(),
            }),
        }
    }

    fn metadata(&self, path: &Path) -> Result<Metadata, FsError> {
        let (_, entry) = self.lookup(path, true)?;
        Ok(entry.metadata())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, FsError> {
        let (_, entry) = self.lookup(path, true)?;
        self.read_entry(path, entry, 0, usize::MAX)
    }

    fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        String::from_utf8(self.read(path)?).map_err(|e| FsError::InvalidData {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    fn read_range(&self, path: &Path, offset: u64, len: usize) -> Result<Vec<u8>, FsError> {
        let (_, entry) = self.lookup(path, true)?;
        self.read_entry(path, entry, offset, len)
    }

    fn exists(&self, path: &Path) -> Result<bool, FsError> {
        match self.lookup(path, true) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl FsDir for TarFs {
    fn read_dir(&self, path: &Path) -> Result<ReadDirIter, FsError> {
        let (rel, entry) = self.lookup(path, true)?;
        if entry.kind != EntryKind::Directory {
            return Err(FsError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        let entries = self.listing(&rel, entry).into_iter().map(Ok).collect();
        Ok(ReadDirIter::from_vec(entries))
    }
}

impl FsSub for TarFs {
    fn sub(&self, path: &Path) -> Result<Self, FsError> {
        let (_, entry) = self.lookup(path, true)?;
        if entry.kind != EntryKind::Directory {
            return Err(FsError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        tracing::trace!(root = %entry.path, "sub view");
        Ok(Self {
            shared: Arc::clone(&self.shared),
            root: entry.path.clone(),
        })
    }
}

impl FsLink for TarFs {
    fn read_link(&self, path: &Path) -> Result<PathBuf, FsError> {
        let (_, entry) = self.lookup(path, false)?;
        match (&entry.kind, &entry.link_target) {
            (EntryKind::Symlink, Some(target)) => Ok(PathBuf::from(target)),
            _ => Err(FsError::InvalidData {
                path: path.to_path_buf(),
                details: "not a symbolic link".into(),
            }),
        }
    }

    fn symlink_metadata(&self, path: &Path) -> Result<Metadata, FsError> {
        let (_, entry) = self.lookup(path, false)?;
        Ok(entry.metadata())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileType;
    use crate::scan::tests::RawTar;
    use std::io::{Read, Seek, SeekFrom};

    fn fs(tar: RawTar) -> TarFs {
        TarFs::new(tar.finish()).unwrap()
    }

    fn sample() -> TarFs {
        fs(RawTar::default()
            .file("a/b.txt", b"hi")
            .file("a/.gitignore", b"*.tar")
            .dir("etc/")
            .file("usr/lib/os-release", b"ID=test\n")
            .symlink("etc/os-release", "../usr/lib/os-release")
            .symlink("lib", "usr/lib")
            .symlink("a/escape", "../usr")
            .hard_link("a/hard", "a/b.txt"))
    }

    fn names(iter: ReadDirIter) -> Vec<String> {
        iter.map(|e| e.unwrap().name).collect()
    }

    #[test]
    fn open_reads_file_contents() {
        let fs = sample();
        let mut file = fs.open(Path::new("a/b.txt")).unwrap().into_file().unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hi");
        assert_eq!(file.metadata().size, 2);
    }

    #[test]
    fn stat_synthesized_directory() {
        let fs = sample();
        let meta = fs.metadata(Path::new("a")).unwrap();
        assert!(meta.is_dir());
        assert!(meta.implicit);
        assert_eq!(meta.permissions.mode(), 0o755);
    }

    #[test]
    fn read_dir_is_sorted() {
        let fs = sample();
        assert_eq!(
            names(fs.read_dir(Path::new("a")).unwrap()),
            vec![".gitignore", "b.txt", "escape", "hard"]
        );
        assert_eq!(
            names(fs.read_dir(Path::new(".")).unwrap()),
            vec!["a", "etc", "lib", "usr"]
        );
    }

    #[test]
    fn read_dir_entries_carry_view_relative_paths() {
        let fs = sample();
        let entries: Vec<_> = fs.read_dir(Path::new("/a/")).unwrap().map(Result::unwrap).collect();
        assert_eq!(entries[1].path, PathBuf::from("a/b.txt"));
        assert_eq!(entries[2].file_type(), FileType::Symlink);
    }

    #[test]
    fn open_missing_is_not_found() {
        let fs = sample();
        let err = fs.open(Path::new("a/nope")).unwrap_err();
        assert!(matches!(err, FsError::NotFound { .. }));
        assert!(!fs.exists(Path::new("a/nope")).unwrap());
        assert!(!fs.exists(Path::new("a/b.txt/x")).unwrap());
    }

    #[test]
    fn hard_link_to_symlink_follows_its_destination() {
        let fs = fs(RawTar::default()
            .file("a/b.txt", b"hi")
            .symlink("lnk", "a/b.txt")
            .hard_link("hl", "lnk")
            .member("pipe", b'6', b"", "")
            .hard_link("pipe-link", "pipe"));
        assert_eq!(fs.read(Path::new("hl")).unwrap(), b"hi");
        assert_eq!(fs.read_link(Path::new("hl")).unwrap(), PathBuf::from("a/b.txt"));
        assert!(!fs.exists(Path::new("pipe-link")).unwrap());
        assert_eq!(names(fs.read_dir(Path::new(".")).unwrap()), vec!["a", "hl", "lnk"]);
    }

    #[test]
    fn path_beneath_file_is_not_found() {
        let fs = sample();
        for path in ["a/b.txt/missing", "a/hard/x", "etc/os-release/x"] {
            let path = Path::new(path);
            assert!(matches!(fs.open(path), Err(FsError::NotFound { .. })), "{path:?}");
            assert!(matches!(fs.metadata(path), Err(FsError::NotFound { .. })), "{path:?}");
            assert!(matches!(fs.read(path), Err(FsError::NotFound { .. })), "{path:?}");
            assert!(matches!(fs.read_dir(path), Err(FsError::NotFound { .. })), "{path:?}");
        }
        assert!(matches!(
            fs.read_dir(Path::new("a/b.txt")),
            Err(FsError::NotADirectory { .. })
        ));
    }

    #[test]
    fn read_dir_on_file_is_not_a_directory() {
        let fs = sample();
        let err = fs.read_dir(Path::new("a/b.txt")).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory { .. }));
    }

    #[test]
    fn open_directory_gives_listing_only() {
        let fs = sample();
        let handle = fs.open(Path::new("a")).unwrap();
        assert!(handle.is_dir());
        let dir = handle.into_dir().unwrap();
        assert_eq!(dir.entries().count(), 4);
        let err = fs.open(Path::new("a")).unwrap().into_file().unwrap_err();
        assert!(matches!(err, FsError::NotAFile { .. }));
        assert!(matches!(fs.read(Path::new("a")), Err(FsError::NotAFile { .. })));
    }

    #[test]
    fn parent_segments_are_invalid() {
        let fs = sample();
        let err = fs.open(Path::new("a/../a/b.txt")).unwrap_err();
        assert!(matches!(err, FsError::InvalidPath { .. }));
    }

    #[test]
    fn symlinks_are_followed() {
        let fs = sample();
        assert_eq!(fs.read_to_string(Path::new("etc/os-release")).unwrap(), "ID=test\n");
        assert_eq!(fs.read(Path::new("lib/os-release")).unwrap(), b"ID=test\n");
        assert_eq!(names(fs.read_dir(Path::new("lib")).unwrap()), vec!["os-release"]);
        assert!(fs.symlink_metadata(Path::new("lib")).unwrap().is_symlink());
        assert_eq!(
            fs.read_link(Path::new("etc/os-release")).unwrap(),
            PathBuf::from("../usr/lib/os-release")
        );
        assert!(matches!(
            fs.read_link(Path::new("a/b.txt")),
            Err(FsError::InvalidData { .. })
        ));
    }

    #[test]
    fn symlink_loop_is_reported() {
        let fs = fs(RawTar::default().symlink("x", "y").symlink("y", "x"));
        let err = fs.metadata(Path::new("x")).unwrap_err();
        assert!(matches!(err, FsError::SymlinkLoop { .. }));
    }

    #[test]
    fn hard_link_reads_target_data() {
        let fs = sample();
        assert_eq!(fs.read(Path::new("a/hard")).unwrap(), b"hi");
        assert!(fs.metadata(Path::new("a/hard")).unwrap().is_file());
    }

    #[test]
    fn read_range_clamps() {
        let fs = sample();
        assert_eq!(fs.read_range(Path::new("usr/lib/os-release"), 3, 100).unwrap(), b"test\n");
        assert!(fs.read_range(Path::new("a/b.txt"), 10, 4).unwrap().is_empty());
        assert!(fs.read_range(Path::new("a/b.txt"), u64::MAX, 4).unwrap().is_empty());
        assert!(fs.read_range(Path::new("a/hard"), u64::MAX - 1, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn read_to_string_rejects_invalid_utf8() {
        let fs = fs(RawTar::default().file("bin", &[0xff, 0xfe]));
        let err = fs.read_to_string(Path::new("bin")).unwrap_err();
        assert!(matches!(err, FsError::InvalidData { .. }));
    }

    #[test]
    fn sub_matches_prefixed_lookup() {
        let fs = sample();
        let a = fs.sub(Path::new("a")).unwrap();
        assert_eq!(a.read(Path::new("b.txt")).unwrap(), fs.read(Path::new("a/b.txt")).unwrap());
        assert_eq!(
            names(a.read_dir(Path::new(".")).unwrap()),
            names(fs.read_dir(Path::new("a")).unwrap())
        );
        let entries: Vec<_> = a.read_dir(Path::new("")).unwrap().map(Result::unwrap).collect();
        assert_eq!(entries[1].path, PathBuf::from("b.txt"));
    }

    #[test]
    fn sub_of_root_is_equivalent() {
        let fs = sample();
        let same = fs.sub(Path::new(".")).unwrap();
        assert_eq!(
            names(same.read_dir(Path::new(".")).unwrap()),
            names(fs.read_dir(Path::new(".")).unwrap())
        );
        assert_eq!(same.read(Path::new("a/b.txt")).unwrap(), b"hi");
    }

    #[test]
    fn sub_on_file_is_not_a_directory() {
        let fs = sample();
        let err = fs.sub(Path::new("a/b.txt")).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory { .. }));
    }

    #[test]
    fn sub_views_nest() {
        let fs = sample();
        let lib = fs.sub(Path::new("usr")).unwrap().sub(Path::new("lib")).unwrap();
        assert_eq!(lib.read(Path::new("os-release")).unwrap(), b"ID=test\n");
    }

    #[test]
    fn symlink_out_of_sub_view_is_not_found() {
        let fs = sample();
        let a = fs.sub(Path::new("a")).unwrap();
        let err = a.read_dir(Path::new("escape")).unwrap_err();
        assert!(matches!(err, FsError::NotFound { .. }));
        assert!(a.symlink_metadata(Path::new("escape")).unwrap().is_symlink());
    }

    #[test]
    fn sub_through_symlink_roots_at_target() {
        let fs = sample();
        let lib = fs.sub(Path::new("lib")).unwrap();
        assert_eq!(lib.read(Path::new("os-release")).unwrap(), b"ID=test\n");
    }

    #[test]
    fn empty_archive_has_empty_root() {
        let fs = fs(RawTar::default());
        assert!(fs.is_empty());
        assert_eq!(fs.len(), 1);
        assert!(names(fs.read_dir(Path::new(".")).unwrap()).is_empty());
        assert!(fs.metadata(Path::new(".")).unwrap().is_dir());
    }

    #[test]
    fn handles_keep_independent_cursors() {
        let fs = sample();
        let mut one = fs.open(Path::new("usr/lib/os-release")).unwrap().into_file().unwrap();
        let mut two = fs.open(Path::new("usr/lib/os-release")).unwrap().into_file().unwrap();
        one.seek(SeekFrom::Start(3)).unwrap();
        let mut buf = [0u8; 2];
        two.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ID");
        one.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"te");
    }

    #[test]
    fn handle_outlives_filesystem() {
        let mut file = {
            let fs = sample();
            fs.open(Path::new("a/b.txt")).unwrap().into_file().unwrap()
        };
        let mut out = Vec::new();
        file.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hi");
    }

    #[test]
    fn tar_fs_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<TarFs>();
    }
}
