//! # Handles
//!
//! What [`FsRead::open`](crate::FsRead::open) hands out.
//!
//! A [`File`] is a private cursor over one member's byte range of the backing
//! storage. Every read is a positioned read at `data_offset + cursor`, so two
//! handles on the same member (or on one storage) never see each other's
//! position. A [`Dir`] carries a directory's listing and nothing readable.
//!
//! ```rust
//! use std::io::{Read, Seek, SeekFrom};
//! use std::path::Path;
//! use tarfs::{FsRead, TarFs};
//!
//! # fn archive() -> Vec<u8> {
//! #     let mut b = tar::Builder::new(Vec::new());
//! #     let mut h = tar::Header::new_ustar();
//! #     h.set_size(11);
//! #     h.set_mode(0o644);
//! #     h.set_cksum();
//! #     b.append_data(&mut h, "greeting.txt", &b"hello world"[..]).unwrap();
//! #     b.into_inner().unwrap()
//! # }
//! let fs = TarFs::new(archive())?;
//! let mut file = fs.open(Path::new("greeting.txt"))?.into_file()?;
//!
//! file.seek(SeekFrom::Start(6))?;
//! let mut rest = String::new();
//! file.read_to_string(&mut rest)?;
//! assert_eq!(rest, "world");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::storage::ReadAt;
use crate::{DirEntry, FsError, Metadata, ReadDirIter};

/// An open archive member.
#[derive(Debug)]
pub enum Handle {
    /// A regular file (or hard link to one); byte-readable.
    File(File),
    /// A directory; listing only.
    Dir(Dir),
}

impl Handle {
    /// Metadata of the opened entry.
    pub fn metadata(&self) -> &Metadata {
        match self {
            Handle::File(f) => f.metadata(),
            Handle::Dir(d) => d.metadata(),
        }
    }

    /// Returns `true` if this is a directory handle.
    pub fn is_dir(&self) -> bool {
        matches!(self, Handle::Dir(_))
    }

    /// Take the byte-readable file.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotAFile`] if the handle is a directory
    pub fn into_file(self) -> Result<File, FsError> {
        match self {
            Handle::File(f) => Ok(f),
            Handle::Dir(d) => Err(FsError::NotAFile { path: d.path }),
        }
    }

    /// Take the directory.
    ///
    /// # Errors
    ///
    /// - [`FsError::NotADirectory`] if the handle is a file
    pub fn into_dir(self) -> Result<Dir, FsError> {
        match self {
            Handle::Dir(d) => Ok(d),
            Handle::File(f) => Err(FsError::NotADirectory { path: f.path }),
        }
    }

    /// Close the handle. Idempotent.
    pub fn close(&mut self) -> Result<(), FsError> {
        match self {
            Handle::File(f) => f.close(),
            Handle::Dir(d) => d.close(),
        }
    }
}

/// Read-only cursor over one member's data.
///
/// Implements [`Read`] and [`Seek`]. Reads stop at the member's size and then
/// return `Ok(0)`; seeking beyond the size is allowed and lands on the end.
pub struct File {
    storage: Arc<dyn ReadAt>,
    path: PathBuf,
    metadata: Metadata,
    data_offset: u64,
    size: u64,
    pos: u64,
    closed: bool,
}

impl File {
    pub(crate) fn new(
        storage: Arc<dyn ReadAt>,
        path: PathBuf,
        metadata: Metadata,
        data_offset: u64,
        size: u64,
    ) -> Self {
        Self {
            storage,
            path,
            metadata,
            data_offset,
            size,
            pos: 0,
            closed: false,
        }
    }

    /// Path this handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata of the file.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Size of the file in bytes.
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Returns `true` for a zero-length file.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Read at `offset` within the file without moving the cursor.
    ///
    /// Returns `Ok(0)` at or past the end of the file.
    ///
    /// # Errors
    ///
    /// - [`FsError::Closed`] after [`close`](Self::close)
    /// - [`FsError::Io`] if the backing storage fails
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        if self.closed {
            return Err(FsError::Closed {
                path: self.path.clone(),
            });
        }
        let remaining = self.size.saturating_sub(offset);
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if want == 0 {
            return Ok(0);
        }

        let n = self
            .storage
            .read_at(&mut buf[..want], self.data_offset + offset)
            .map_err(|source| self.io_error(source))?;
        if n == 0 {
            // The member's range was validated at construction; the storage
            // shrank underneath us.
            return Err(self.io_error(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "backing storage ended inside member data",
            )));
        }
        Ok(n)
    }

    /// Close the handle. Idempotent; later reads fail with [`FsError::Closed`].
    pub fn close(&mut self) -> Result<(), FsError> {
        self.closed = true;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> FsError {
        FsError::Io {
            operation: "read",
            path: self.path.clone(),
            source,
        }
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("data_offset", &self.data_offset)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.closed {
            return Err(FsError::Closed {
                path: self.path.clone(),
            }
            .into());
        }
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(d) => i128::from(self.pos) + i128::from(d),
            SeekFrom::End(d) => i128::from(self.size) + i128::from(d),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.pos = u64::try_from(target).map_or(self.size, |t| t.min(self.size));
        Ok(self.pos)
    }
}

/// An open directory: its own metadata and a snapshot of its listing.
#[derive(Debug)]
pub struct Dir {
    path: PathBuf,
    metadata: Metadata,
    entries: Vec<DirEntry>,
    cursor: usize,
    closed: bool,
}

impl Dir {
    pub(crate) fn new(path: PathBuf, metadata: Metadata, entries: Vec<DirEntry>) -> Self {
        Self {
            path,
            metadata,
            entries,
            cursor: 0,
            closed: false,
        }
    }

    /// Path this handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata of the directory.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The full sorted listing.
    pub fn entries(&self) -> ReadDirIter {
        ReadDirIter::from_vec(self.entries.iter().cloned().map(Ok).collect())
    }

    /// Return up to `n` entries after the ones already returned.
    ///
    /// An empty result means the listing is exhausted.
    ///
    /// # Errors
    ///
    /// - [`FsError::Closed`] after [`close`](Self::close)
    pub fn next_entries(&mut self, n: usize) -> Result<Vec<DirEntry>, FsError> {
        if self.closed {
            return Err(FsError::Closed {
                path: self.path.clone(),
            });
        }
        let end = self.cursor.saturating_add(n).min(self.entries.len());
        let batch = self.entries[self.cursor..end].to_vec();
        self.cursor = end;
        Ok(batch)
    }

    /// Close the handle. Idempotent.
    pub fn close(&mut self) -> Result<(), FsError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileType;

    fn file_over(data: &'static [u8], offset: u64, size: u64) -> File {
        File::new(
            Arc::new(data),
            PathBuf::from("f"),
            Metadata {
                size,
                ..Metadata::default()
            },
            offset,
            size,
        )
    }

    #[test]
    fn read_is_bounded_to_member_range() {
        let mut f = file_over(b"xxhelloyy", 2, 5);
        let mut out = Vec::new();
        f.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(f.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn short_buffer_reads_advance_cursor() {
        let mut f = file_over(b"abcdef", 0, 6);
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf).unwrap(), 4);
        assert_eq!(f.position(), 4);
        assert_eq!(f.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn seek_clamps_to_size() {
        let mut f = file_over(b"abcdef", 0, 6);
        assert_eq!(f.seek(SeekFrom::Start(100)).unwrap(), 6);
        assert_eq!(f.read(&mut [0u8; 1]).unwrap(), 0);
        assert_eq!(f.seek(SeekFrom::End(-2)).unwrap(), 4);
        assert_eq!(f.seek(SeekFrom::Current(-1)).unwrap(), 3);
        let mut buf = [0u8; 3];
        assert_eq!(f.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"def");
    }

    #[test]
    fn seek_before_start_fails() {
        let mut f = file_over(b"abc", 0, 3);
        let err = f.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(f.position(), 0);
    }

    #[test]
    fn read_at_leaves_cursor_alone() {
        let f = file_over(b"0123456789", 0, 10);
        let mut buf = [0u8; 3];
        assert_eq!(f.read_at(&mut buf, 7).unwrap(), 3);
        assert_eq!(&buf, b"789");
        assert_eq!(f.read_at(&mut buf, 10).unwrap(), 0);
        assert_eq!(f.position(), 0);
    }

    #[test]
    fn close_is_idempotent_and_blocks_reads() {
        let mut f = file_over(b"abc", 0, 3);
        f.close().unwrap();
        f.close().unwrap();
        let err = f.read(&mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn storage_shorter_than_member_is_an_io_error() {
        let f = file_over(b"ab", 0, 10);
        let err = f.read_at(&mut [0u8; 4], 2).unwrap_err();
        assert!(matches!(err, FsError::Io { .. }));
    }

    #[test]
    fn handle_into_file_on_dir_fails() {
        let dir = Dir::new(
            PathBuf::from("d"),
            Metadata {
                file_type: FileType::Directory,
                ..Metadata::default()
            },
            Vec::new(),
        );
        let handle = Handle::Dir(dir);
        assert!(handle.is_dir());
        assert!(matches!(handle.into_file(), Err(FsError::NotAFile { .. })));
    }

    #[test]
    fn dir_next_entries_pages_through_listing() {
        let entry = |name: &str| DirEntry {
            name: name.into(),
            path: PathBuf::from(name),
            metadata: Metadata::default(),
        };
        let mut dir = Dir::new(
            PathBuf::from("."),
            Metadata::default(),
            vec![entry("a"), entry("b"), entry("c")],
        );
        assert_eq!(dir.next_entries(2).unwrap().len(), 2);
        assert_eq!(dir.next_entries(2).unwrap()[0].name, "c");
        assert!(dir.next_entries(2).unwrap().is_empty());
        assert_eq!(dir.entries().count(), 3);
    }
}
