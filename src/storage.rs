//! # Backing Storage
//!
//! Positioned-read access to the bytes of a tar stream.
//!
//! ## Overview
//!
//! Every read the filesystem performs is addressed by absolute offset through
//! [`ReadAt`]. There is no shared cursor, so any number of file handles can
//! read from one storage value at once without coordinating.
//!
//! | Storage | Concurrency |
//! |---------|-------------|
//! | `std::fs::File` | `pread(2)` / `seek_read`, lock-free |
//! | `Vec<u8>`, `Box<[u8]>`, `Arc<[u8]>`, `&'static [u8]` | lock-free |
//! | [`LockedReader`] | one `Mutex` around a seek-then-read pair |
//!
//! [`LockedReader`] exists for sources that only offer a stateful
//! `Read + Seek` cursor. It serializes every read.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex};

/// Read bytes at an absolute offset without touching any shared cursor.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; `read_at` takes `&self` and may be
/// called from many threads at once.
///
/// # Object Safety
///
/// This trait is object-safe; the filesystem stores `Arc<dyn ReadAt>`.
pub trait ReadAt: Send + Sync {
    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; `0` means `offset` is at or past the
    /// end of the storage.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Total length of the storage in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Fill `buf` completely from `offset`.
    ///
    /// # Errors
    ///
    /// [`io::ErrorKind::UnexpectedEof`] if the storage ends first.
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn read_slice(data: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= data.len() {
        return 0;
    }
    let n = buf.len().min(data.len() - start);
    buf[..n].copy_from_slice(&data[start..start + n]);
    n
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice(self, buf, offset))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for Box<[u8]> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice(self, buf, offset))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice(self, buf, offset))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for &'static [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(read_slice(self, buf, offset))
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }
}

/// Positioned reads over a plain `Read + Seek` source.
///
/// Each [`ReadAt::read_at`] takes the lock, seeks, and reads, so callers never
/// observe each other's cursor. Throughput is limited to one read at a time.
///
/// The source can be taken back with [`LockedReader::close`]; reads through
/// handles that outlive it then fail with an I/O error.
///
/// # Example
///
/// ```rust
/// use std::io::Cursor;
/// use tarfs::{LockedReader, ReadAt};
///
/// let storage = LockedReader::new(Cursor::new(b"hello world".to_vec()));
/// let mut buf = [0u8; 5];
/// storage.read_exact_at(&mut buf, 6).unwrap();
/// assert_eq!(&buf, b"world");
/// ```
#[derive(Debug)]
pub struct LockedReader<R> {
    inner: Mutex<Option<R>>,
}

impl<R: Read + Seek + Send> LockedReader<R> {
    /// Wrap a seekable reader.
    pub fn new(reader: R) -> Self {
        Self {
            inner: Mutex::new(Some(reader)),
        }
    }

    /// Take the reader back out.
    ///
    /// Returns `None` if it was already closed.
    pub fn close(&self) -> Option<R> {
        match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn with_reader<T>(&self, f: impl FnOnce(&mut R) -> io::Result<T>) -> io::Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("storage lock poisoned"))?;
        match guard.as_mut() {
            Some(reader) => f(reader),
            None => Err(io::Error::other("storage closed")),
        }
    }
}

impl<R: Read + Seek + Send> ReadAt for LockedReader<R> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.with_reader(|reader| {
            reader.seek(SeekFrom::Start(offset))?;
            reader.read(buf)
        })
    }

    fn size(&self) -> io::Result<u64> {
        self.with_reader(|reader| reader.seek(SeekFrom::End(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn vec_read_at_offset() {
        let data = b"hello world".to_vec();
        let mut buf = [0u8; 5];
        assert_eq!(data.read_at(&mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn vec_read_at_past_end_returns_zero() {
        let data = b"hi".to_vec();
        let mut buf = [0u8; 4];
        assert_eq!(data.read_at(&mut buf, 2).unwrap(), 0);
        assert_eq!(data.read_at(&mut buf, 100).unwrap(), 0);
    }

    #[test]
    fn read_exact_at_short_storage_fails() {
        let data = b"abc".to_vec();
        let mut buf = [0u8; 4];
        let err = data.read_exact_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn arc_slice_and_static_slice() {
        let shared: Arc<[u8]> = Arc::from(&b"0123456789"[..]);
        let mut buf = [0u8; 3];
        shared.read_exact_at(&mut buf, 7).unwrap();
        assert_eq!(&buf, b"789");

        let fixed: &'static [u8] = b"xyz";
        assert_eq!(fixed.size().unwrap(), 3);
    }

    #[test]
    fn file_read_at_does_not_move_cursor() {
        let mut tmp = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut tmp, b"positioned reads").unwrap();
        tmp.seek(SeekFrom::Start(0)).unwrap();

        let mut buf = [0u8; 5];
        ReadAt::read_exact_at(&tmp, &mut buf, 11).unwrap();
        assert_eq!(&buf, b"reads");
        assert_eq!(ReadAt::size(&tmp).unwrap(), 16);
    }

    #[test]
    fn locked_reader_reads_at_offsets() {
        let storage = LockedReader::new(Cursor::new(b"abcdefgh".to_vec()));
        let mut buf = [0u8; 2];
        storage.read_exact_at(&mut buf, 6).unwrap();
        assert_eq!(&buf, b"gh");
        storage.read_exact_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"ab");
        assert_eq!(storage.size().unwrap(), 8);
    }

    #[test]
    fn locked_reader_after_close_fails() {
        let storage = LockedReader::new(Cursor::new(b"abc".to_vec()));
        assert!(storage.close().is_some());
        assert!(storage.close().is_none());
        let mut buf = [0u8; 1];
        let err = storage.read_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn storage_is_object_safe() {
        fn _check(_: &dyn ReadAt) {}
        let data: Arc<dyn ReadAt> = Arc::new(b"x".to_vec());
        assert_eq!(data.size().unwrap(), 1);
    }
}
