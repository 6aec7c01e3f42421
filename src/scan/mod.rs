//! # Format Scanner
//!
//! One forward pass over a tar stream that records where every member's data
//! lives, without reading that data.
//!
//! Header decoding is done by [`tar::Archive`]: checksums, octal and base-256
//! numbers, the ustar prefix, GNU long names and link targets, and PAX `path`
//! and `linkpath` records. The archive is driven over the backing storage
//! through a `Read + Seek` cursor, so payloads are skipped rather than read.
//!
//! On top of what the reader yields, the scanner:
//!
//! - records each member's header and data offset
//! - rejects payloads that run past the end of the stream
//! - applies PAX `mtime`, `uid` and `gid` records
//! - caps the size of extended-header values
//! - drops PAX global headers (`g`)
//!
//! The first all-zero block, or a clean end of stream, ends the archive. Any
//! header that fails to decode fails the whole scan.

use std::borrow::Cow;
use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::storage::ReadAt;
use crate::{FsError, Limits};

const BLOCK_LEN: u64 = 512;

/// Member kind as recorded in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    File,
    Directory,
    Symlink,
    HardLink,
    /// Device nodes, FIFOs, and type flags this reader does not model.
    Other(u8),
}

/// One logical member, overrides already applied. The name is raw (not yet
/// normalized).
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub name: String,
    pub kind: MemberKind,
    pub size: u64,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub mtime: i64,
    pub link_target: Option<String>,
    pub header_offset: u64,
    pub data_offset: u64,
}

/// Sequential cursor over positioned storage, for the `tar` reader.
struct StreamReader<'a> {
    storage: &'a dyn ReadAt,
    pos: u64,
    len: u64,
    /// Set when the storage itself failed, as opposed to the archive.
    failed: &'a Cell<bool>,
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos);
        let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if want == 0 {
            return Ok(0);
        }
        let n = self
            .storage
            .read_at(&mut buf[..want], self.pos)
            .inspect_err(|_| self.failed.set(true))?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for StreamReader<'_> {
    fn seek(&mut self, to: SeekFrom) -> io::Result<u64> {
        let target = match to {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        self.pos = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        Ok(self.pos)
    }
}

/// PAX records the `tar` reader leaves to its caller.
#[derive(Debug, Default)]
struct PaxOverrides {
    size: Option<u64>,
    mtime: Option<i64>,
    uid: Option<u64>,
    gid: Option<u64>,
}

impl PaxOverrides {
    fn collect<R: Read>(entry: &mut tar::Entry<'_, R>, limits: &Limits) -> Result<Self, String> {
        let mut out = Self::default();
        let Some(records) = entry.pax_extensions().map_err(|e| e.to_string())? else {
            return Ok(out);
        };

        let mut total: u64 = 0;
        for record in records {
            let record = record.map_err(|e| format!("malformed pax record: {e}"))?;
            total += (record.key_bytes().len() + record.value_bytes().len()) as u64;
            if total > limits.max_extended_header_size {
                return Err(format!(
                    "extended header exceeds limit of {} bytes",
                    limits.max_extended_header_size
                ));
            }
            let (Ok(key), Ok(value)) = (record.key(), record.value()) else {
                continue;
            };
            match key {
                "size" => out.size = Some(parse_decimal(key, value)?),
                "uid" => out.uid = Some(parse_decimal(key, value)?),
                "gid" => out.gid = Some(parse_decimal(key, value)?),
                "mtime" => out.mtime = Some(parse_seconds(value)?),
                _ => {}
            }
        }
        Ok(out)
    }
}

fn parse_decimal(key: &str, value: &str) -> Result<u64, String> {
    value
        .parse()
        .map_err(|_| format!("invalid pax {key} {value:?}"))
}

/// `mtime` may carry a fractional part; only whole seconds are kept.
fn parse_seconds(value: &str) -> Result<i64, String> {
    let whole = value.split('.').next().unwrap_or_default();
    whole
        .parse()
        .map_err(|_| format!("invalid pax mtime {value:?}"))
}

/// Scan the whole stream and return its members in stream order.
pub(crate) fn scan(storage: &dyn ReadAt, limits: &Limits) -> Result<Vec<Member>, FsError> {
    let len = storage.size().map_err(storage_error)?;
    let failed = Cell::new(false);
    let mut archive = tar::Archive::new(StreamReader {
        storage,
        pos: 0,
        len,
        failed: &failed,
    });
    let reader_error = |e: io::Error, offset: u64| {
        if failed.get() {
            storage_error(e)
        } else {
            FsError::format(offset, e.to_string())
        }
    };

    let mut members = Vec::new();
    // Where the next header is expected; reader errors are reported here.
    let mut next: u64 = 0;

    for entry in archive.entries_with_seek().map_err(|e| reader_error(e, 0))? {
        let mut entry = entry.map_err(|e| reader_error(e, next))?;
        let header_offset = entry.raw_header_position();
        let data_offset = entry.raw_file_position();
        let pax = PaxOverrides::collect(&mut entry, limits)
            .map_err(|details| FsError::format(header_offset, details))?;

        let header = entry.header();
        let field = |e: io::Error| FsError::format(header_offset, e.to_string());

        let mut stored = header.entry_size().map_err(field)?;
        if stored == 0 {
            stored = pax.size.unwrap_or(0);
        }
        next = data_offset + padded_len(header_offset, stored, data_offset, len)?;

        let entry_type = header.entry_type();
        if entry_type.is_pax_global_extensions() {
            tracing::debug!(offset = header_offset, "ignoring pax global header");
            continue;
        }

        let name = decode(entry.path_bytes(), header_offset);
        check_limit(header_offset, name.len(), limits)?;

        let kind = if entry_type.is_dir() || (entry_type.is_file() && name.ends_with('/')) {
            MemberKind::Directory
        } else if entry_type.is_file() {
            MemberKind::File
        } else if entry_type.is_symlink() {
            MemberKind::Symlink
        } else if entry_type.is_hard_link() {
            MemberKind::HardLink
        } else {
            MemberKind::Other(entry_type.as_byte())
        };

        let link_target = match kind {
            MemberKind::Symlink | MemberKind::HardLink => {
                let raw = entry.link_name_bytes().unwrap_or_default();
                let target = decode(raw, header_offset);
                check_limit(header_offset, target.len(), limits)?;
                Some(target)
            }
            _ => None,
        };

        let mtime = match pax.mtime {
            Some(secs) => secs,
            None => i64::try_from(header.mtime().map_err(field)?).unwrap_or(i64::MAX),
        };
        let member = Member {
            name,
            kind,
            size: match kind {
                MemberKind::File | MemberKind::Other(_) => stored,
                _ => 0,
            },
            mode: header.mode().map_err(field)?,
            uid: match pax.uid {
                Some(uid) => uid,
                None => header.uid().map_err(field)?,
            },
            gid: match pax.gid {
                Some(gid) => gid,
                None => header.gid().map_err(field)?,
            },
            mtime,
            link_target,
            header_offset,
            data_offset,
        };

        tracing::trace!(
            path = %member.name,
            kind = ?member.kind,
            offset = member.data_offset,
            size = member.size,
            "scanned member"
        );
        members.push(member);
    }

    Ok(members)
}

/// Payload length rounded up to the block size, checked against what is left
/// of the stream.
fn padded_len(header_offset: u64, size: u64, data_offset: u64, len: u64) -> Result<u64, FsError> {
    let padded = size
        .checked_next_multiple_of(BLOCK_LEN)
        .ok_or_else(|| FsError::format(header_offset, format!("impossible size {size}")))?;
    let remaining = len.saturating_sub(data_offset);
    if padded > remaining {
        return Err(FsError::format(
            header_offset,
            format!("declared size {size} exceeds remaining stream length {remaining}"),
        ));
    }
    Ok(padded)
}

fn check_limit(header_offset: u64, len: usize, limits: &Limits) -> Result<(), FsError> {
    if len as u64 > limits.max_extended_header_size {
        return Err(FsError::format(
            header_offset,
            format!("extended header of {len} bytes exceeds limit"),
        ));
    }
    Ok(())
}

fn storage_error(source: io::Error) -> FsError {
    FsError::Io {
        operation: "scan",
        path: PathBuf::new(),
        source,
    }
}

fn decode(bytes: Cow<'_, [u8]>, offset: u64) -> String {
    match String::from_utf8(bytes.into_owned()) {
        Ok(s) => s,
        Err(e) => {
            let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
            tracing::warn!(offset, name = %lossy, "member name is not valid UTF-8");
            lossy
        }
    }
}
