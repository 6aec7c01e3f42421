//! # tarfs
//!
//! A read-only, random-access filesystem view over an uncompressed tar
//! stream.
//!
//! The archive is scanned once when a [`TarFs`] is built: every member's
//! header is decoded and the byte offset of its data is recorded. From then on
//! paths resolve through an in-memory index and file reads go straight to the
//! backing storage at the recorded offset. Member data is never copied or
//! cached.
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust
//! use std::io::Read;
//! use std::path::Path;
//! use tarfs::{FsDir, FsRead, TarFs};
//!
//! # fn layer_bytes() -> Vec<u8> {
//! #     let mut b = tar::Builder::new(Vec::new());
//! #     let mut h = tar::Header::new_ustar();
//! #     h.set_size(8);
//! #     h.set_mode(0o644);
//! #     h.set_cksum();
//! #     b.append_data(&mut h, "etc/hostname", &b"builder\n"[..]).unwrap();
//! #     b.into_inner().unwrap()
//! # }
//! let fs = TarFs::new(layer_bytes())?;
//!
//! for entry in fs.read_dir(Path::new("etc"))? {
//!     let entry = entry?;
//!     println!("{} {} bytes", entry.name, entry.metadata.size);
//! }
//!
//! let mut file = fs.open(Path::new("etc/hostname"))?.into_file()?;
//! let mut text = String::new();
//! file.read_to_string(&mut text)?;
//! assert_eq!(text, "builder\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Backed by a file on disk instead of memory, reads are `pread(2)` calls
//! and any number of threads can read through one `TarFs` at once:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tarfs::{FsRead, TarFs};
//!
//! let fs = TarFs::new(std::fs::File::open("layer.tar")?)?;
//! std::thread::scope(|s| {
//!     for name in ["bin/sh", "etc/passwd"] {
//!         let fs = &fs;
//!         s.spawn(move || fs.read(Path::new(name)));
//!     }
//! });
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`TarFs`] | The filesystem; cheap to clone, `Send + Sync` |
//! | [`Handle`] | What `open` returns: a [`File`] or a [`Dir`] |
//! | [`File`] | `Read + Seek` cursor over one member's data |
//! | [`ReadAt`] | Positioned-read storage the archive lives in |
//! | [`LockedReader`] | `ReadAt` over any `Read + Seek` source |
//! | [`Limits`] | Construction limits |
//! | [`FsError`] | Error type with context |
//! | [`Metadata`] | Type, size, mode, mtime and ownership of an entry |
//!
//! ## Capability Traits
//!
//! | Trait | Operations |
//! |-------|------------|
//! | [`FsRead`] | `open`, `metadata`, `read`, `read_to_string`, `read_range`, `exists` |
//! | [`FsDir`] | `read_dir` |
//! | [`FsSub`] | `sub` |
//! | [`FsLink`] | `read_link`, `symlink_metadata` |
//! | [`Fs`] | all of the above |
//! | [`FsExt`] | `is_file`, `is_dir`, `is_symlink`, `file_size`, `walk` |
//!
//! ---
//!
//! ## Supported Archives
//!
//! POSIX ustar, GNU (long names and link targets, base-256 numbers) and PAX
//! (`path`, `linkpath`, `size`, `mtime`, `uid`, `gid`). Compression is the
//! caller's business: hand in the decompressed bytes.
//!
//! Directories missing from the archive but implied by a member's path are
//! synthesized. Later members replace earlier ones with the same path. Hard
//! links share their target's data. Device nodes and FIFOs are skipped.
//!
//! ## Feature Flags
//!
//! - **`serde`**: derives `Serialize`/`Deserialize` on the public data types
//!   and enables `FsExtJson::read_json`.

mod config;
mod error;
mod ext;
mod file;
mod fs;
mod index;
mod scan;
mod storage;
mod traits;
mod types;

pub use config::Limits;
pub use error::FsError;
pub use ext::FsExt;
#[cfg(feature = "serde")]
pub use ext::FsExtJson;
pub use file::{Dir, File, Handle};
pub use fs::TarFs;
pub use storage::{LockedReader, ReadAt};
pub use traits::{Fs, FsDir, FsLink, FsRead, FsSub, ReadDirIter};
pub use types::{DirEntry, FileType, Metadata, Permissions};
