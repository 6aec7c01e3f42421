//! # Path Index & Tree Builder
//!
//! Turns the scanner's flat member list into an immutable map keyed by clean
//! path, plus a sorted child list for every directory.
//!
//! ## Rules
//!
//! - Paths are normalized: leading `/` and `./` stripped, empty and `.`
//!   segments dropped, `..` rejected. The root is `"."`.
//! - A later member for the same path replaces the earlier one.
//! - Every ancestor of every member exists as a directory, synthesized when
//!   the archive has no explicit member for it.
//! - Hard links take their target's data range. Targets not yet seen are
//!   resolved in a second pass once every member is indexed; a missing or
//!   circular target fails the build. A link to a symlink reads as that
//!   symlink, and a link to an unsupported member is hidden like its target.
//! - Child lists are sorted once, after the last member.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, SystemTime};

use crate::scan::{Member, MemberKind};
use crate::{FileType, FsError, Metadata, Permissions};

/// Key of the archive root.
pub(crate) const ROOT: &str = ".";

/// What an indexed path is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Directory,
    Symlink,
    HardLink,
    /// Recorded so it can shadow earlier members, never listed or opened.
    Other,
}

/// One indexed path.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub mtime: i64,
    pub link_target: Option<String>,
    pub data_offset: u64,
    pub implicit: bool,
}

impl Entry {
    fn directory(path: String) -> Self {
        Entry {
            path,
            kind: EntryKind::Directory,
            size: 0,
            mode: Permissions::default_dir().mode(),
            uid: 0,
            gid: 0,
            mtime: 0,
            link_target: None,
            data_offset: 0,
            implicit: true,
        }
    }

    fn from_member(path: String, member: Member) -> Self {
        Entry {
            path,
            kind: match member.kind {
                MemberKind::File => EntryKind::File,
                MemberKind::Directory => EntryKind::Directory,
                MemberKind::Symlink => EntryKind::Symlink,
                MemberKind::HardLink => EntryKind::HardLink,
                MemberKind::Other(_) => EntryKind::Other,
            },
            size: member.size,
            mode: member.mode,
            uid: member.uid,
            gid: member.gid,
            mtime: member.mtime,
            link_target: member.link_target,
            data_offset: member.data_offset,
            implicit: false,
        }
    }

    /// Readable byte content: regular files and resolved hard links.
    pub(crate) fn has_data(&self) -> bool {
        matches!(self.kind, EntryKind::File | EntryKind::HardLink)
    }

    pub(crate) fn metadata(&self) -> Metadata {
        let file_type = match self.kind {
            EntryKind::Directory => FileType::Directory,
            EntryKind::Symlink => FileType::Symlink,
            EntryKind::File | EntryKind::HardLink | EntryKind::Other => FileType::File,
        };
        Metadata {
            file_type,
            size: if self.has_data() { self.size } else { 0 },
            permissions: Permissions::from_mode(self.mode),
            modified: unix_time(self.mtime),
            uid: self.uid,
            gid: self.gid,
            implicit: self.implicit,
        }
    }
}

fn unix_time(secs: i64) -> SystemTime {
    let delta = Duration::from_secs(secs.unsigned_abs());
    let t = if secs >= 0 {
        SystemTime::UNIX_EPOCH.checked_add(delta)
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(delta)
    };
    t.unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Normalize an archive or lookup path to index form.
///
/// Returns `"."` for the root.
pub(crate) fn normalize(path: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err("contains a parent directory segment"),
            s => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(s);
            }
        }
    }
    if out.is_empty() {
        out.push_str(ROOT);
    }
    Ok(out)
}

/// Split a normalized non-root path into parent and final segment.
pub(crate) fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => (ROOT, path),
    }
}

/// Join a normalized directory path and a child name.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}

/// Why a lookup failed, before the caller attaches its own path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupError {
    NotFound,
    SymlinkLoop,
}

/// The immutable index. Shared read-only by every view and handle.
#[derive(Debug)]
pub(crate) struct Index {
    entries: HashMap<String, Entry>,
    children: HashMap<String, Vec<String>>,
}

impl Index {
    /// Index members in stream order.
    pub(crate) fn build(members: Vec<Member>) -> Result<Self, FsError> {
        let mut builder = Builder::new();
        for member in members {
            builder.insert(member)?;
        }
        builder.resolve_hard_links()?;
        Ok(builder.finish())
    }

    /// Look up a normalized path without following symlinks.
    pub(crate) fn get(&self, path: &str) -> Option<&Entry> {
        self.entries
            .get(path)
            .filter(|e| e.kind != EntryKind::Other)
    }

    /// Sorted child names of a directory.
    pub(crate) fn children(&self, dir: &str) -> Option<&[String]> {
        self.children.get(dir).map(Vec::as_slice)
    }

    /// Number of visible paths, root and synthesized directories included.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.kind != EntryKind::Other)
            .count()
    }

    /// Resolve a normalized path, following symlinks in every intermediate
    /// segment and, if `follow_last`, in the final one.
    ///
    /// Relative link targets resolve against the link's directory, absolute
    /// ones against the root; `..` never climbs above the root.
    pub(crate) fn resolve(
        &self,
        path: &str,
        follow_last: bool,
        max_hops: usize,
    ) -> Result<&Entry, LookupError> {
        let mut stack: Vec<String> = segments(path).rev().map(str::to_owned).collect();
        let mut current: Vec<String> = Vec::new();
        let mut hops = 0usize;
        let mut found = self.get(ROOT).ok_or(LookupError::NotFound)?;

        while let Some(segment) = stack.pop() {
            match segment.as_str() {
                "." => continue,
                ".." => {
                    current.pop();
                    found = self.get(&current_path(&current)).ok_or(LookupError::NotFound)?;
                    continue;
                }
                _ => {}
            }

            // Nothing lives beneath a non-directory.
            if found.kind != EntryKind::Directory {
                return Err(LookupError::NotFound);
            }
            current.push(segment);
            let candidate = current_path(&current);
            let entry = self.get(&candidate).ok_or(LookupError::NotFound)?;

            let is_last = stack.is_empty();
            if entry.kind == EntryKind::Symlink && (follow_last || !is_last) {
                hops += 1;
                if hops > max_hops {
                    return Err(LookupError::SymlinkLoop);
                }
                let target = entry.link_target.as_deref().unwrap_or_default();
                current.pop();
                if target.starts_with('/') {
                    current.clear();
                }
                stack.extend(segments(target).rev().map(str::to_owned));
                found = self.get(&current_path(&current)).ok_or(LookupError::NotFound)?;
                continue;
            }
            found = entry;
        }

        Ok(found)
    }
}

fn segments(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn current_path(segments: &[String]) -> String {
    if segments.is_empty() {
        ROOT.to_owned()
    } else {
        segments.join("/")
    }
}

struct Builder {
    entries: HashMap<String, Entry>,
    children: HashMap<String, Vec<String>>,
    /// Hard links whose data range is still unknown, with their header offset.
    unresolved: BTreeMap<String, u64>,
    skipped: usize,
}

impl Builder {
    fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(ROOT.to_owned(), Entry::directory(ROOT.to_owned()));
        Self {
            entries,
            children: HashMap::new(),
            unresolved: BTreeMap::new(),
            skipped: 0,
        }
    }

    fn insert(&mut self, member: Member) -> Result<(), FsError> {
        let offset = member.header_offset;
        let path = normalize(&member.name)
            .map_err(|reason| FsError::format(offset, format!("member {:?} {reason}", member.name)))?;

        if path == ROOT {
            if member.kind != MemberKind::Directory {
                return Err(FsError::format(offset, "archive root is not a directory"));
            }
            self.entries
                .insert(ROOT.to_owned(), Entry::from_member(path, member));
            return Ok(());
        }

        if let MemberKind::Other(flag) = member.kind {
            tracing::debug!(path = %path, type_flag = %char::from(flag), "skipping unsupported member");
            self.skipped += 1;
        }

        self.ensure_parents(&path, offset)?;

        if let Some(existing) = self.entries.get(&path) {
            let has_children = self.children.get(&path).is_some_and(|c| !c.is_empty());
            if existing.kind == EntryKind::Directory
                && member.kind != MemberKind::Directory
                && has_children
            {
                return Err(FsError::format(
                    offset,
                    format!("member {path:?} replaces a non-empty directory"),
                ));
            }
        }
        self.unresolved.remove(&path);

        let mut entry = Entry::from_member(path.clone(), member);
        if entry.kind == EntryKind::HardLink {
            let target = entry.link_target.as_deref().unwrap_or_default();
            let target = normalize(target).map_err(|reason| {
                FsError::format(offset, format!("hard link {path:?} target {reason}"))
            })?;
            entry.link_target = Some(target);
            if !self.link_to_target(&mut entry, offset)? {
                self.unresolved.insert(path.clone(), offset);
            }
        }

        let (parent, name) = split_parent(&path);
        let name = name.to_owned();
        self.children.entry(parent.to_owned()).or_default().push(name);
        self.entries.insert(path, entry);
        Ok(())
    }

    /// Synthesize any missing ancestor directories, outermost first.
    fn ensure_parents(&mut self, path: &str, offset: u64) -> Result<(), FsError> {
        let mut end = 0;
        while let Some(i) = path[end..].find('/') {
            let ancestor = &path[..end + i];
            end += i + 1;
            match self.entries.get(ancestor) {
                Some(e) if e.kind == EntryKind::Directory => {}
                Some(_) => {
                    return Err(FsError::format(
                        offset,
                        format!("member {path:?} is beneath non-directory {ancestor:?}"),
                    ));
                }
                None => {
                    self.entries
                        .insert(ancestor.to_owned(), Entry::directory(ancestor.to_owned()));
                    let (parent, name) = split_parent(ancestor);
                    self.children
                        .entry(parent.to_owned())
                        .or_default()
                        .push(name.to_owned());
                }
            }
        }
        Ok(())
    }

    /// Make a hard link share what its target is.
    ///
    /// Regular files lend their data range. A symlink target turns the link
    /// into a symlink with the same destination; an unsupported target makes
    /// the link unsupported too. Returns `Ok(false)` if the target is not
    /// known or not resolved yet.
    fn link_to_target(&self, link: &mut Entry, offset: u64) -> Result<bool, FsError> {
        let target_path = link.link_target.as_deref().unwrap_or_default();
        let Some(target) = self.entries.get(target_path) else {
            return Ok(false);
        };
        match target.kind {
            EntryKind::HardLink if self.unresolved.contains_key(target_path) => Ok(false),
            EntryKind::File | EntryKind::HardLink => {
                link.data_offset = target.data_offset;
                link.size = target.size;
                Ok(true)
            }
            EntryKind::Symlink => {
                let destination = target.link_target.as_deref().unwrap_or_default();
                let (link_dir, _) = split_parent(&link.path);
                let (target_dir, _) = split_parent(target_path);
                // Relative destinations are anchored at the target's directory.
                let destination = if destination.starts_with('/') || link_dir == target_dir {
                    destination.to_owned()
                } else if target_dir == ROOT {
                    format!("/{destination}")
                } else {
                    format!("/{target_dir}/{destination}")
                };
                link.kind = EntryKind::Symlink;
                link.link_target = Some(destination);
                link.size = 0;
                Ok(true)
            }
            EntryKind::Other => {
                tracing::debug!(path = %link.path, target = %target_path, "hard link to unsupported member");
                link.kind = EntryKind::Other;
                Ok(true)
            }
            EntryKind::Directory => Err(FsError::format(
                offset,
                format!(
                    "hard link {:?} points at directory {target_path:?}",
                    link.path
                ),
            )),
        }
    }

    fn resolve_hard_links(&mut self) -> Result<(), FsError> {
        while !self.unresolved.is_empty() {
            let mut progressed = false;
            let pending: Vec<(String, u64)> =
                self.unresolved.iter().map(|(p, o)| (p.clone(), *o)).collect();

            for (path, offset) in pending {
                let Some(mut link) = self.entries.get(&path).cloned() else {
                    continue;
                };
                let target = link.link_target.clone().unwrap_or_default();
                if !self.entries.contains_key(&target) {
                    return Err(FsError::format(
                        offset,
                        format!("hard link {path:?} target {target:?} not found in archive"),
                    ));
                }
                if self.link_to_target(&mut link, offset)? {
                    self.entries.insert(path.clone(), link);
                    self.unresolved.remove(&path);
                    progressed = true;
                }
            }

            if !progressed {
                let (path, offset) = self
                    .unresolved
                    .iter()
                    .next()
                    .map(|(p, o)| (p.clone(), *o))
                    .unwrap_or_default();
                return Err(FsError::format(
                    offset,
                    format!("hard link {path:?} is part of a circular chain"),
                ));
            }
        }
        Ok(())
    }

    fn finish(self) -> Index {
        let Builder {
            entries,
            mut children,
            skipped,
            ..
        } = self;

        let mut lists = HashMap::new();
        for (path, entry) in &entries {
            if entry.kind != EntryKind::Directory {
                continue;
            }
            let mut names = children.remove(path).unwrap_or_default();
            names.sort_unstable();
            names.dedup();
            names.retain(|name| {
                entries
                    .get(&join(path, name))
                    .is_some_and(|e| e.kind != EntryKind::Other)
            });
            lists.insert(path.clone(), names);
        }

        tracing::debug!(
            entries = entries.len(),
            directories = lists.len(),
            skipped,
            "indexed tar archive"
        );

        Index {
            entries,
            children: lists,
        }
    }
}
