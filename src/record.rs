//! Record and entry types
//!
//! An [`Entry`] is one child discovered while enumerating a directory;
//! entries are produced by one enumerator call and consumed immediately
//! by the walker. A [`Record`] is the emitted, user-visible unit: one per
//! filesystem object, possibly annotated with the errors encountered
//! while producing it.

use crate::error::RecordError;
use std::path::Path;
use std::time::SystemTime;

/// Classification of a filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Device,
    CharDevice,
    Pipe,
    Socket,
    /// Unknown or irregular (the platform could not classify it)
    Other,
}

impl EntryKind {
    /// Single-letter type code used by both output formats
    pub fn as_char(self) -> char {
        match self {
            EntryKind::File => 'f',
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
            EntryKind::Device => 'D',
            EntryKind::CharDevice => 'c',
            EntryKind::Pipe => 'p',
            EntryKind::Socket => 'S',
            EntryKind::Other => '?',
        }
    }

    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }
}

/// One child discovered during enumeration of a directory
///
/// `size` and `mtime` are populated only by backends whose listing
/// primitive carries them (the batched Windows query); the unix backend
/// leaves them empty and the walker stats the child separately when
/// metadata collection is enabled.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Bare name, no path separators
    pub name: String,

    pub kind: EntryKind,

    /// Size in bytes, files only
    pub size: Option<u64>,

    /// Last modification time
    pub mtime: Option<SystemTime>,
}

/// Per-child metadata gathered on demand by the platform backend
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildMeta {
    pub size: Option<u64>,
    pub mtime: Option<SystemTime>,
}

/// The emitted representation of one filesystem object
#[derive(Debug)]
pub struct Record {
    /// Slash-normalized path, relative or absolute depending on the root
    pub path: String,

    pub kind: EntryKind,

    /// Size in bytes, files only, metadata collection only
    pub size: Option<u64>,

    /// Last modification time, metadata collection only
    pub mtime: Option<SystemTime>,

    /// Errors encountered while opening, enumerating or stat-ing this
    /// object. A record with errors is still emitted.
    pub errors: Vec<RecordError>,
}

impl Record {
    pub fn new(path: String, kind: EntryKind) -> Self {
        Self {
            path,
            kind,
            size: None,
            mtime: None,
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All errors joined for rendering
    pub fn join_errors(&self) -> String {
        let mut out = String::new();
        for (i, err) in self.errors.iter().enumerate() {
            if i != 0 {
                out.push_str("; ");
            }
            out.push_str(&err.to_string());
        }
        out
    }
}

/// Join a child name onto a base path, always with forward slashes
pub fn child_path(base: &str, name: &str) -> String {
    if base == "." {
        return format!("./{name}");
    }
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Path rendered for output, slash-normalized regardless of platform
pub fn display_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}
