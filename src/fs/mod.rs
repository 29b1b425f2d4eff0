//! Platform directory access
//!
//! One interface, two build-time implementations:
//! - unix: `open`/`openat` descriptors, `readdir` on a duplicated
//!   descriptor, `fstat`/`fstatat` for metadata
//! - windows: `CreateFileW`/`NtCreateFile` handles and the raw batched
//!   `NtQueryDirectoryFile` protocol (see [`batch`]), which carries size
//!   and mtime in the listing itself
//!
//! Handles are exclusively owned and close themselves on drop, so every
//! exit path of a traversal task, including cancellation, releases them.

pub mod batch;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{DirHandle, LocalFs};
#[cfg(windows)]
pub use windows::{DirHandle, LocalFs};

use crate::error::EnumerateError;
use crate::record::{ChildMeta, Entry};
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Directory handles and enumeration for one platform
///
/// The walker is generic over this trait; production code uses the
/// build-time [`LocalFs`] implementation, tests substitute synthetic
/// trees and injected failures.
pub trait DirectoryProvider: Send + Sync + 'static {
    /// An exclusively owned open directory, closed on drop
    type Handle: Send + 'static;

    /// Open a directory by path. Anything that is not an existing,
    /// accessible directory is an error.
    fn open(&self, path: &Path) -> io::Result<Self::Handle>;

    /// Open a child directory relative to an open parent handle, without
    /// re-resolving the parent's path
    fn open_relative(&self, parent: &Self::Handle, name: &str) -> io::Result<Self::Handle>;

    /// Modification time of the directory the handle refers to
    fn handle_mtime(&self, handle: &Self::Handle) -> io::Result<SystemTime>;

    /// All direct children of the directory, order irrelevant,
    /// `.` and `..` excluded
    fn enumerate(&self, handle: &Self::Handle) -> Result<Vec<Entry>, EnumerateError>;

    /// Size and mtime for one non-directory child. Backends whose
    /// listing already carried the metadata return it from the entry.
    fn child_metadata(&self, handle: &Self::Handle, entry: &Entry) -> io::Result<ChildMeta>;
}
