//! Unix directory backend
//!
//! Directories are opened as `O_DIRECTORY` descriptors; children are
//! opened with `openat` relative to the parent descriptor. Enumeration
//! reads the whole directory through `readdir` on a duplicated
//! descriptor (`fdopendir` takes ownership of the one it is given, and
//! the original must stay open for `openat`/`fstatat` on the children).
//! Entry kinds come from `d_type`; sizes and mtimes come from a
//! per-child `fstatat` only when metadata collection asks for them.

use crate::error::EnumerateError;
use crate::fs::DirectoryProvider;
use crate::record::{ChildMeta, Entry, EntryKind};
use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The build-time provider for unix hosts
pub struct LocalFs;

/// An exclusively owned open directory descriptor
pub struct DirHandle {
    fd: OwnedFd,
}

impl DirectoryProvider for LocalFs {
    type Handle = DirHandle;

    fn open(&self, path: &Path) -> io::Result<DirHandle> {
        let c_path = cstring(path.as_os_str().as_bytes())?;
        let fd = unsafe {
            libc::open(
                c_path.as_ptr(),
                libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(DirHandle {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    fn open_relative(&self, parent: &DirHandle, name: &str) -> io::Result<DirHandle> {
        let c_name = cstring(name.as_bytes())?;
        // O_NOFOLLOW: the entry was classified as a directory from its
        // d_type; refuse a symlink racily swapped in since.
        let fd = unsafe {
            libc::openat(
                parent.fd.as_raw_fd(),
                c_name.as_ptr(),
                libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOFOLLOW,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(DirHandle {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    fn handle_mtime(&self, handle: &DirHandle) -> io::Result<SystemTime> {
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::fstat(handle.fd.as_raw_fd(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(mtime_from_stat(&stat))
    }

    fn enumerate(&self, handle: &DirHandle) -> Result<Vec<Entry>, EnumerateError> {
        let dup = unsafe { libc::fcntl(handle.fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 0) };
        if dup < 0 {
            return Err(EnumerateError::Query(io::Error::last_os_error()));
        }
        let dir = unsafe { libc::fdopendir(dup) };
        if dir.is_null() {
            let err = io::Error::last_os_error();
            unsafe { libc::close(dup) };
            return Err(EnumerateError::Query(err));
        }
        let dir = DirStream(dir);
        // The duplicate shares the original descriptor's read offset
        unsafe { libc::rewinddir(dir.0) };

        let mut entries = Vec::new();
        loop {
            // readdir signals errors through errno; end-of-directory
            // returns null with errno untouched
            unsafe { *errno_location() = 0 };
            let ent = unsafe { libc::readdir(dir.0) };
            if ent.is_null() {
                let err = io::Error::last_os_error();
                if err.raw_os_error().unwrap_or(0) != 0 {
                    return Err(EnumerateError::Query(err));
                }
                break;
            }

            let name = unsafe { CStr::from_ptr((*ent).d_name.as_ptr()) };
            let bytes = name.to_bytes();
            if bytes == b"." || bytes == b".." {
                continue;
            }
            entries.push(Entry {
                name: String::from_utf8_lossy(bytes).into_owned(),
                kind: kind_from_dtype(unsafe { (*ent).d_type }),
                size: None,
                mtime: None,
            });
        }

        Ok(entries)
    }

    fn child_metadata(&self, handle: &DirHandle, entry: &Entry) -> io::Result<ChildMeta> {
        let c_name = cstring(entry.name.as_bytes())?;
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::fstatat(
                handle.fd.as_raw_fd(),
                c_name.as_ptr(),
                &mut stat,
                libc::AT_SYMLINK_NOFOLLOW,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ChildMeta {
            size: (entry.kind == EntryKind::File).then_some(stat.st_size.max(0) as u64),
            mtime: Some(mtime_from_stat(&stat)),
        })
    }
}

/// Owned `DIR*`, closed exactly once even on error paths
struct DirStream(*mut libc::DIR);

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe { libc::closedir(self.0) };
    }
}

fn cstring(bytes: &[u8]) -> io::Result<CString> {
    CString::new(bytes)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL byte"))
}

fn kind_from_dtype(d_type: u8) -> EntryKind {
    match d_type {
        libc::DT_REG => EntryKind::File,
        libc::DT_DIR => EntryKind::Directory,
        libc::DT_LNK => EntryKind::Symlink,
        libc::DT_BLK => EntryKind::Device,
        libc::DT_CHR => EntryKind::CharDevice,
        libc::DT_FIFO => EntryKind::Pipe,
        libc::DT_SOCK => EntryKind::Socket,
        _ => EntryKind::Other,
    }
}

fn mtime_from_stat(stat: &libc::stat) -> SystemTime {
    system_time(stat.st_mtime as i64, stat.st_mtime_nsec as i64)
}

fn system_time(secs: i64, nanos: i64) -> SystemTime {
    let nanos = nanos.clamp(0, 999_999_999) as u32;
    if secs >= 0 {
        UNIX_EPOCH
            .checked_add(Duration::new(secs as u64, nanos))
            .unwrap_or(UNIX_EPOCH)
    } else {
        UNIX_EPOCH
            .checked_sub(Duration::new(secs.unsigned_abs(), 0))
            .and_then(|t| t.checked_add(Duration::new(0, nanos)))
            .unwrap_or(UNIX_EPOCH)
    }
}

#[cfg(target_os = "linux")]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(not(target_os = "linux"))]
fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}
