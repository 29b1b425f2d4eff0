//! Windows directory backend
//!
//! Directories open via `CreateFileW` with backup semantics (root) or
//! `NtCreateFile` relative to the parent handle (children). Enumeration
//! uses the raw batched `NtQueryDirectoryFile` protocol with
//! `FileFullDirectoryInformation`, which returns name, attributes, size
//! and last-write time in each record, so no per-entry stat call is ever
//! issued. Framing and buffer growth live in [`crate::fs::batch`].

use crate::error::EnumerateError;
use crate::fs::batch::{self, DirQuery, QueryStatus};
use crate::fs::DirectoryProvider;
use crate::record::{ChildMeta, Entry};
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle};
use std::path::Path;
use std::time::SystemTime;

use windows_sys::Wdk::Foundation::OBJECT_ATTRIBUTES;
use windows_sys::Wdk::Storage::FileSystem::{
    FileFullDirectoryInformation, NtCreateFile, NtQueryDirectoryFile, FILE_DIRECTORY_FILE,
    FILE_OPEN, FILE_OPEN_FOR_BACKUP_INTENT, FILE_SYNCHRONOUS_IO_NONALERT,
};
use windows_sys::Win32::Foundation::{
    HANDLE, INVALID_HANDLE_VALUE, STATUS_BUFFER_OVERFLOW, STATUS_BUFFER_TOO_SMALL,
    STATUS_INFO_LENGTH_MISMATCH, STATUS_NO_MORE_FILES, STATUS_SUCCESS, UNICODE_STRING,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION,
    FILE_ATTRIBUTE_DIRECTORY, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT,
    FILE_LIST_DIRECTORY, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
    SYNCHRONIZE,
};
use windows_sys::Win32::System::Kernel::OBJ_CASE_INSENSITIVE;
use windows_sys::Win32::System::IO::IO_STATUS_BLOCK;

/// The build-time provider for windows hosts
pub struct LocalFs;

/// An exclusively owned open directory handle
pub struct DirHandle {
    handle: OwnedHandle,
}

impl DirHandle {
    fn raw(&self) -> HANDLE {
        self.handle.as_raw_handle() as HANDLE
    }
}

impl DirectoryProvider for LocalFs {
    type Handle = DirHandle;

    fn open(&self, path: &Path) -> io::Result<DirHandle> {
        let wide = to_wide(&native_path(path));
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                FILE_LIST_DIRECTORY | SYNCHRONIZE,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                std::ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OPEN_REPARSE_POINT,
                std::ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        Ok(DirHandle {
            handle: unsafe { OwnedHandle::from_raw_handle(handle as _) },
        })
    }

    fn open_relative(&self, parent: &DirHandle, name: &str) -> io::Result<DirHandle> {
        let mut wide: Vec<u16> = name.encode_utf16().collect();
        let byte_len = (wide.len() * 2) as u16;
        let unicode = UNICODE_STRING {
            Length: byte_len,
            MaximumLength: byte_len,
            Buffer: wide.as_mut_ptr(),
        };
        let attributes = OBJECT_ATTRIBUTES {
            Length: std::mem::size_of::<OBJECT_ATTRIBUTES>() as u32,
            RootDirectory: parent.raw(),
            ObjectName: &unicode,
            Attributes: OBJ_CASE_INSENSITIVE as u32,
            SecurityDescriptor: std::ptr::null(),
            SecurityQualityOfService: std::ptr::null(),
        };

        let mut iosb: IO_STATUS_BLOCK = unsafe { std::mem::zeroed() };
        let mut handle: HANDLE = std::ptr::null_mut();
        let status = unsafe {
            NtCreateFile(
                &mut handle,
                FILE_LIST_DIRECTORY | SYNCHRONIZE,
                &attributes,
                &mut iosb,
                std::ptr::null(),
                FILE_ATTRIBUTE_DIRECTORY,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                FILE_OPEN,
                FILE_DIRECTORY_FILE | FILE_SYNCHRONOUS_IO_NONALERT | FILE_OPEN_FOR_BACKUP_INTENT,
                std::ptr::null(),
                0,
            )
        };
        if status != STATUS_SUCCESS {
            return Err(nt_error(status));
        }
        Ok(DirHandle {
            handle: unsafe { OwnedHandle::from_raw_handle(handle as _) },
        })
    }

    fn handle_mtime(&self, handle: &DirHandle) -> io::Result<SystemTime> {
        let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };
        let ok = unsafe { GetFileInformationByHandle(handle.raw(), &mut info) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        let filetime = ((info.ftLastWriteTime.dwHighDateTime as i64) << 32)
            | info.ftLastWriteTime.dwLowDateTime as i64;
        batch::filetime_to_system_time(filetime)
            .ok_or_else(|| io::Error::other("file time not available"))
    }

    fn enumerate(&self, handle: &DirHandle) -> Result<Vec<Entry>, EnumerateError> {
        let mut query = NtDirQuery {
            handle: handle.raw(),
        };
        batch::read_entries(&mut query)
    }

    fn child_metadata(&self, _handle: &DirHandle, entry: &Entry) -> io::Result<ChildMeta> {
        // The batched query already delivered size and mtime
        Ok(ChildMeta {
            size: entry.size,
            mtime: entry.mtime,
        })
    }
}

/// One `NtQueryDirectoryFile` call per query
struct NtDirQuery {
    handle: HANDLE,
}

impl DirQuery for NtDirQuery {
    fn query(&mut self, buf: &mut [u8], restart: bool) -> Result<QueryStatus, EnumerateError> {
        let mut iosb: IO_STATUS_BLOCK = unsafe { std::mem::zeroed() };
        let status = unsafe {
            NtQueryDirectoryFile(
                self.handle,
                std::ptr::null_mut(),
                None,
                std::ptr::null(),
                &mut iosb,
                buf.as_mut_ptr().cast(),
                buf.len() as u32,
                FileFullDirectoryInformation,
                0, // return as many entries as fit
                std::ptr::null(),
                restart as u8,
            )
        };

        match status {
            STATUS_SUCCESS | STATUS_BUFFER_OVERFLOW | STATUS_BUFFER_TOO_SMALL
            | STATUS_INFO_LENGTH_MISMATCH => {
                let written = iosb.Information;
                if written == 0 {
                    Ok(QueryStatus::BufferTooSmall)
                } else {
                    Ok(QueryStatus::Filled(written))
                }
            }
            STATUS_NO_MORE_FILES => Ok(QueryStatus::NoMoreEntries),
            other => Err(EnumerateError::Query(nt_error(other))),
        }
    }
}

fn nt_error(status: i32) -> io::Error {
    io::Error::other(format!("NTSTATUS {status:#010x}"))
}

fn to_wide(s: &std::ffi::OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

/// Extended-length path so deep trees and reserved names keep working
fn native_path(path: &Path) -> std::ffi::OsString {
    use std::ffi::OsString;

    let raw = path.as_os_str();
    let text = raw.to_string_lossy();
    if text.starts_with(r"\\?\") || text.starts_with(r"\??\") {
        return raw.to_os_string();
    }
    if path.is_absolute() {
        let backslashed = text.replace('/', r"\");
        if let Some(unc) = backslashed.strip_prefix(r"\\") {
            return OsString::from(format!(r"\\?\UNC\{unc}"));
        }
        return OsString::from(format!(r"\\?\{backslashed}"));
    }
    raw.to_os_string()
}
