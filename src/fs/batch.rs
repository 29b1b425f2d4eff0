//! Raw batched directory-query protocol
//!
//! Where no bulk "read entries with metadata" call exists, directory
//! listings come from a low-level query that fills a caller-supplied byte
//! buffer with a linked sequence of fixed-header + variable-length-name
//! records (`FILE_FULL_DIR_INFORMATION` layout, little-endian, UTF-16
//! names). This module owns everything about that protocol except the
//! syscall itself:
//!
//! - the [`DirQuery`] trait a backend implements to issue one query
//! - the buffer-growth loop: start at [`INITIAL_BUFFER_LEN`], double on
//!   "buffer too small" up to [`MAX_BUFFER_LEN`], retry without advancing
//! - the record framing parser, with explicit bounds checks on every
//!   offset and length before any field is read
//!
//! Keeping this free of platform types means the framing and growth
//! logic is unit-tested on any host against a synthetic query source.

use crate::error::EnumerateError;
use crate::record::{Entry, EntryKind};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Starting query buffer size
pub const INITIAL_BUFFER_LEN: usize = 64 * 1024;

/// Hard cap on buffer growth; an entry that does not fit is a fatal
/// enumeration error for its directory
pub const MAX_BUFFER_LEN: usize = 1 << 30;

/// Fixed portion of one record, up to the start of the name bytes
pub const RECORD_HEADER_LEN: usize = 68;

// Field offsets within the fixed header
const OFFSET_NEXT_ENTRY: usize = 0;
const OFFSET_LAST_WRITE_TIME: usize = 24;
const OFFSET_END_OF_FILE: usize = 40;
const OFFSET_FILE_ATTRIBUTES: usize = 56;
const OFFSET_FILE_NAME_LENGTH: usize = 60;

// Attribute bits, mirrored here so the parser compiles on every host
const ATTR_DIRECTORY: u32 = 0x0000_0010;
const ATTR_DEVICE: u32 = 0x0000_0040;
const ATTR_REPARSE_POINT: u32 = 0x0000_0400;

/// 100ns intervals between 1601-01-01 and the unix epoch
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;

/// Outcome of one directory query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The buffer holds `0..len` bytes of records
    Filled(usize),

    /// Not even one entry fit; grow the buffer and retry
    BufferTooSmall,

    /// The directory has been read to the end
    NoMoreEntries,
}

/// One batched directory query against an open handle
pub trait DirQuery {
    /// Fill `buf` with the next batch of records. `restart` is true only
    /// until the first batch has been returned; subsequent queries must
    /// continue from the current position, not from the first entry.
    fn query(&mut self, buf: &mut [u8], restart: bool) -> Result<QueryStatus, EnumerateError>;
}

/// Drive a query source to completion, parsing every batch
///
/// `.` and `..` are filtered by name. Buffer exhaustion below the hard
/// cap is transparent to the caller.
pub fn read_entries<Q: DirQuery>(query: &mut Q) -> Result<Vec<Entry>, EnumerateError> {
    let mut buf = vec![0u8; INITIAL_BUFFER_LEN];
    let mut restart = true;
    let mut entries = Vec::with_capacity(128);

    loop {
        match query.query(&mut buf, restart)? {
            QueryStatus::NoMoreEntries => break,
            QueryStatus::BufferTooSmall => {
                if buf.len() >= MAX_BUFFER_LEN {
                    return Err(EnumerateError::EntryTooLarge {
                        limit: MAX_BUFFER_LEN,
                    });
                }
                // Capped doubling; the retry repeats the same query, so no
                // already-consumed data is skipped.
                buf = vec![0u8; (buf.len() * 2).min(MAX_BUFFER_LEN)];
            }
            QueryStatus::Filled(len) => {
                restart = false;
                parse_batch(&buf[..len], &mut entries)?;
            }
        }
    }

    Ok(entries)
}

/// Parse one batch of linked records into entries
fn parse_batch(batch: &[u8], entries: &mut Vec<Entry>) -> Result<(), EnumerateError> {
    let mut offset = 0usize;

    loop {
        let rec = &batch[offset..];
        if rec.len() < RECORD_HEADER_LEN {
            return Err(EnumerateError::Framing("record header past end of batch"));
        }

        let next = read_u32(rec, OFFSET_NEXT_ENTRY) as usize;
        let mtime = read_i64(rec, OFFSET_LAST_WRITE_TIME);
        let size = read_i64(rec, OFFSET_END_OF_FILE);
        let attrs = read_u32(rec, OFFSET_FILE_ATTRIBUTES);
        let name_len = read_u32(rec, OFFSET_FILE_NAME_LENGTH) as usize;

        if name_len % 2 != 0 {
            return Err(EnumerateError::Framing("odd name byte length"));
        }
        if name_len > rec.len() - RECORD_HEADER_LEN {
            return Err(EnumerateError::Framing("name past end of batch"));
        }

        let name_bytes = &rec[RECORD_HEADER_LEN..RECORD_HEADER_LEN + name_len];
        let units: Vec<u16> = name_bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units);

        if name != "." && name != ".." {
            let kind = kind_from_attributes(attrs);
            entries.push(Entry {
                name,
                kind,
                size: (kind == EntryKind::File).then_some(size.max(0) as u64),
                mtime: filetime_to_system_time(mtime),
            });
        }

        if next == 0 {
            break;
        }
        if next < RECORD_HEADER_LEN {
            return Err(EnumerateError::Framing("next record offset inside current record"));
        }
        offset = match offset.checked_add(next) {
            Some(o) if o < batch.len() => o,
            _ => return Err(EnumerateError::Framing("next record offset past end of batch")),
        };
    }

    Ok(())
}

fn kind_from_attributes(attrs: u32) -> EntryKind {
    if attrs & ATTR_REPARSE_POINT != 0 {
        EntryKind::Symlink
    } else if attrs & ATTR_DIRECTORY != 0 {
        EntryKind::Directory
    } else if attrs & ATTR_DEVICE != 0 {
        EntryKind::Device
    } else {
        EntryKind::File
    }
}

/// Convert an NT FILETIME (100ns units since 1601) to a `SystemTime`.
/// Zero and pre-epoch values mean "not available".
pub(crate) fn filetime_to_system_time(value: i64) -> Option<SystemTime> {
    if value <= FILETIME_UNIX_EPOCH {
        return None;
    }
    let rel = value - FILETIME_UNIX_EPOCH;
    let secs = (rel / 10_000_000) as u64;
    let nanos = ((rel % 10_000_000) * 100) as u32;
    UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_i64(buf: &[u8], off: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    i64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTR_FILE_NORMAL: u32 = 0x80;

    /// Append one encoded record, padded to the next one when not last
    fn push_record(
        buf: &mut Vec<u8>,
        name: &str,
        attrs: u32,
        size: i64,
        mtime: i64,
        last: bool,
    ) {
        let name_units: Vec<u16> = name.encode_utf16().collect();
        let name_bytes = name_units.len() * 2;
        let record_len = RECORD_HEADER_LEN + name_bytes;
        // Records are 8-aligned in real batches
        let padded = record_len.div_ceil(8) * 8;
        let next = if last { 0 } else { padded as u32 };

        buf.extend_from_slice(&next.to_le_bytes()); // NextEntryOffset
        buf.extend_from_slice(&0u32.to_le_bytes()); // FileIndex
        buf.extend_from_slice(&0i64.to_le_bytes()); // CreationTime
        buf.extend_from_slice(&0i64.to_le_bytes()); // LastAccessTime
        buf.extend_from_slice(&mtime.to_le_bytes()); // LastWriteTime
        buf.extend_from_slice(&0i64.to_le_bytes()); // ChangeTime
        buf.extend_from_slice(&size.to_le_bytes()); // EndOfFile
        buf.extend_from_slice(&0i64.to_le_bytes()); // AllocationSize
        buf.extend_from_slice(&attrs.to_le_bytes()); // FileAttributes
        buf.extend_from_slice(&(name_bytes as u32).to_le_bytes()); // FileNameLength
        buf.extend_from_slice(&0u32.to_le_bytes()); // EaSize
        for unit in name_units {
            buf.extend_from_slice(&unit.to_le_bytes());
        }
        if !last {
            buf.resize(buf.len() + (padded - record_len), 0);
        }
    }

    /// Serves pre-built batches, refusing while the buffer is below
    /// `min_buffer`, and records the restart flag of every call
    struct FakeQuery {
        batches: Vec<Vec<u8>>,
        index: usize,
        min_buffer: usize,
        restarts: Vec<bool>,
    }

    impl FakeQuery {
        fn new(batches: Vec<Vec<u8>>) -> Self {
            Self {
                batches,
                index: 0,
                min_buffer: 0,
                restarts: Vec::new(),
            }
        }
    }

    impl DirQuery for FakeQuery {
        fn query(&mut self, buf: &mut [u8], restart: bool) -> Result<QueryStatus, EnumerateError> {
            self.restarts.push(restart);
            if buf.len() < self.min_buffer {
                return Ok(QueryStatus::BufferTooSmall);
            }
            if self.index >= self.batches.len() {
                return Ok(QueryStatus::NoMoreEntries);
            }
            let batch = &self.batches[self.index];
            if buf.len() < batch.len() {
                return Ok(QueryStatus::BufferTooSmall);
            }
            buf[..batch.len()].copy_from_slice(batch);
            self.index += 1;
            Ok(QueryStatus::Filled(batch.len()))
        }
    }

    #[test]
    fn parses_linked_records_across_batches() {
        let mut first = Vec::new();
        push_record(&mut first, "alpha.txt", ATTR_FILE_NORMAL, 10, FILETIME_UNIX_EPOCH + 10_000_000, false);
        push_record(&mut first, "sub", super::ATTR_DIRECTORY, 0, 0, true);
        let mut second = Vec::new();
        push_record(&mut second, "beta.bin", ATTR_FILE_NORMAL, 5, 0, true);

        let mut query = FakeQuery::new(vec![first, second]);
        let entries = read_entries(&mut query).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "alpha.txt");
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, Some(10));
        assert!(entries[0].mtime.is_some());
        assert_eq!(entries[1].name, "sub");
        assert_eq!(entries[1].kind, EntryKind::Directory);
        assert_eq!(entries[1].size, None);
        assert_eq!(entries[2].name, "beta.bin");
        assert_eq!(entries[2].size, Some(5));

        // Only the very first query restarts the scan
        assert_eq!(query.restarts, vec![true, false, false]);
    }

    #[test]
    fn filters_dot_entries() {
        let mut batch = Vec::new();
        push_record(&mut batch, ".", super::ATTR_DIRECTORY, 0, 0, false);
        push_record(&mut batch, "..", super::ATTR_DIRECTORY, 0, 0, false);
        push_record(&mut batch, "kept", ATTR_FILE_NORMAL, 1, 0, true);

        let mut query = FakeQuery::new(vec![batch]);
        let entries = read_entries(&mut query).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "kept");
    }

    #[test]
    fn classifies_attributes() {
        let mut batch = Vec::new();
        push_record(&mut batch, "link", super::ATTR_REPARSE_POINT | super::ATTR_DIRECTORY, 0, 0, false);
        push_record(&mut batch, "dev", super::ATTR_DEVICE, 0, 0, true);

        let mut query = FakeQuery::new(vec![batch]);
        let entries = read_entries(&mut query).unwrap();
        assert_eq!(entries[0].kind, EntryKind::Symlink);
        assert_eq!(entries[1].kind, EntryKind::Device);
    }

    #[test]
    fn grows_buffer_transparently() {
        // Force two doublings before the single entry fits
        let mut batch = Vec::new();
        push_record(&mut batch, "grown.txt", ATTR_FILE_NORMAL, 42, 0, true);
        let mut query = FakeQuery::new(vec![batch]);
        query.min_buffer = 200_000;

        let entries = read_entries(&mut query).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "grown.txt");
        assert_eq!(entries[0].size, Some(42));

        // Refused queries repeat with the restart flag unchanged
        assert_eq!(query.restarts, vec![true, true, true, false]);
    }

    #[test]
    fn buffer_growth_is_capped() {
        struct NeverFits;
        impl DirQuery for NeverFits {
            fn query(&mut self, _: &mut [u8], _: bool) -> Result<QueryStatus, EnumerateError> {
                Ok(QueryStatus::BufferTooSmall)
            }
        }

        let err = read_entries(&mut NeverFits).unwrap_err();
        assert!(matches!(err, EnumerateError::EntryTooLarge { limit } if limit == MAX_BUFFER_LEN));
    }

    #[test]
    fn truncated_header_is_framing_error() {
        let mut query = FakeQuery::new(vec![vec![0u8; RECORD_HEADER_LEN - 1]]);
        let err = read_entries(&mut query).unwrap_err();
        assert!(matches!(err, EnumerateError::Framing(_)));
    }

    #[test]
    fn name_overrun_is_framing_error() {
        let mut batch = Vec::new();
        push_record(&mut batch, "ok", ATTR_FILE_NORMAL, 0, 0, true);
        // Corrupt FileNameLength to point past the batch
        batch[OFFSET_FILE_NAME_LENGTH..OFFSET_FILE_NAME_LENGTH + 4]
            .copy_from_slice(&1000u32.to_le_bytes());

        let mut query = FakeQuery::new(vec![batch]);
        let err = read_entries(&mut query).unwrap_err();
        assert!(matches!(err, EnumerateError::Framing("name past end of batch")));
    }

    #[test]
    fn bogus_next_offset_is_framing_error() {
        let mut batch = Vec::new();
        push_record(&mut batch, "a", ATTR_FILE_NORMAL, 0, 0, false);
        push_record(&mut batch, "b", ATTR_FILE_NORMAL, 0, 0, true);
        // Corrupt the first record's next offset to land inside its header
        batch[OFFSET_NEXT_ENTRY..OFFSET_NEXT_ENTRY + 4].copy_from_slice(&4u32.to_le_bytes());

        let mut query = FakeQuery::new(vec![batch]);
        let err = read_entries(&mut query).unwrap_err();
        assert!(matches!(err, EnumerateError::Framing(_)));
    }

    #[test]
    fn filetime_conversion() {
        assert_eq!(filetime_to_system_time(0), None);
        assert_eq!(filetime_to_system_time(FILETIME_UNIX_EPOCH - 1), None);

        let t = filetime_to_system_time(FILETIME_UNIX_EPOCH + 15_000_000).unwrap();
        let since_epoch = t.duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(since_epoch, Duration::new(1, 500_000_000));
    }
}
