//! fastfind - Concurrent Directory Tree Walker
//!
//! A tool for enumerating directory trees on high-latency filesystems
//! (network mounts in particular), streaming one record per filesystem
//! object to stdout as CSV or a quoted tab-separated stream.
//!
//! # Features
//!
//! - **Bounded parallelism**: A fixed admission budget caps the number of
//!   concurrently running traversal tasks. When the budget is exhausted,
//!   subdirectories are walked inline on the parent's stack instead of
//!   waiting for a slot, so admission refusal never blocks.
//!
//! - **Handle-relative descent**: Subdirectories are opened relative to
//!   their parent's handle (`openat` / `NtCreateFile` with a root handle),
//!   avoiding repeated path resolution over a slow transport and staying
//!   race-free against concurrent renames of ancestors.
//!
//! - **Batched metadata on Windows**: Directory listings come from
//!   `NtQueryDirectoryFile` with `FileFullDirectoryInformation`, which
//!   carries name, attributes, size and mtime in one round trip per batch
//!   instead of a stat call per entry.
//!
//! - **Errors annotate, never abort**: A directory that cannot be opened
//!   or listed produces a record carrying the error; its siblings and the
//!   rest of the tree are walked normally.
//!
//! # Architecture
//!
//! ```text
//! traversal tasks (spawned up to the admission budget,
//!                  inline recursion beyond it)
//!       │ Record
//!       ▼
//! bounded crossbeam channel ───► renderer (CSV / TSV on stdout)
//!       ▲
//!       │ cancellation (SIGINT / SIGTERM)
//! ```
//!
//! # Example
//!
//! ```bash
//! # Walk the current directory
//! fastfind
//!
//! # Walk a network mount with metadata, 128 concurrent tasks
//! fastfind /mnt/share --stat -j 128
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod fs;
pub mod output;
pub mod record;
pub mod walker;

pub use record::{EntryKind, Record};
