//! Error types for fastfind
//!
//! Two families live here:
//! - per-record errors ([`RecordError`], [`EnumerateError`]) that attach to
//!   the record of the object that produced them; the walk continues
//! - fatal errors ([`FindError`], [`ConfigError`]) that terminate the run
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - A failure to open, list or stat one object never aborts the tree;
//!   it rides along on that object's record
//! - Cancellation is not an error and has no variant here

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that terminate the whole run
#[derive(Error, Debug)]
pub enum FindError {
    /// The root directory could not be opened; there is no tree to walk
    #[error("cannot open root directory '{path}': {source}")]
    RootOpen { path: PathBuf, source: io::Error },

    /// The root traversal task could not be started
    #[error("failed to start traversal task: {0}")]
    Spawn(#[source] io::Error),
}

/// An error attached to an individual record
///
/// Ordered by where in the traversal it occurred: opening the object,
/// listing its contents, or reading its metadata.
#[derive(Error, Debug)]
pub enum RecordError {
    /// Could not open this directory (root open uses [`FindError`] instead)
    #[error("open failed: {0}")]
    Open(#[source] io::Error),

    /// Could not list this directory's contents
    #[error("read dir failed: {0}")]
    Enumerate(#[source] EnumerateError),

    /// Could not stat this entry
    #[error("stat failed: {0}")]
    Stat(#[source] io::Error),
}

/// Errors from the directory enumerator, either strategy
#[derive(Error, Debug)]
pub enum EnumerateError {
    /// The underlying listing call failed
    #[error("directory query failed: {0}")]
    Query(#[from] io::Error),

    /// The batched query returned bytes that do not frame as records.
    /// This is a producer/consumer bug, never end-of-directory.
    #[error("malformed directory data: {0}")]
    Framing(&'static str),

    /// A single entry did not fit even the maximum query buffer
    #[error("directory entry exceeds {limit} byte query buffer")]
    EntryTooLarge { limit: usize },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid admission budget
    #[error("invalid task limit {count}: must be between 1 and {max}")]
    InvalidMaxTasks { count: usize, max: usize },
}
