//! The traversal engine
//!
//! Each directory is one traversal task: own the handle, optionally stat
//! it, enumerate it, emit its record before any child's, then resolve
//! every child to a terminal outcome. Subdirectories become concurrently
//! scheduled tasks while the admission budget grants slots and plain
//! nested calls once it refuses; refusal never waits.
//!
//! Records flow over one bounded channel to the single consumer. The
//! channel closes itself: every task holds a clone of the sender through
//! the shared walker, so the receiver disconnects exactly when the last
//! task finishes or abandons its subtree.

use crate::cancel::CancelToken;
use crate::error::{FindError, RecordError};
use crate::fs::DirectoryProvider;
use crate::record::{child_path, display_path, EntryKind, Record};
use crate::walker::budget::AdmissionBudget;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

/// Default admission budget
pub const DEFAULT_MAX_TASKS: usize = 512;

/// Records buffered per admitted task before senders block
const CHANNEL_DEPTH_PER_TASK: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Collect sizes and modification times
    pub metadata: bool,

    /// Cap on concurrently running traversal tasks
    pub max_tasks: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            metadata: false,
            max_tasks: DEFAULT_MAX_TASKS,
        }
    }
}

/// Start walking `root`, returning the record stream
///
/// The root directory is opened before this returns; failure there is
/// fatal since there is no tree to walk. The stream ends when every
/// traversal task has finished or been cancelled.
pub fn walk<P: DirectoryProvider>(
    provider: P,
    root: &Path,
    options: WalkOptions,
    cancel: CancelToken,
) -> Result<Receiver<Record>, FindError> {
    let handle = provider.open(root).map_err(|source| FindError::RootOpen {
        path: root.to_path_buf(),
        source,
    })?;

    let max_tasks = options.max_tasks.max(1);
    let (out, records) = bounded(max_tasks * CHANNEL_DEPTH_PER_TASK);
    let walker = Arc::new(Walker {
        provider,
        out,
        cancel,
        budget: AdmissionBudget::new(max_tasks),
        metadata: options.metadata,
    });

    let root_path = display_path(root);
    let permit = walker.budget.try_acquire(); // fresh budget, never refused
    thread::Builder::new()
        .name("walker".into())
        .spawn(move || {
            let _permit = permit;
            walker.walk_dir(&root_path, handle);
        })
        .map_err(FindError::Spawn)?;

    Ok(records)
}

struct Walker<P: DirectoryProvider> {
    provider: P,
    out: Sender<Record>,
    cancel: CancelToken,
    budget: Arc<AdmissionBudget>,
    metadata: bool,
}

impl<P: DirectoryProvider> Walker<P> {
    /// One traversal task, from ENTER to DONE. The handle is released on
    /// every exit path when it drops with this frame.
    fn walk_dir(self: &Arc<Self>, path: &str, handle: P::Handle) {
        let mut record = Record::new(path.to_string(), EntryKind::Directory);

        if self.metadata {
            match self.provider.handle_mtime(&handle) {
                Ok(mtime) => record.mtime = Some(mtime),
                Err(err) => record.errors.push(RecordError::Stat(err)),
            }
        }

        let entries = match self.provider.enumerate(&handle) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(path, error = %err, "enumeration failed");
                record.errors.push(RecordError::Enumerate(err));
                self.send(record);
                return; // terminal for this subtree only
            }
        };

        // A directory's record precedes all of its children's
        if !self.send(record) {
            return;
        }
        trace!(path, entries = entries.len(), "directory enumerated");

        for entry in entries {
            if self.cancel.is_cancelled() {
                return;
            }

            let mut child = Record::new(child_path(path, &entry.name), entry.kind);
            let mut subdir = None;

            if entry.kind.is_dir() {
                match self.provider.open_relative(&handle, &entry.name) {
                    Ok(opened) => subdir = Some(opened),
                    Err(err) => {
                        debug!(path = %child.path, error = %err, "child open failed");
                        child.errors.push(RecordError::Open(err));
                    }
                }
            } else if self.metadata {
                match self.provider.child_metadata(&handle, &entry) {
                    Ok(meta) => {
                        child.size = meta.size;
                        child.mtime = meta.mtime;
                    }
                    Err(err) => child.errors.push(RecordError::Stat(err)),
                }
            }

            match subdir {
                // The child task emits its own record at ENTER
                Some(opened) => self.descend(child.path, opened),
                None => {
                    if !self.send(child) {
                        return;
                    }
                }
            }
        }
    }

    /// Schedule a subdirectory: concurrent task if a slot is granted,
    /// inline nested call under the parent's slot otherwise
    fn descend(self: &Arc<Self>, path: String, handle: P::Handle) {
        let Some(permit) = self.budget.try_acquire() else {
            self.walk_dir(&path, handle);
            return;
        };

        // The closure owns the task through a shared cell so a failed
        // spawn can reclaim it for the inline fallback
        let task = Arc::new(Mutex::new(Some((path, handle))));
        let walker = Arc::clone(self);
        let claimed = Arc::clone(&task);
        let spawned = thread::Builder::new().name("walker".into()).spawn(move || {
            let _permit = permit;
            if let Some((path, handle)) = claimed.lock().take() {
                walker.walk_dir(&path, handle);
            }
        });

        if let Err(err) = spawned {
            debug!(error = %err, "task spawn failed, walking inline");
            if let Some((path, handle)) = task.lock().take() {
                self.walk_dir(&path, handle);
            }
        }
    }

    /// Blocking record send raced against cancellation.
    /// Returns false when the task should abandon its subtree.
    fn send(&self, record: Record) -> bool {
        let out = &self.out;
        let cancelled = self.cancel.receiver();
        select! {
            send(out, record) -> sent => sent.is_ok(),
            recv(cancelled) -> _ => false,
        }
    }
}
