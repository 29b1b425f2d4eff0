//! Process-wide cancellation
//!
//! A one-shot token pair built on a zero-capacity crossbeam channel.
//! [`CancelHandle::cancel`] drops the sender; every clone of
//! [`CancelToken`] then observes the disconnect, both from a non-blocking
//! poll and from a `select!` racing a blocking operation against it.
//!
//! Cancellation is cooperative: tasks check the token at loop boundaries
//! and at every blocking record send. In-flight filesystem calls are not
//! forcibly aborted.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;

/// The triggering side, handed to the signal handler
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<Mutex<Option<Sender<()>>>>,
}

/// The observing side, cloned into every traversal task
#[derive(Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

/// Create a connected handle/token pair
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = bounded(0);
    (
        CancelHandle {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        CancelToken { rx },
    )
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.lock().take();
    }
}

impl CancelToken {
    /// Has cancellation been requested?
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// The raw receiver, for racing against a blocking send in `select!`.
    /// It never yields a message; it only disconnects.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}
