//! Admission budget for traversal tasks
//!
//! A counting gate over an atomic, shared by every task in the tree.
//! Acquisition never blocks: [`AdmissionBudget::try_acquire`] either
//! hands out an RAII [`Permit`] or refuses, and refusal means the caller
//! walks the subdirectory inline under its own slot. That non-blocking
//! contract is the liveness guarantee; there is no state in which a task
//! waits on a slot held by a task waiting on it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed cap on concurrently running traversal tasks
pub struct AdmissionBudget {
    limit: usize,
    active: AtomicUsize,
}

impl AdmissionBudget {
    pub fn new(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            limit: limit.max(1),
            active: AtomicUsize::new(0),
        })
    }

    /// Claim one slot if any is free. Never blocks.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()
            .map(|_| Permit {
                budget: Arc::clone(self),
            })
    }

    /// Currently admitted tasks
    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// One admitted slot, released on drop
pub struct Permit {
    budget: Arc<AdmissionBudget>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.budget.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_up_to_limit() {
        let budget = AdmissionBudget::new(2);

        let a = budget.try_acquire();
        let b = budget.try_acquire();
        assert!(a.is_some());
        assert!(b.is_some());
        assert_eq!(budget.in_flight(), 2);

        // Exhausted: refusal, not blocking
        assert!(budget.try_acquire().is_none());

        drop(a);
        assert_eq!(budget.in_flight(), 1);
        assert!(budget.try_acquire().is_some());
        drop(b);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let budget = AdmissionBudget::new(0);
        assert_eq!(budget.limit(), 1);
        assert!(budget.try_acquire().is_some());
    }
}
