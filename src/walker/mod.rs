//! Walker / scheduler
//!
//! The recursive traversal engine and the admission budget that caps how
//! many traversal tasks run concurrently.

mod budget;
mod engine;

pub use budget::{AdmissionBudget, Permit};
pub use engine::{walk, WalkOptions, DEFAULT_MAX_TASKS};
