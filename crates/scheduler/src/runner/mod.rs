//! Scheduler loop -- the public handle, job lifecycle transitions, and ticks.
//!
//! Split into focused submodules:
//! - `core`: Scheduler handle, constructor, registration/removal, and queries
//! - `scheduling`: state transitions (insert, activate, finish) under the borrow
//! - `execution`: the per-tick dispatch loop and side-effect flushing

mod core;
mod execution;
mod scheduling;

pub use self::core::Scheduler;
pub use self::execution::TickReport;
