//! Cooperative, single-threaded job scheduler with weighted fairness.
//!
//! Many small recurring jobs are multiplexed over one thread. An external
//! [`TickSource`] calls [`Scheduler::tick`]; each tick the fairness allocator
//! picks the running jobs that still hold credit, invokes each of them once,
//! and charges them for the measured duration divided by their weight.
//! Jobs may declare prerequisites (`after`), a hard invocation cap (`count`)
//! and a completion callback (`on_done`).
//!
//! The scheduler suspends its tick source when nothing is running and resumes
//! it as soon as a job enters the running state.

mod allocator;
pub mod clock;
pub mod events;
pub mod job;
pub mod registration;
mod registry;
mod resolver;
pub mod runner;
pub mod stats;
pub mod ticker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{ListenerId, SchedulerEvent};
pub use fairtick_core::{ConfigError, JobStatus, Result, SchedulerConfig, SchedulerError};
pub use job::{Continuation, JobBody};
pub use registration::{job, JobDescriptor, JobEntry, JobIds, Registration};
pub use runner::{Scheduler, TickReport};
pub use stats::{IdMatcher, JobSnapshot, StatsFilter};
pub use ticker::{IntervalTicker, ManualTicker, TickSource};
