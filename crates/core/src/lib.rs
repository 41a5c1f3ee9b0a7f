pub mod config;
pub mod error;
pub mod status;

pub use config::SchedulerConfig;
pub use error::*;
pub use status::JobStatus;
