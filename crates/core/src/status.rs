use serde::{Deserialize, Serialize};

/// Lifecycle stage of a job. Transitions only move forward one stage at a
/// time: `Waiting -> Running -> Done`. A job with no outstanding
/// prerequisites enters at `Running`; nothing reaches `Done` without passing
/// through `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Blocked on at least one prerequisite that has not reached `Done`.
    Waiting,
    /// Eligible for invocation by the scheduler loop.
    Running,
    /// Finished; kept for inspection until history is cleared.
    Done,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [JobStatus::Waiting, JobStatus::Running, JobStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
        }
    }

    /// Whether `next` is the stage directly after `self`.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Waiting, JobStatus::Running) | (JobStatus::Running, JobStatus::Done)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobStatus::Waiting),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}
