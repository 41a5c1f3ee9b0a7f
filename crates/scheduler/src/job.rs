use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fairtick_core::JobStatus;

/// What a job body asks for after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Keep scheduling the job.
    Continue,
    /// The job is finished.
    Stop,
}

impl Continuation {
    pub fn should_continue(&self) -> bool {
        matches!(self, Continuation::Continue)
    }
}

impl From<bool> for Continuation {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Continuation::Continue
        } else {
            Continuation::Stop
        }
    }
}

/// A body that returns nothing is finished after its first call.
impl From<()> for Continuation {
    fn from(_: ()) -> Self {
        Continuation::Stop
    }
}

/// The unit of work invoked by the scheduler loop.
pub struct JobBody(Box<dyn FnMut() -> Continuation>);

impl JobBody {
    pub fn new<F, R>(mut body: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: Into<Continuation>,
    {
        JobBody(Box::new(move || body().into()))
    }

    pub(crate) fn call(&mut self) -> Continuation {
        (self.0)()
    }
}

impl fmt::Debug for JobBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JobBody(..)")
    }
}

/// Callback fired once when a job reaches `done`.
pub type DoneCallback = Box<dyn FnOnce()>;

/// Registry record for one job.
pub(crate) struct Job {
    pub id: String,
    /// Distinguishes this record from a later one registered under the same id.
    pub serial: u64,
    /// `None` while the body is being invoked or once the job is done.
    pub body: Option<JobBody>,
    pub weight: f64,
    pub count: Option<u32>,
    pub after: Vec<String>,
    pub on_done: Option<DoneCallback>,
    pub status: JobStatus,
    pub invocations: u64,
    pub average_duration: Duration,
    pub total_duration: Duration,
    pub credit: f64,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}

impl Job {
    /// Move the lifecycle forward. Backward or repeated transitions are ignored.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        self.status = next;
        match next {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Done => self.ended_at = Some(Utc::now()),
            JobStatus::Waiting => {}
        }
        true
    }

    /// Record one invocation's duration. The average is an exponential moving
    /// estimate; the first sample is taken as-is.
    pub fn record_invocation(&mut self, duration: Duration, smoothing: f64) {
        self.invocations += 1;
        self.total_duration += duration;

        self.average_duration = if self.invocations == 1 {
            duration
        } else {
            let prev = self.average_duration.as_secs_f64();
            let cur = duration.as_secs_f64();
            Duration::from_secs_f64((prev + smoothing * (cur - prev)).max(0.0))
        };
    }

    /// Whether the invocation cap has been reached.
    pub fn exhausted(&self) -> bool {
        self.count.is_some_and(|cap| self.invocations >= u64::from(cap))
    }
}

#[cfg(test)]
pub(crate) fn test_job(id: &str, status: JobStatus) -> Job {
    Job {
        id: id.to_string(),
        serial: 0,
        body: Some(JobBody::new(|| true)),
        weight: 1.0,
        count: None,
        after: Vec::new(),
        on_done: None,
        status,
        invocations: 0,
        average_duration: Duration::ZERO,
        total_duration: Duration::ZERO,
        credit: 0.0,
        added_at: Utc::now(),
        started_at: None,
        ended_at: None,
        failure: None,
    }
}
