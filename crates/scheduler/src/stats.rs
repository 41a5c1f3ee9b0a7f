//! Read-only, filtered projection over the job registry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use fairtick_core::JobStatus;
use regex::Regex;
use serde::Serialize;

use crate::job::Job;
use crate::resolver::DependencyResolver;

/// Lightweight copy of a job's state at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub weight: f64,
    pub count: Option<u32>,
    pub invocations: u64,
    pub average_duration: Duration,
    pub total_duration: Duration,
    pub credit: f64,
    /// Prerequisites as declared.
    pub after: Vec<String>,
    /// Prerequisites not done yet.
    pub pending_after: Vec<String>,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Panic message, when the body panicked.
    pub failure: Option<String>,
}

impl JobSnapshot {
    pub(crate) fn capture(job: &Job, resolver: &DependencyResolver) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            weight: job.weight,
            count: job.count,
            invocations: job.invocations,
            average_duration: job.average_duration,
            total_duration: job.total_duration,
            credit: job.credit,
            after: job.after.clone(),
            pending_after: resolver.pending(&job.id),
            added_at: job.added_at,
            started_at: job.started_at,
            ended_at: job.ended_at,
            failure: job.failure.clone(),
        }
    }
}

/// One stats filter. Several filters are combined with AND.
#[derive(Debug, Clone)]
pub enum StatsFilter {
    Any,
    ByStatus(JobStatus),
    ById(String),
    ByPattern(Regex),
}

impl StatsFilter {
    /// Build a pattern filter. Invalid patterns are an error here so the
    /// query itself never fails.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(StatsFilter::ByPattern)
    }

    pub fn matches(&self, id: &str, status: JobStatus) -> bool {
        match self {
            StatsFilter::Any => true,
            StatsFilter::ByStatus(wanted) => *wanted == status,
            StatsFilter::ById(wanted) => wanted == id,
            StatsFilter::ByPattern(re) => re.is_match(id),
        }
    }
}

/// A status keyword restricts by status; any other string is an exact id.
impl From<&str> for StatsFilter {
    fn from(raw: &str) -> Self {
        match raw.parse::<JobStatus>() {
            Ok(status) => StatsFilter::ByStatus(status),
            Err(_) => StatsFilter::ById(raw.to_string()),
        }
    }
}

impl From<String> for StatsFilter {
    fn from(raw: String) -> Self {
        StatsFilter::from(raw.as_str())
    }
}

impl From<JobStatus> for StatsFilter {
    fn from(status: JobStatus) -> Self {
        StatsFilter::ByStatus(status)
    }
}

impl From<Regex> for StatsFilter {
    fn from(re: Regex) -> Self {
        StatsFilter::ByPattern(re)
    }
}

/// Second operand of the two-argument stats query: an exact id or a pattern.
#[derive(Debug, Clone)]
pub enum IdMatcher {
    Exact(String),
    Pattern(Regex),
}

impl From<&str> for IdMatcher {
    fn from(id: &str) -> Self {
        IdMatcher::Exact(id.to_string())
    }
}

impl From<String> for IdMatcher {
    fn from(id: String) -> Self {
        IdMatcher::Exact(id)
    }
}

impl From<Regex> for IdMatcher {
    fn from(re: Regex) -> Self {
        IdMatcher::Pattern(re)
    }
}

impl From<IdMatcher> for StatsFilter {
    fn from(matcher: IdMatcher) -> Self {
        match matcher {
            IdMatcher::Exact(id) => StatsFilter::ById(id),
            IdMatcher::Pattern(re) => StatsFilter::ByPattern(re),
        }
    }
}

/// Snapshots of every job matching all `filters`, in registration order.
pub(crate) fn project<'a>(
    jobs: impl Iterator<Item = &'a Job>,
    resolver: &DependencyResolver,
    filters: &[StatsFilter],
) -> Vec<JobSnapshot> {
    jobs.filter(|job| filters.iter().all(|f| f.matches(&job.id, job.status)))
        .map(|job| JobSnapshot::capture(job, resolver))
        .collect()
}
