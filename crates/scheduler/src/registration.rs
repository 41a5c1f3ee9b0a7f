//! Accepted shapes for declaring and removing jobs, and their normalisation
//! into one canonical descriptor.
//!
//! | Shape                         | Example                                            |
//! |-------------------------------|----------------------------------------------------|
//! | Descriptor with its own id    | `job("a", body)`                                   |
//! | Id + body                     | `("a", JobBody::new(body))`                        |
//! | Id + descriptor without id    | `("a", JobDescriptor::new(body).count(5))`         |
//! | Mapping of ids to entries     | `vec![("a", body_a), ("b", body_b)]`, `BTreeMap`   |
//! | Ordered batch of descriptors  | `vec![job("a", body_a), job("b", body_b)]`         |

use std::collections::BTreeMap;

use fairtick_core::{Result, SchedulerError};

use crate::job::{Continuation, DoneCallback, JobBody};

/// A job declaration. Only the body is required, and the id unless it is
/// supplied by the surrounding shape.
#[derive(Default)]
pub struct JobDescriptor {
    id: Option<String>,
    body: Option<JobBody>,
    weight: Option<f64>,
    count: Option<u32>,
    after: Vec<String>,
    on_done: Option<DoneCallback>,
}

/// Shorthand for a descriptor carrying its own id.
pub fn job<F, R>(id: impl Into<String>, body: F) -> JobDescriptor
where
    F: FnMut() -> R + 'static,
    R: Into<Continuation>,
{
    JobDescriptor::new(body).id(id)
}

impl JobDescriptor {
    pub fn new<F, R>(body: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: Into<Continuation>,
    {
        Self {
            body: Some(JobBody::new(body)),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn body(mut self, body: JobBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Relative claim on throughput. Must be positive and finite.
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Hard cap on invocations. `0` makes the job done without running.
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Run only after `id` is done. May be repeated.
    pub fn after(mut self, id: impl Into<String>) -> Self {
        self.after.push(id.into());
        self
    }

    pub fn after_all<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn on_done(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }

    fn into_canonical(self, key: Option<String>, default_weight: f64) -> Result<CanonicalJob> {
        let id = match (key, self.id) {
            (Some(key), Some(own)) if key != own => {
                return Err(SchedulerError::invalid(
                    Some(&key),
                    format!("descriptor id \"{own}\" does not match its key"),
                ));
            }
            (Some(key), _) => key,
            (None, Some(own)) => own,
            (None, None) => return Err(SchedulerError::invalid(None, "missing id")),
        };
        if id.is_empty() {
            return Err(SchedulerError::invalid(None, "id must not be empty"));
        }

        let body = self
            .body
            .ok_or_else(|| SchedulerError::invalid(Some(&id), "missing job body"))?;

        let weight = self.weight.unwrap_or(default_weight);
        if !(weight.is_finite() && weight > 0.0) {
            return Err(SchedulerError::invalid(
                Some(&id),
                format!("weight must be a positive number, got {weight}"),
            ));
        }

        if let Some(dep) = self.after.iter().find(|dep| dep.is_empty()) {
            return Err(SchedulerError::invalid(
                Some(&id),
                format!("empty prerequisite id {dep:?}"),
            ));
        }

        Ok(CanonicalJob {
            id,
            body,
            weight,
            count: self.count,
            after: self.after,
            on_done: self.on_done,
        })
    }
}

impl std::fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("id", &self.id)
            .field("has_body", &self.body.is_some())
            .field("weight", &self.weight)
            .field("count", &self.count)
            .field("after", &self.after)
            .field("has_on_done", &self.on_done.is_some())
            .finish()
    }
}

/// Value side of a mapping entry: a bare body or a descriptor without id.
pub enum JobEntry {
    Body(JobBody),
    Descriptor(JobDescriptor),
}

impl From<JobBody> for JobEntry {
    fn from(body: JobBody) -> Self {
        JobEntry::Body(body)
    }
}

impl From<JobDescriptor> for JobEntry {
    fn from(descriptor: JobDescriptor) -> Self {
        JobEntry::Descriptor(descriptor)
    }
}

/// Closed set of registration shapes accepted by
/// [`Scheduler::add_job`](crate::Scheduler::add_job).
pub enum Registration {
    Single(JobDescriptor),
    Pair(String, JobBody),
    Mapping(Vec<(String, JobEntry)>),
    Batch(Vec<JobDescriptor>),
}

/// Validated job, ready for the registry.
pub(crate) struct CanonicalJob {
    pub id: String,
    pub body: JobBody,
    pub weight: f64,
    pub count: Option<u32>,
    pub after: Vec<String>,
    pub on_done: Option<DoneCallback>,
}

impl std::fmt::Debug for CanonicalJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanonicalJob")
            .field("id", &self.id)
            .field("body", &self.body)
            .field("weight", &self.weight)
            .field("count", &self.count)
            .field("after", &self.after)
            .field("has_on_done", &self.on_done.is_some())
            .finish()
    }
}

impl Registration {
    /// Normalise into canonical jobs, in declaration order. Fails on the first
    /// invalid descriptor; duplicate ids are checked by the scheduler.
    pub(crate) fn normalize(self, default_weight: f64) -> Result<Vec<CanonicalJob>> {
        match self {
            Registration::Single(descriptor) => {
                Ok(vec![descriptor.into_canonical(None, default_weight)?])
            }
            Registration::Pair(id, body) => {
                Ok(vec![JobDescriptor::default()
                    .body(body)
                    .into_canonical(Some(id), default_weight)?])
            }
            Registration::Mapping(entries) => entries
                .into_iter()
                .map(|(id, entry)| {
                    let descriptor = match entry {
                        JobEntry::Body(body) => JobDescriptor::default().body(body),
                        JobEntry::Descriptor(descriptor) => descriptor,
                    };
                    descriptor.into_canonical(Some(id), default_weight)
                })
                .collect(),
            Registration::Batch(descriptors) => descriptors
                .into_iter()
                .map(|descriptor| descriptor.into_canonical(None, default_weight))
                .collect(),
        }
    }
}

impl From<JobDescriptor> for Registration {
    fn from(descriptor: JobDescriptor) -> Self {
        Registration::Single(descriptor)
    }
}

impl<S: Into<String>> From<(S, JobBody)> for Registration {
    fn from((id, body): (S, JobBody)) -> Self {
        Registration::Pair(id.into(), body)
    }
}

impl<S: Into<String>> From<(S, JobDescriptor)> for Registration {
    fn from((id, descriptor): (S, JobDescriptor)) -> Self {
        Registration::Mapping(vec![(id.into(), JobEntry::Descriptor(descriptor))])
    }
}

impl From<Vec<JobDescriptor>> for Registration {
    fn from(descriptors: Vec<JobDescriptor>) -> Self {
        Registration::Batch(descriptors)
    }
}

impl<const N: usize> From<[JobDescriptor; N]> for Registration {
    fn from(descriptors: [JobDescriptor; N]) -> Self {
        Registration::Batch(descriptors.into())
    }
}

impl<S, E> From<Vec<(S, E)>> for Registration
where
    S: Into<String>,
    E: Into<JobEntry>,
{
    fn from(entries: Vec<(S, E)>) -> Self {
        Registration::Mapping(
            entries
                .into_iter()
                .map(|(id, entry)| (id.into(), entry.into()))
                .collect(),
        )
    }
}

impl<S, E, const N: usize> From<[(S, E); N]> for Registration
where
    S: Into<String>,
    E: Into<JobEntry>,
{
    fn from(entries: [(S, E); N]) -> Self {
        Vec::from(entries).into()
    }
}

impl<S, E> From<BTreeMap<S, E>> for Registration
where
    S: Into<String>,
    E: Into<JobEntry>,
{
    fn from(entries: BTreeMap<S, E>) -> Self {
        entries.into_iter().collect::<Vec<_>>().into()
    }
}

/// One id or several, for [`Scheduler::kill_job`](crate::Scheduler::kill_job).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobIds {
    One(String),
    Many(Vec<String>),
}

impl JobIds {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            JobIds::One(id) => vec![id],
            JobIds::Many(ids) => ids,
        }
    }
}

impl From<&str> for JobIds {
    fn from(id: &str) -> Self {
        JobIds::One(id.to_string())
    }
}

impl From<String> for JobIds {
    fn from(id: String) -> Self {
        JobIds::One(id)
    }
}

impl From<&String> for JobIds {
    fn from(id: &String) -> Self {
        JobIds::One(id.clone())
    }
}

impl<S: Into<String>> From<Vec<S>> for JobIds {
    fn from(ids: Vec<S>) -> Self {
        JobIds::Many(ids.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for JobIds {
    fn from(ids: [S; N]) -> Self {
        JobIds::Many(ids.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for JobIds {
    fn from(ids: &[&str]) -> Self {
        JobIds::Many(ids.iter().map(|id| id.to_string()).collect())
    }
}
