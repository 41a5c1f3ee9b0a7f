//! Canonical store of job records, keyed by id in registration order.

use fairtick_core::JobStatus;
use indexmap::IndexMap;

use crate::job::Job;

#[derive(Default)]
pub(crate) struct JobRegistry {
    jobs: IndexMap<String, Job>,
    next_serial: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    /// Insert a new record. The caller has already rejected duplicate ids.
    pub fn insert(&mut self, mut job: Job) -> u64 {
        self.next_serial += 1;
        job.serial = self.next_serial;
        debug_assert!(!self.jobs.contains_key(&job.id), "duplicate id {}", job.id);
        self.jobs.insert(job.id.clone(), job);
        self.next_serial
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Job> {
        self.jobs.shift_remove(id)
    }

    pub fn status_of(&self, id: &str) -> Option<JobStatus> {
        self.jobs.get(id).map(|job| job.status)
    }

    pub fn is_done(&self, id: &str) -> bool {
        self.status_of(id) == Some(JobStatus::Done)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Running jobs, in registration order.
    pub fn running_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs
            .values_mut()
            .filter(|job| job.status == JobStatus::Running)
    }

    pub fn has_running(&self) -> bool {
        self.jobs.values().any(|job| job.status == JobStatus::Running)
    }

    /// Take every `done` job out, keeping the order of the rest.
    pub fn purge_done(&mut self) -> Vec<Job> {
        let (done, keep): (IndexMap<String, Job>, IndexMap<String, Job>) =
            std::mem::take(&mut self.jobs)
                .into_iter()
                .partition(|(_, job)| job.status == JobStatus::Done);
        self.jobs = keep;
        done.into_values().collect()
    }

    /// Take every job out.
    pub fn drain(&mut self) -> Vec<Job> {
        self.jobs.drain(..).map(|(_, job)| job).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }
}
