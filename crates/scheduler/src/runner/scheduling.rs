use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use fairtick_core::JobStatus;
use tracing::{debug, info, warn};

use crate::events::{Effects, SchedulerEvent, TickerSignal};
use crate::job::{Continuation, Job, JobBody};
use crate::registration::CanonicalJob;

use super::core::SchedulerState;

impl SchedulerState {
    /// Insert a validated job and start it unless it has to wait.
    pub(super) fn insert(&mut self, job: CanonicalJob, effects: &mut Effects) {
        let status = self
            .resolver
            .register(&job.id, &job.after, |dep| self.registry.is_done(dep));

        let id = job.id.clone();
        info!(job_id = %id, %status, weight = job.weight, count = ?job.count, "job added");

        self.registry.insert(Job {
            id: job.id,
            serial: 0,
            body: Some(job.body),
            weight: job.weight,
            count: job.count,
            after: job.after,
            on_done: job.on_done,
            status: JobStatus::Waiting,
            invocations: 0,
            average_duration: Duration::ZERO,
            total_duration: Duration::ZERO,
            credit: 0.0,
            added_at: Utc::now(),
            started_at: None,
            ended_at: None,
            failure: None,
        });

        if status == JobStatus::Running {
            self.activate(vec![id], effects);
        }
    }

    /// Move jobs into `running`. A job capped at zero invocations passes
    /// straight through to `done` without being invoked, which may unblock
    /// further jobs in turn.
    pub(super) fn activate(&mut self, ids: Vec<String>, effects: &mut Effects) {
        let initial_credit = self.allocator.initial_credit();
        let mut queue: VecDeque<String> = ids.into();

        while let Some(id) = queue.pop_front() {
            let Some(job) = self.registry.get_mut(&id) else {
                continue;
            };
            if !job.advance(JobStatus::Running) {
                continue;
            }
            job.credit = initial_credit;
            let zero_count = job.count == Some(0);
            debug!(job_id = %id, "job running");

            if zero_count {
                effects.event(SchedulerEvent::JobStarted(id.clone()));
                queue.extend(self.finish(&id, effects));
            } else {
                self.wake(effects);
                effects.event(SchedulerEvent::JobStarted(id));
            }
        }
    }

    /// Mark `id` done, queue its `on_done`, and return the jobs it unblocked.
    pub(super) fn finish(&mut self, id: &str, effects: &mut Effects) -> Vec<String> {
        let Some(job) = self.registry.get_mut(id) else {
            return Vec::new();
        };
        if !job.advance(JobStatus::Done) {
            return Vec::new();
        }

        debug!(job_id = %id, invocations = job.invocations, "job done");
        if let Some(body) = job.body.take() {
            effects.retire_body(body);
        }
        let on_done = job.on_done.take();

        effects.event(SchedulerEvent::JobEnded(id.to_string()));
        if let Some(callback) = on_done {
            effects.callback(callback);
        }

        let unblocked = self.resolver.complete(id);
        if !self.config.keep_history {
            effects.retire_jobs(self.registry.remove(id));
        }
        unblocked
    }

    /// Finish `id` and start whatever it unblocked.
    pub(super) fn complete(&mut self, id: &str, effects: &mut Effects) {
        let unblocked = self.finish(id, effects);
        if !unblocked.is_empty() {
            debug!(job_id = %id, unblocked = ?unblocked, "dependents promoted");
        }
        self.activate(unblocked, effects);
    }

    /// Remove a job outright (kill).
    pub(super) fn remove(&mut self, id: &str, effects: &mut Effects) {
        if let Some(job) = self.registry.remove(id) {
            self.resolver.forget(id);
            info!(job_id = %id, status = %job.status, "job killed");
            effects.retire_jobs([job]);
        }
    }

    /// Route one invocation's result back into the job's lifecycle.
    /// Returns true if the job reached `done`.
    pub(super) fn finish_invocation(
        &mut self,
        id: &str,
        serial: u64,
        body: JobBody,
        elapsed: Duration,
        outcome: Result<Continuation, String>,
        effects: &mut Effects,
    ) -> bool {
        let smoothing = self.config.duration_smoothing;
        let job = match self.registry.get_mut(id) {
            Some(job) if job.serial == serial && job.status == JobStatus::Running => job,
            // Killed (and maybe re-registered) during its own invocation.
            _ => {
                effects.retire_body(body);
                return false;
            }
        };

        job.body = Some(body);
        self.allocator.charge(job, elapsed);
        job.record_invocation(elapsed, smoothing);

        let done = match outcome {
            Ok(continuation) => job.exhausted() || !continuation.should_continue(),
            Err(message) => {
                warn!(job_id = %id, error = %message, "job body panicked; ending job");
                job.failure = Some(message);
                true
            }
        };

        if done {
            self.complete(id, effects);
        }
        done
    }

    /// Ask the tick source to resume if the loop is idle.
    pub(super) fn wake(&mut self, effects: &mut Effects) {
        if !self.active {
            self.active = true;
            debug!("scheduler loop resumed");
            effects.signal(TickerSignal::Resume);
            effects.event(SchedulerEvent::Start);
        }
    }

    /// Ask the tick source to stop if the loop is active.
    pub(super) fn idle(&mut self, effects: &mut Effects) {
        if self.active {
            self.active = false;
            debug!("scheduler loop suspended");
            effects.signal(TickerSignal::Suspend);
            effects.event(SchedulerEvent::Stop);
        }
    }
}
