//! Weighted fairness through credit and periodic replenishment.
//!
//! Every running job holds a credit balance measured in weight-normalised
//! seconds. An invocation costs `max(duration, min_charge) / weight`. A job is
//! eligible for a tick only while its balance is positive, and then runs
//! exactly once in that tick. When a tick starts and no running job has
//! positive credit, a replenishment round adds one quantum to every running
//! job, capped at one quantum.
//!
//! Over many rounds each job therefore spends about one quantum of
//! normalised time per round, so its invocation count is proportional to
//! `weight / average_duration`. Debt carries across rounds, which keeps the
//! long-run ratios exact even when a single invocation costs more than a
//! quantum.

use std::time::Duration;

use fairtick_core::SchedulerConfig;

use crate::job::Job;

/// Result of picking the jobs for one tick.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Selection {
    /// (id, serial) of each job to invoke, in registration order.
    pub jobs: Vec<(String, u64)>,
    /// Replenishment rounds applied before selecting.
    pub rounds: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct FairnessAllocator {
    quantum: f64,
    min_charge: Duration,
}

impl FairnessAllocator {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            quantum: config.quantum_secs(),
            min_charge: config.min_charge(),
        }
    }

    /// Credit a job starts with when it enters `running`.
    pub fn initial_credit(&self) -> f64 {
        self.quantum
    }

    /// Pick the running jobs to invoke this tick, replenishing first if every
    /// one of them is out of credit.
    pub fn select<'a>(&self, running: impl IntoIterator<Item = &'a mut Job>) -> Selection {
        let mut running: Vec<&mut Job> = running.into_iter().collect();
        if running.is_empty() {
            return Selection::default();
        }

        let mut rounds = 0;
        if running.iter().all(|job| job.credit <= 0.0) {
            rounds = self.rounds_needed(running.iter().map(|job| job.credit));
            for job in running.iter_mut() {
                job.credit = self.replenish(job.credit, rounds);
            }
        }

        let jobs = running
            .iter()
            .filter(|job| job.credit > 0.0)
            .map(|job| (job.id.clone(), job.serial))
            .collect();

        Selection { jobs, rounds }
    }

    /// Charge a job for one invocation.
    pub fn charge(&self, job: &mut Job, duration: Duration) {
        let cost = duration.max(self.min_charge).as_secs_f64();
        job.credit -= cost / job.weight;
    }

    /// Smallest number of rounds after which at least one balance is positive.
    fn rounds_needed(&self, credits: impl Iterator<Item = f64>) -> u32 {
        let rounds = credits
            .map(|credit| (-credit / self.quantum).floor() + 1.0)
            .fold(f64::INFINITY, f64::min);

        if rounds.is_finite() && rounds >= 1.0 {
            rounds.min(u32::MAX as f64) as u32
        } else {
            1
        }
    }

    fn replenish(&self, credit: f64, rounds: u32) -> f64 {
        let topped = credit + self.quantum * f64::from(rounds);
        if topped.is_finite() {
            topped.min(self.quantum)
        } else {
            self.quantum
        }
    }
}
