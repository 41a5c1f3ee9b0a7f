use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fairtick_core::SchedulerConfig;
use fairtick_scheduler::{IntervalTicker, JobDescriptor, JobSnapshot, Scheduler, StatsFilter};
use serde::Serialize;
use tracing::info;

use crate::cli::JobSpec;

/// Per-job outcome of a run.
#[derive(Debug, Serialize)]
pub struct JobReport {
    #[serde(flatten)]
    pub snapshot: JobSnapshot,
    pub cost_ms: f64,
    /// Fraction of all invocations this job received.
    pub observed_share: f64,
    /// Fraction it should receive: proportional to `weight / cost`.
    pub expected_share: f64,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub window_ms: u64,
    pub ticks: u64,
    pub jobs: Vec<JobReport>,
}

/// Body that spins for `cost` on every call.
fn busy_wait(cost: Duration) -> impl FnMut() -> bool {
    move || {
        let started = Instant::now();
        while started.elapsed() < cost {
            std::hint::spin_loop();
        }
        true
    }
}

fn descriptor(spec: &JobSpec) -> JobDescriptor {
    let cost = Duration::from_secs_f64(spec.cost_ms / 1000.0);
    let mut descriptor = JobDescriptor::new(busy_wait(cost))
        .id(spec.name.clone())
        .weight(spec.weight);
    if let Some(count) = spec.count {
        descriptor = descriptor.count(count);
    }
    descriptor
}

/// Register `specs`, drive them with a timer for `window`, and collect stats.
pub async fn run(config: SchedulerConfig, specs: &[JobSpec], window: Duration) -> Result<RunReport> {
    let ticker = Rc::new(IntervalTicker::new(config.tick_interval()));
    let scheduler = Scheduler::new(config)
        .context("invalid scheduler configuration")?
        .with_tick_source(Rc::clone(&ticker));

    scheduler
        .add_job(specs.iter().map(descriptor).collect::<Vec<_>>())
        .context("failed to register jobs")?;
    info!(jobs = specs.len(), window_ms = window.as_millis() as u64, "Driving scheduler");

    let ticks = ticker.drive_for(&scheduler, window).await;
    let snapshots = scheduler.get_stats([StatsFilter::Any]);
    scheduler.kill_all();

    Ok(build_report(specs, snapshots, window, ticks))
}

fn build_report(
    specs: &[JobSpec],
    snapshots: Vec<JobSnapshot>,
    window: Duration,
    ticks: u64,
) -> RunReport {
    let total_invocations: u64 = snapshots.iter().map(|s| s.invocations).sum();
    let demand = |spec: &JobSpec| spec.weight / spec.cost_ms.max(f64::EPSILON);
    let total_demand: f64 = specs.iter().map(demand).sum();

    let mut snapshots = snapshots;
    let jobs = specs
        .iter()
        .filter_map(|spec| {
            // Missing when history is off and the job already finished.
            let index = snapshots.iter().position(|s| s.id == spec.name)?;
            let snapshot = snapshots.swap_remove(index);
            Some(JobReport {
                observed_share: if total_invocations == 0 {
                    0.0
                } else {
                    snapshot.invocations as f64 / total_invocations as f64
                },
                expected_share: demand(spec) / total_demand,
                cost_ms: spec.cost_ms,
                snapshot,
            })
        })
        .collect();

    RunReport {
        window_ms: window.as_millis() as u64,
        ticks,
        jobs,
    }
}

pub fn print_table(report: &RunReport) {
    println!("window: {} ms, ticks: {}", report.window_ms, report.ticks);
    println!(
        "{:<16} {:>7} {:>8} {:>8} {:>12} {:>10} {:>10}",
        "JOB", "WEIGHT", "COST_MS", "STATUS", "INVOCATIONS", "OBSERVED", "EXPECTED"
    );
    for job in &report.jobs {
        println!(
            "{:<16} {:>7.2} {:>8.2} {:>8} {:>12} {:>9.1}% {:>9.1}%",
            job.snapshot.id,
            job.snapshot.weight,
            job.cost_ms,
            job.snapshot.status.as_str(),
            job.snapshot.invocations,
            job.observed_share * 100.0,
            job.expected_share * 100.0,
        );
    }
}
