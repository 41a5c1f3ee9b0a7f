//! Integration tests for the public scheduler API.
//!
//! Covers the registration shapes, stats queries, job lifecycles, and the
//! long-run fairness ratios, driven by a manual tick source and a simulated
//! clock. The last test drives a scheduler from a tokio timer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use regex::Regex;

use fairtick_scheduler::{
    job, IntervalTicker, JobBody, JobDescriptor, JobEntry, JobStatus, ManualClock, ManualTicker,
    Scheduler, SchedulerError, StatsFilter,
};

const ERROR_MARGIN: f64 = 0.15;
const FAIRNESS_TICKS: usize = 3_000;

fn keep_going() -> bool {
    true
}

fn once() {}

fn manual() -> (Scheduler, ManualTicker) {
    let ticker = ManualTicker::new();
    let scheduler = Scheduler::default().with_tick_source(ticker.clone());
    (scheduler, ticker)
}

fn ids(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

fn stat_ids(scheduler: &Scheduler, filters: Vec<StatsFilter>) -> Vec<String> {
    ids(scheduler.get_stats(filters).into_iter().map(|s| s.id).collect())
}

/// Relative difference of two counts against their mean.
fn within_margin(v1: f64, v2: f64) -> bool {
    (v1 - v2).abs() / (v1 / 2.0 + v2 / 2.0) < ERROR_MARGIN
}

/// Body that spends `ms` of simulated time per call and counts its calls.
fn sleep_job(clock: &ManualClock, ms: u64, calls: &Rc<Cell<u64>>) -> JobBody {
    let clock = clock.clone();
    let calls = Rc::clone(calls);
    JobBody::new(move || {
        calls.set(calls.get() + 1);
        clock.advance(Duration::from_millis(ms));
        true
    })
}

fn simulated() -> (Scheduler, ManualTicker, ManualClock) {
    let clock = ManualClock::new();
    let ticker = ManualTicker::new();
    let scheduler = Scheduler::default()
        .with_tick_source(ticker.clone())
        .with_clock(clock.clone());
    (scheduler, ticker, clock)
}

#[test]
fn adding_and_killing_jobs() {
    let (scheduler, _ticker) = manual();

    scheduler
        .add_job(("test1", JobBody::new(keep_going)))
        .unwrap()
        .add_job(("test2", JobDescriptor::new(keep_going)))
        .unwrap()
        .add_job(JobDescriptor::new(keep_going).id("test3"))
        .unwrap();
    for id in ["test1", "test2", "test3"] {
        assert!(scheduler.has_job(id), "{id} should be registered");
    }

    scheduler
        .add_job([
            ("test4", JobBody::new(keep_going)),
            ("test5", JobBody::new(keep_going)),
        ])
        .unwrap()
        .add_job([
            ("test6", JobDescriptor::new(keep_going)),
            ("test7", JobDescriptor::new(keep_going)),
        ])
        .unwrap()
        .add_job(vec![job("test8", keep_going), job("test9", keep_going)])
        .unwrap();
    for i in 4..=9 {
        assert!(scheduler.has_job(&format!("test{i}")));
    }

    let err = scheduler.add_job(("test1", JobBody::new(keep_going))).unwrap_err();
    assert_eq!(err.to_string(), r#"Job with id "test1" already exists"#);

    let err = scheduler
        .add_job(vec![job("test10", keep_going), job("test10", keep_going)])
        .unwrap_err();
    assert_eq!(err.to_string(), r#"Job with id "test10" already exists"#);
    assert!(!scheduler.has_job("test10"));

    scheduler
        .kill_job("test1")
        .unwrap()
        .kill_job(["test2", "test3"])
        .unwrap();
    assert!(!scheduler.has_job("test1"));
    assert!(!scheduler.has_job("test2") && !scheduler.has_job("test3"));

    let err = scheduler.kill_job("unaddedTest").unwrap_err();
    assert_eq!(err, SchedulerError::JobNotFound { id: "unaddedTest".into() });
    assert_eq!(err.to_string(), r#"Job "unaddedTest" not found"#);

    scheduler.kill_all().clear_history();
    assert!((1..=9).all(|i| !scheduler.has_job(&format!("test{i}"))));
    assert!(!scheduler.is_running());
}

#[test]
fn mapping_entries_can_mix_bodies_and_descriptors() {
    let (scheduler, _ticker) = manual();
    scheduler
        .add_job(vec![
            ("plain", JobEntry::from(JobBody::new(keep_going))),
            ("tuned", JobEntry::from(JobDescriptor::new(keep_going).weight(2.0))),
        ])
        .unwrap();

    let stats = scheduler.get_stats([StatsFilter::from("tuned")]);
    assert_eq!(stats[0].weight, 2.0);
    let stats = scheduler.get_stats([StatsFilter::from("plain")]);
    assert_eq!(stats[0].weight, 1.0);
}

#[test]
fn descriptor_id_must_match_mapping_key() {
    let (scheduler, _ticker) = manual();
    let err = scheduler
        .add_job(("key", JobDescriptor::new(keep_going).id("other")))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidDescriptor { .. }));
    assert!(!scheduler.has_job("key"));
}

#[test]
fn statistics() {
    let (scheduler, _ticker) = manual();
    scheduler
        .add_job(vec![
            ("jobDone1", JobEntry::from(JobBody::new(once))),
            ("jobDone2", JobEntry::from(JobBody::new(once))),
            ("jobRunning1", JobEntry::from(JobBody::new(keep_going))),
            ("jobRunning2", JobEntry::from(JobBody::new(keep_going))),
            (
                "jobWaiting1",
                JobEntry::from(JobDescriptor::new(once).after("jobRunning1")),
            ),
            (
                "jobWaiting2",
                JobEntry::from(JobDescriptor::new(once).after("jobRunning2")),
            ),
        ])
        .unwrap();
    scheduler.tick();

    assert_eq!(
        stat_ids(&scheduler, vec![]),
        vec!["jobDone1", "jobDone2", "jobRunning1", "jobRunning2", "jobWaiting1", "jobWaiting2"]
    );
    assert_eq!(
        stat_ids(&scheduler, vec!["running".into()]),
        vec!["jobRunning1", "jobRunning2"]
    );
    assert_eq!(
        stat_ids(&scheduler, vec!["waiting".into()]),
        vec!["jobWaiting1", "jobWaiting2"]
    );
    assert_eq!(
        stat_ids(&scheduler, vec!["done".into()]),
        vec!["jobDone1", "jobDone2"]
    );
    assert_eq!(stat_ids(&scheduler, vec!["jobDone1".into()]), vec!["jobDone1"]);
    assert_eq!(
        stat_ids(&scheduler, vec![StatsFilter::pattern("jobDone").unwrap()]),
        vec!["jobDone1", "jobDone2"]
    );

    let two_operand = |status: &str, id: fairtick_scheduler::IdMatcher| {
        ids(scheduler
            .get_stats_for(status, id)
            .into_iter()
            .map(|s| s.id)
            .collect())
    };
    assert_eq!(two_operand("running", "jobRunning1".into()), vec!["jobRunning1"]);
    assert_eq!(
        two_operand("running", Regex::new("1").unwrap().into()),
        vec!["jobRunning1"]
    );
    assert!(two_operand("sleeping", "jobRunning1".into()).is_empty());

    let waiting = &scheduler.get_stats([StatsFilter::from("jobWaiting1")])[0];
    assert_eq!(waiting.pending_after, vec!["jobRunning1"]);
    assert_eq!(waiting.status, JobStatus::Waiting);
    assert!(waiting.started_at.is_none());
}

#[test]
fn snapshots_serialize() {
    let (scheduler, _ticker) = manual();
    scheduler.add_job(job("a", keep_going).count(3)).unwrap();
    scheduler.tick();

    let json = serde_json::to_value(scheduler.get_stats([StatsFilter::Any])).unwrap();
    assert_eq!(json[0]["id"], "a");
    assert_eq!(json[0]["status"], "running");
    assert_eq!(json[0]["invocations"], 1);
    assert_eq!(json[0]["count"], 3);
}

#[test]
fn job_returning_false_stops() {
    let (scheduler, ticker) = manual();
    let remaining = Rc::new(Cell::new(5));
    let left = Rc::clone(&remaining);
    scheduler
        .add_job(JobDescriptor::new(move || {
            left.set(left.get() - 1);
            left.get() != 0
        })
        .id("job1"))
        .unwrap();

    ticker.run(&scheduler, 50);
    assert_eq!(remaining.get(), 0);
    assert!(!scheduler.is_running());
}

#[test]
fn on_done_runs_when_job_ends() {
    let (scheduler, ticker) = manual();
    let remaining = Rc::new(Cell::new(5));
    let left = Rc::clone(&remaining);
    let seen = Rc::new(Cell::new(None));
    let observed = Rc::clone(&seen);
    let witness = Rc::clone(&remaining);
    scheduler
        .add_job(
            job("job1", move || {
                left.set(left.get() - 1);
                left.get() != 0
            })
            .on_done(move || observed.set(Some(witness.get()))),
        )
        .unwrap();

    ticker.run(&scheduler, 50);
    assert_eq!(seen.get(), Some(0));
}

#[test]
fn count_runs_exactly_that_many_times() {
    let (scheduler, ticker) = manual();
    let calls = Rc::new(Cell::new(0));
    let inner = Rc::clone(&calls);
    let at_end = Rc::new(Cell::new(0));
    let witness = (Rc::clone(&calls), Rc::clone(&at_end));
    scheduler
        .add_job(
            job("job1", move || {
                inner.set(inner.get() + 1);
                true
            })
            .count(5)
            .on_done(move || witness.1.set(witness.0.get())),
        )
        .unwrap();

    ticker.run(&scheduler, 50);
    assert_eq!(calls.get(), 5);
    assert_eq!(at_end.get(), 5);
}

#[test]
fn dependent_starts_only_after_prerequisite_ends() {
    let (scheduler, ticker) = manual();
    let trace = Rc::new(RefCell::new(String::new()));
    let a = Rc::clone(&trace);
    let b = Rc::clone(&trace);
    let finished = Rc::new(Cell::new(false));
    let flag = Rc::clone(&finished);

    scheduler
        .add_job(vec![
            (
                "job1",
                JobDescriptor::new(move || {
                    a.borrow_mut().push('a');
                    true
                })
                .count(10),
            ),
            (
                "job2",
                JobDescriptor::new(move || {
                    b.borrow_mut().push('b');
                    true
                })
                .count(2)
                .after("job1")
                .on_done(move || flag.set(true)),
            ),
        ])
        .unwrap();

    ticker.run(&scheduler, 100);
    assert!(finished.get());
    assert_eq!(*trace.borrow(), "aaaaaaaaaabb");
}

#[test]
fn equal_cost_jobs_run_equally_often() {
    let (scheduler, ticker, clock) = simulated();
    let (c1, c2) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
    scheduler
        .add_job([
            ("job1", sleep_job(&clock, 3, &c1)),
            ("job2", sleep_job(&clock, 3, &c2)),
        ])
        .unwrap();

    ticker.run(&scheduler, FAIRNESS_TICKS);
    let (n1, n2) = (c1.get() as f64, c2.get() as f64);
    assert!(within_margin(n1, n2), "job1={n1} job2={n2}");
}

#[test]
fn twice_as_expensive_job_runs_half_as_often() {
    let (scheduler, ticker, clock) = simulated();
    let (c1, c2) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
    scheduler
        .add_job([
            ("job1", sleep_job(&clock, 3, &c1)),
            ("job2", sleep_job(&clock, 6, &c2)),
        ])
        .unwrap();

    ticker.run(&scheduler, FAIRNESS_TICKS);
    let (n1, n2) = (c1.get() as f64, c2.get() as f64);
    assert!(within_margin(n1, n2 * 2.0), "job1={n1} job2={n2}");
}

#[test]
fn half_weight_job_runs_half_as_often() {
    let (scheduler, ticker, clock) = simulated();
    let (c1, c2) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
    scheduler
        .add_job(vec![
            ("job1", JobEntry::from(sleep_job(&clock, 3, &c1))),
            (
                "job2",
                JobEntry::from(JobDescriptor::default().body(sleep_job(&clock, 3, &c2)).weight(0.5)),
            ),
        ])
        .unwrap();

    ticker.run(&scheduler, FAIRNESS_TICKS);
    let (n1, n2) = (c1.get() as f64, c2.get() as f64);
    assert!(within_margin(n1, n2 * 2.0), "job1={n1} job2={n2}");
}

#[tokio::test]
async fn interval_ticker_drives_jobs_to_completion() {
    let ticker = Rc::new(IntervalTicker::new(Duration::from_millis(1)));
    let scheduler = Scheduler::default().with_tick_source(Rc::clone(&ticker));

    let calls = Rc::new(Cell::new(0));
    let inner = Rc::clone(&calls);
    scheduler
        .add_job(
            job("job1", move || {
                inner.set(inner.get() + 1);
                true
            })
            .count(5),
        )
        .unwrap();
    assert!(ticker.is_active());

    let delivered = ticker.drive_for(&scheduler, Duration::from_millis(500)).await;
    assert!(delivered >= 5, "only {delivered} ticks delivered");
    assert_eq!(calls.get(), 5);
    assert!(!ticker.is_active());
    assert!(!scheduler.is_running());
}
