//! Tick sources: whatever calls [`Scheduler::tick`] on a cadence the
//! scheduler does not control.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::runner::Scheduler;

/// Capability the scheduler loop depends on to stop and restart its ticks.
pub trait TickSource {
    /// A job entered `running` while the loop was idle: start ticking.
    fn resume(&self);
    /// Nothing is running: stop ticking until resumed.
    fn suspend(&self);
}

impl<T: TickSource + ?Sized> TickSource for Rc<T> {
    fn resume(&self) {
        (**self).resume();
    }

    fn suspend(&self) {
        (**self).suspend();
    }
}

#[derive(Debug, Default)]
struct ManualState {
    active: Cell<bool>,
    resumes: Cell<u64>,
    suspends: Cell<u64>,
}

/// Steppable tick source for deterministic tests and host-driven loops.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    state: Rc<ManualState>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state.active.get()
    }

    pub fn resume_count(&self) -> u64 {
        self.state.resumes.get()
    }

    pub fn suspend_count(&self) -> u64 {
        self.state.suspends.get()
    }

    /// Tick `scheduler` while this source is active, at most `max_ticks`
    /// times. Returns the number of ticks delivered.
    pub fn run(&self, scheduler: &Scheduler, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while self.is_active() && ticks < max_ticks {
            scheduler.tick();
            ticks += 1;
        }
        ticks
    }
}

impl TickSource for ManualTicker {
    fn resume(&self) {
        self.state.active.set(true);
        self.state.resumes.set(self.state.resumes.get() + 1);
    }

    fn suspend(&self) {
        self.state.active.set(false);
        self.state.suspends.set(self.state.suspends.get() + 1);
    }
}

/// Timer-driven tick source for a current-thread tokio runtime. While the
/// scheduler is idle the driving task parks on a [`Notify`] instead of
/// polling.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
    active: Cell<bool>,
    ticks: Cell<u64>,
    wake: Notify,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_micros(1)),
            active: Cell::new(false),
            ticks: Cell::new(0),
            wake: Notify::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Total ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Tick `scheduler` forever. Drop the future (e.g. via `select!` or a
    /// timeout) to stop driving.
    pub async fn drive(&self, scheduler: &Scheduler) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if !self.active.get() {
                debug!("tick source idle");
                self.wake.notified().await;
                interval.reset();
                continue;
            }

            interval.tick().await;
            if self.active.get() {
                scheduler.tick();
                self.ticks.set(self.ticks.get() + 1);
            }
        }
    }

    /// Drive `scheduler` for `window`, then return the number of ticks delivered.
    pub async fn drive_for(&self, scheduler: &Scheduler, window: Duration) -> u64 {
        let before = self.ticks.get();
        let _ = tokio::time::timeout(window, self.drive(scheduler)).await;
        self.ticks.get() - before
    }
}

impl TickSource for IntervalTicker {
    fn resume(&self) {
        self.active.set(true);
        self.wake.notify_one();
    }

    fn suspend(&self) {
        self.active.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_ticker_tracks_signals() {
        let ticker = ManualTicker::new();
        let shared = ticker.clone();
        assert!(!ticker.is_active());

        shared.resume();
        assert!(ticker.is_active());
        shared.suspend();
        assert!(!ticker.is_active());
        assert_eq!(ticker.resume_count(), 1);
        assert_eq!(ticker.suspend_count(), 1);
    }

    #[test]
    fn manual_ticker_does_not_run_while_idle() {
        let ticker = ManualTicker::new();
        let scheduler = Scheduler::default();
        assert_eq!(ticker.run(&scheduler, 10), 0);
    }

    #[test]
    fn interval_ticker_signals() {
        let ticker = IntervalTicker::new(Duration::ZERO);
        assert!(!ticker.is_active());
        ticker.resume();
        assert!(ticker.is_active());
        ticker.suspend();
        assert!(!ticker.is_active());
        assert_eq!(ticker.ticks(), 0);
    }
}
