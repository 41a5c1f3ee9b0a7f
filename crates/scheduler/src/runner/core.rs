use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use fairtick_core::{ConfigError, JobStatus, Result, SchedulerConfig, SchedulerError};
use tracing::{debug, info};

use crate::allocator::FairnessAllocator;
use crate::clock::{Clock, SystemClock};
use crate::events::{Effects, ListenerId, Listeners, SchedulerEvent};
use crate::registration::{JobIds, Registration};
use crate::registry::JobRegistry;
use crate::resolver::DependencyResolver;
use crate::stats::{self, IdMatcher, JobSnapshot, StatsFilter};
use crate::ticker::{ManualTicker, TickSource};

/// Everything one scheduler instance owns.
pub(super) struct SchedulerState {
    pub(super) config: SchedulerConfig,
    pub(super) registry: JobRegistry,
    pub(super) resolver: DependencyResolver,
    pub(super) allocator: FairnessAllocator,
    pub(super) ticker: Rc<dyn TickSource>,
    pub(super) clock: Rc<dyn Clock>,
    pub(super) listeners: Listeners,
    /// Whether the tick source is currently asked to drive the loop.
    pub(super) active: bool,
    /// Set while a tick is dispatching job bodies.
    pub(super) in_tick: bool,
    pub(super) ticks: u64,
}

/// Handle to a cooperative scheduler instance.
///
/// Cloning is cheap and every clone refers to the same instance, so job
/// bodies, `on_done` callbacks and event listeners may capture a clone and
/// register or remove jobs from inside the loop. Such changes take effect
/// from the next tick.
///
/// The handle is single-threaded (`!Send`): all job bodies run on the thread
/// that calls [`tick`](Scheduler::tick).
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Rc<RefCell<SchedulerState>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::with_validated(SchedulerConfig::default())
    }
}

impl Scheduler {
    /// Create a scheduler with a [`SystemClock`] and an idle [`ManualTicker`].
    /// Fails if `config` does not pass [`SchedulerConfig::validate`].
    pub fn new(config: SchedulerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_validated(config))
    }

    fn with_validated(config: SchedulerConfig) -> Self {
        let allocator = FairnessAllocator::new(&config);
        Self {
            inner: Rc::new(RefCell::new(SchedulerState {
                config,
                registry: JobRegistry::new(),
                resolver: DependencyResolver::new(),
                allocator,
                ticker: Rc::new(ManualTicker::new()),
                clock: Rc::new(SystemClock::new()),
                listeners: Listeners::default(),
                active: false,
                in_tick: false,
                ticks: 0,
            })),
        }
    }

    /// Attach the tick source that drives [`tick`](Scheduler::tick). If jobs
    /// are already running, the outgoing source is suspended and the new one
    /// resumed right away.
    pub fn with_tick_source<T: TickSource + 'static>(self, ticker: T) -> Self {
        let ticker: Rc<dyn TickSource> = Rc::new(ticker);
        let (previous, active) = {
            let mut state = self.inner.borrow_mut();
            let previous = std::mem::replace(&mut state.ticker, Rc::clone(&ticker));
            (previous, state.active)
        };
        if active {
            debug!("handing the running loop to a new tick source");
            previous.suspend();
            ticker.resume();
        }
        self
    }

    /// Replace the clock used to measure invocation cost.
    pub fn with_clock<C: Clock + 'static>(self, clock: C) -> Self {
        self.inner.borrow_mut().clock = Rc::new(clock);
        self
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config.clone()
    }

    /// Register one or more jobs.
    ///
    /// The whole call is validated before anything is inserted: an invalid
    /// descriptor or an id that already exists (in the registry or earlier
    /// in the same call) fails the call and registers nothing.
    pub fn add_job(&self, registration: impl Into<Registration>) -> Result<&Self> {
        let default_weight = self.inner.borrow().config.default_weight;
        let jobs = registration.into().normalize(default_weight)?;

        let mut effects = Effects::default();
        {
            let mut state = self.inner.borrow_mut();
            let mut seen = HashSet::new();
            for job in &jobs {
                if state.registry.contains(&job.id) || !seen.insert(job.id.as_str()) {
                    return Err(SchedulerError::DuplicateJob { id: job.id.clone() });
                }
            }
            for job in jobs {
                state.insert(job, &mut effects);
            }
        }
        self.flush(effects);
        Ok(self)
    }

    /// Remove one or more jobs. Fails with `JobNotFound` (removing nothing)
    /// if any id is not registered.
    ///
    /// A removed job never fires `on_done` and does not satisfy jobs waiting
    /// on it.
    pub fn kill_job(&self, ids: impl Into<JobIds>) -> Result<&Self> {
        let ids = ids.into().into_vec();
        let mut effects = Effects::default();
        {
            let mut state = self.inner.borrow_mut();
            if let Some(missing) = ids.iter().find(|id| !state.registry.contains(id)) {
                return Err(SchedulerError::JobNotFound { id: missing.clone() });
            }
            for id in &ids {
                state.remove(id, &mut effects);
            }
        }
        self.flush(effects);
        Ok(self)
    }

    /// Remove every job and halt the loop.
    pub fn kill_all(&self) -> &Self {
        let mut effects = Effects::default();
        {
            let mut state = self.inner.borrow_mut();
            let jobs = state.registry.drain();
            state.resolver.clear();
            info!(removed = jobs.len(), "killed all jobs");
            effects.retire_jobs(jobs);
            state.idle(&mut effects);
        }
        self.flush(effects);
        self
    }

    /// Drop every `done` job. `waiting` and `running` jobs are untouched.
    pub fn clear_history(&self) -> &Self {
        let mut effects = Effects::default();
        {
            let mut state = self.inner.borrow_mut();
            let purged = state.registry.purge_done();
            info!(purged = purged.len(), "cleared job history");
            effects.retire_jobs(purged);
        }
        self.flush(effects);
        self
    }

    pub fn has_job(&self, id: &str) -> bool {
        self.inner.borrow().registry.contains(id)
    }

    /// Snapshots of the jobs matching every filter (all jobs when there is
    /// none), in registration order.
    pub fn get_stats(&self, filters: impl IntoIterator<Item = StatsFilter>) -> Vec<JobSnapshot> {
        let filters: Vec<StatsFilter> = filters.into_iter().collect();
        let state = self.inner.borrow();
        stats::project(state.registry.iter(), &state.resolver, &filters)
    }

    /// Two-operand query: jobs in `status` whose id matches `id`. A `status`
    /// that is not a status keyword matches nothing.
    pub fn get_stats_for(&self, status: &str, id: impl Into<IdMatcher>) -> Vec<JobSnapshot> {
        let id: IdMatcher = id.into();
        match status.parse::<JobStatus>() {
            Ok(status) => self.get_stats([StatsFilter::ByStatus(status), StatsFilter::from(id)]),
            Err(_) => Vec::new(),
        }
    }

    /// Whether the loop is active, i.e. its tick source is asked to drive it.
    pub fn is_running(&self) -> bool {
        self.inner.borrow().active
    }

    /// Number of ticks that dispatched work so far.
    pub fn tick_count(&self) -> u64 {
        self.inner.borrow().ticks
    }

    /// Subscribe to lifecycle events.
    pub fn on_event(&self, listener: impl Fn(&SchedulerEvent) + 'static) -> ListenerId {
        self.inner.borrow_mut().listeners.add(Rc::new(listener))
    }

    /// Unsubscribe. Returns false if the listener was not registered.
    pub fn off_event(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(state) => f
                .debug_struct("Scheduler")
                .field("jobs", &state.registry.len())
                .field("active", &state.active)
                .field("ticks", &state.ticks)
                .finish(),
            Err(_) => f.write_str("Scheduler { <borrowed> }"),
        }
    }
}
