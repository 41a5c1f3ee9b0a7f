//! Lifecycle notifications and the deferred side effects of a scheduler call.
//!
//! Nothing user-supplied runs while the scheduler state is borrowed: mutating
//! operations collect [`Effect`]s and the runner flushes them afterwards, which
//! is what makes reentrant calls from listeners, bodies and `on_done`
//! callbacks safe.

use std::rc::Rc;

use serde::Serialize;

use crate::job::{DoneCallback, Job, JobBody};

/// Notification emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "job_id", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// The loop resumed its tick source.
    Start,
    /// The loop suspended its tick source.
    Stop,
    EnterTick,
    LeaveTick,
    /// A job entered `running`.
    JobStarted(String),
    /// A job reached `done`.
    JobEnded(String),
}

/// Handle returned by [`Scheduler::on_event`](crate::Scheduler::on_event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Listener = Rc<dyn Fn(&SchedulerEvent)>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub fn add(&mut self, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| Rc::clone(l)).collect()
    }
}

/// Desired state of the tick source after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickerSignal {
    Resume,
    Suspend,
}

pub(crate) enum Effect {
    Event(SchedulerEvent),
    Callback(DoneCallback),
}

/// Side effects gathered under the state borrow, run once it is released.
/// Retired bodies and records are only dropped with the `Effects`, so user
/// closures are never destroyed while the state is borrowed.
#[derive(Default)]
pub(crate) struct Effects {
    pub signal: Option<TickerSignal>,
    pub queue: Vec<Effect>,
    pub retired_bodies: Vec<JobBody>,
    pub retired_jobs: Vec<Job>,
}

impl Effects {
    pub fn event(&mut self, event: SchedulerEvent) {
        self.queue.push(Effect::Event(event));
    }

    pub fn callback(&mut self, callback: DoneCallback) {
        self.queue.push(Effect::Callback(callback));
    }

    pub fn retire_body(&mut self, body: JobBody) {
        self.retired_bodies.push(body);
    }

    pub fn retire_jobs(&mut self, jobs: impl IntoIterator<Item = Job>) {
        self.retired_jobs.extend(jobs);
    }

    pub fn signal(&mut self, signal: TickerSignal) {
        self.signal = Some(signal);
    }
}
