use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::events::{Effect, Effects, SchedulerEvent, TickerSignal};

use super::core::{Scheduler, SchedulerState};

/// What one call to [`Scheduler::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// Tick number (0 when nothing was dispatched).
    pub tick: u64,
    /// Jobs invoked, in order.
    pub invoked: Vec<String>,
    /// Jobs that reached `done` during this tick.
    pub completed: Vec<String>,
    /// Replenishment rounds applied before selection.
    pub replenish_rounds: u32,
    /// The running set was empty and the loop suspended.
    pub suspended: bool,
}

/// Clears `in_tick` even if a callback unwinds out of the tick.
struct TickGuard<'a>(&'a RefCell<SchedulerState>);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            state.in_tick = false;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Scheduler {
    /// Run one scheduling cycle. Called by the tick source.
    ///
    /// 1. If nothing is running, suspend the tick source and return.
    /// 2. Let the fairness allocator pick the running jobs holding credit
    ///    (replenishing first if none does).
    /// 3. Invoke each picked job once, measuring its duration, and route the
    ///    result back into its lifecycle. Completions fire `on_done` and
    ///    promote dependents, which join from the next tick.
    ///
    /// Jobs registered or removed from inside a body take effect on the
    /// next tick; the picked set is fixed when the tick starts. A body that
    /// panics ends its own job and the tick carries on.
    pub fn tick(&self) -> TickReport {
        let mut effects = Effects::default();
        let (selection, clock, tick) = {
            let mut guard = self.inner.borrow_mut();
            let state = &mut *guard;

            if state.in_tick {
                warn!("tick requested from inside a running tick; ignored");
                return TickReport::default();
            }

            if !state.registry.has_running() {
                state.idle(&mut effects);
                drop(guard);
                self.flush(effects);
                return TickReport {
                    suspended: true,
                    ..TickReport::default()
                };
            }

            state.in_tick = true;
            state.ticks += 1;
            let selection = state.allocator.select(state.registry.running_mut());
            effects.event(SchedulerEvent::EnterTick);
            (selection, Rc::clone(&state.clock), state.ticks)
        };
        let guard = TickGuard(&self.inner);
        self.flush(effects);

        let mut report = TickReport {
            tick,
            replenish_rounds: selection.rounds,
            ..TickReport::default()
        };

        for (id, serial) in selection.jobs {
            let body = {
                let mut state = self.inner.borrow_mut();
                match state.registry.get_mut(&id) {
                    Some(job) if job.serial == serial => job.body.take(),
                    _ => None,
                }
            };
            // Removed or finished earlier in this tick.
            let Some(mut body) = body else {
                continue;
            };

            let started = clock.now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| body.call())).map_err(panic_message);
            let elapsed = clock.now().saturating_sub(started);

            let mut effects = Effects::default();
            let completed = self.inner.borrow_mut().finish_invocation(
                &id,
                serial,
                body,
                elapsed,
                outcome,
                &mut effects,
            );
            report.invoked.push(id.clone());
            if completed {
                report.completed.push(id);
            }
            self.flush(effects);
        }

        drop(guard);
        let mut effects = Effects::default();
        effects.event(SchedulerEvent::LeaveTick);
        self.flush(effects);

        debug!(
            tick,
            invoked = report.invoked.len(),
            completed = report.completed.len(),
            rounds = report.replenish_rounds,
            "tick finished"
        );
        report
    }

    /// Run deferred effects with the state borrow released. A panicking
    /// listener or `on_done` callback is logged and the rest of the queue
    /// still runs.
    pub(super) fn flush(&self, effects: Effects) {
        let Effects {
            signal,
            queue,
            retired_bodies,
            retired_jobs,
        } = effects;

        if signal.is_some() || !queue.is_empty() {
            let (ticker, listeners) = {
                let state = self.inner.borrow();
                (Rc::clone(&state.ticker), state.listeners.snapshot())
            };

            match signal {
                Some(TickerSignal::Resume) => ticker.resume(),
                Some(TickerSignal::Suspend) => ticker.suspend(),
                None => {}
            }

            for effect in queue {
                match effect {
                    Effect::Event(event) => {
                        for listener in &listeners {
                            if let Err(payload) =
                                panic::catch_unwind(AssertUnwindSafe(|| listener(&event)))
                            {
                                warn!(?event, error = %panic_message(payload), "event listener panicked");
                            }
                        }
                    }
                    Effect::Callback(callback) => {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                            warn!(error = %panic_message(payload), "on_done callback panicked");
                        }
                    }
                }
            }
        }

        drop(retired_bodies);
        drop(retired_jobs);
    }
}
