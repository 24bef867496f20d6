//! Turn-by-turn execution.
//!
//! A turn is one callback run to completion: an event handler, a timer
//! firing, or a request settlement. After every turn the tree's pending
//! mutation records are delivered to the engine as one batch, which is when
//! a real host's mutation observer would run.

use quiesce_engine::{Engine, EngineConfig, Host, Scope, TimelineReport, TriggerEvent};
use quiesce_foundation::{Clock, TimelineId};
use quiesce_tree::Tree;
use tracing::trace;

use crate::clock::ms_to_us;
use crate::host::{FiredTimer, SimHost, Task};

// =============================================================================
// Event Loop
// =============================================================================

/// Drives a [`SimHost`] and an [`Engine`] together.
#[derive(Debug)]
pub struct EventLoop {
    engine: Engine,
    host: SimHost,
    turns: u64,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EventLoop {
    /// Creates a loop with a fresh host.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_host(config, SimHost::new())
    }

    /// Creates a loop around an existing host.
    #[must_use]
    pub fn with_host(config: EngineConfig, host: SimHost) -> Self {
        Self {
            engine: Engine::new(config),
            host,
            turns: 0,
        }
    }

    /// Starts observing the tree and starts the engine.
    pub fn start<F>(&mut self, on_complete: F)
    where
        F: FnMut(&TimelineReport) + 'static,
    {
        self.host.tree_mut().observe();
        self.engine.start(&self.host, on_complete);
    }

    /// Stops the engine and the mutation observer.
    pub fn stop(&mut self) {
        self.engine.stop();
        self.host.tree_mut().disconnect();
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the engine mutably.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &SimHost {
        &self.host
    }

    /// Returns the host mutably.
    pub fn host_mut(&mut self) -> &mut SimHost {
        &mut self.host
    }

    /// Returns the UI tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        quiesce_engine::HostEnv::tree(&self.host)
    }

    /// Returns the UI tree mutably.
    ///
    /// Changes made here outside a turn are delivered with the next turn's batch.
    pub fn tree_mut(&mut self) -> &mut Tree {
        self.host.tree_mut()
    }

    /// Returns the current virtual time in ms.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.host.now()
    }

    /// Returns the number of turns run.
    #[must_use]
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Forces a flush boundary.
    pub fn flush(&mut self) -> Vec<TimelineId> {
        self.engine.flush()
    }

    // -------------------------------------------------------------------------
    // Turns
    // -------------------------------------------------------------------------

    /// Runs `turn` as one turn and delivers its mutations.
    pub fn run<R>(&mut self, turn: impl FnOnce(&mut Scope<'_, SimHost>) -> R) -> R {
        let out = {
            let mut scope = Scope::new(&mut self.engine, &mut self.host);
            turn(&mut scope)
        };
        self.end_turn();
        out
    }

    /// Delivers an external event now, then runs its handler as one turn.
    ///
    /// Returns true if the engine accepted the event as a trigger. The
    /// handler runs either way.
    pub fn dispatch(
        &mut self,
        event: TriggerEvent,
        handler: impl FnOnce(&mut Scope<'_, SimHost>),
    ) -> bool {
        let accepted = self.engine.capture_trigger(&self.host, &event);
        trace!(kind = %event.kind, accepted, "event dispatched");
        self.run(handler);
        accepted
    }

    /// Schedules an external event `delay` ms from now.
    pub fn schedule_event(
        &mut self,
        delay: f64,
        event: TriggerEvent,
        handler: impl FnOnce(&mut Scope<'_, SimHost>) + 'static,
    ) {
        self.host.schedule_event(delay, event, Box::new(handler));
    }

    /// Runs the next due task, advancing virtual time to it.
    ///
    /// Returns false if nothing is scheduled.
    pub fn step(&mut self) -> bool {
        self.step_until(u64::MAX)
    }

    /// Runs the next task due at or before `deadline_us`.
    pub fn step_until(&mut self, deadline_us: u64) -> bool {
        let Some((due, task)) = self.host.pop_task(deadline_us) else {
            return false;
        };
        self.host.clock_mut().advance_to_us(due);
        match task {
            Task::Timer { handle, uid } => match self.host.take_fired(handle, uid) {
                Some(FiredTimer::Once(callback)) => {
                    self.run(move |scope| callback(scope, handle));
                }
                Some(FiredTimer::Recurring(mut callback)) => {
                    self.run(|scope| callback(scope, handle));
                    self.host.restore_interval(handle, uid, callback);
                }
                None => trace!(%handle, "stale timer skipped"),
            },
            Task::Settle { ticket } => {
                if let Some((callback, settlement)) = self.host.take_settlement(ticket) {
                    self.run(move |scope| callback(scope, &settlement));
                }
            }
            Task::Event { ticket } => {
                if let Some(scheduled) = self.host.take_event(ticket) {
                    self.dispatch(scheduled.event, scheduled.handler);
                }
            }
        }
        true
    }

    /// Runs tasks until none remain or `max_steps` have run.
    ///
    /// Returns the number of steps taken.
    pub fn run_until_idle(&mut self, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps && self.step() {
            steps += 1;
        }
        steps
    }

    /// Runs every task due in the next `ms` and advances time by `ms`.
    pub fn run_for(&mut self, ms: f64) -> usize {
        let deadline = self.host.clock().now_us().saturating_add(ms_to_us(ms));
        let mut steps = 0;
        while self.step_until(deadline) {
            steps += 1;
        }
        self.host.clock_mut().advance_to_us(deadline);
        steps
    }

    fn end_turn(&mut self) {
        self.turns += 1;
        let records = self.host.tree_mut().take_records();
        if records.is_empty() {
            return;
        }
        trace!(turn = self.turns, records = records.len(), "delivering mutations");
        if let Some(mark) = self.engine.observe_mutations(&self.host, &records) {
            trace!(timeline = %mark.timeline_id, "render recorded");
        }
    }
}
