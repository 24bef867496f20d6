//! Instrumented primitives for application code.
//!
//! A [`Scope`] pairs the engine with the host for the duration of one
//! callback. Timers and requests scheduled through it are attributed to the
//! current timeline; while the engine is stopped they pass straight through.

use quiesce_foundation::{Detail, TimerHandle};

use crate::engine::Engine;
use crate::host::Host;
use crate::mark::{Mark, MarkName};
use crate::network::Settlement;

/// The engine and host, borrowed together for one turn.
pub struct Scope<'a, H> {
    pub(crate) engine: &'a mut Engine,
    pub(crate) host: &'a mut H,
}

impl<'a, H: Host> Scope<'a, H> {
    /// Creates a scope.
    pub fn new(engine: &'a mut Engine, host: &'a mut H) -> Self {
        Self { engine, host }
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &*self.engine
    }

    /// Returns the engine mutably.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut *self.engine
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &H {
        &*self.host
    }

    /// Returns the host mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut *self.host
    }

    /// Returns the host UI tree.
    #[must_use]
    pub fn tree(&self) -> &H::Tree {
        self.host.tree()
    }

    /// Returns the host UI tree mutably.
    pub fn tree_mut(&mut self) -> &mut H::Tree {
        self.host.tree_mut()
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Schedules a one-shot callback after `delay` milliseconds.
    pub fn set_timeout<F>(&mut self, delay: f64, callback: F) -> TimerHandle
    where
        F: FnOnce(&mut Scope<'_, H>) + 'static,
    {
        if !self.engine.is_started() {
            return self.host.schedule(
                Box::new(move |scope: &mut Scope<'_, H>, _: TimerHandle| callback(scope)),
                delay,
            );
        }
        let handle = self.host.schedule(
            Box::new(move |scope: &mut Scope<'_, H>, handle: TimerHandle| {
                let tracked = scope.engine.enter_timeout(&*scope.host, handle);
                callback(scope);
                if tracked {
                    scope.engine.leave_timeout(&*scope.host, handle);
                }
            }),
            delay,
        );
        self.engine.timeout_scheduled(&*self.host, handle, delay);
        handle
    }

    /// Schedules a callback every `period` milliseconds until cleared.
    pub fn set_interval<F>(&mut self, period: f64, mut callback: F) -> TimerHandle
    where
        F: FnMut(&mut Scope<'_, H>) + 'static,
    {
        if !self.engine.is_started() {
            return self.host.schedule_recurring(
                Box::new(move |scope: &mut Scope<'_, H>, _: TimerHandle| callback(scope)),
                period,
            );
        }
        let handle = self.host.schedule_recurring(
            Box::new(move |scope: &mut Scope<'_, H>, handle: TimerHandle| {
                let tracked = scope.engine.enter_interval(&*scope.host, handle);
                callback(scope);
                if tracked {
                    scope.engine.leave_interval(&*scope.host, handle);
                }
            }),
            period,
        );
        self.engine.interval_scheduled(&*self.host, handle, period);
        handle
    }

    /// Cancels a one-shot timer.
    pub fn clear_timeout(&mut self, handle: TimerHandle) {
        self.engine.timer_cancelled(handle);
        self.host.cancel(handle);
    }

    /// Cancels a recurring timer.
    pub fn clear_interval(&mut self, handle: TimerHandle) {
        self.engine.timer_cancelled(handle);
        self.host.cancel(handle);
    }

    // -------------------------------------------------------------------------
    // Network
    // -------------------------------------------------------------------------

    /// Sends a request; `on_settle` runs once it settles.
    ///
    /// Completion marks are recorded before `on_settle` runs, so work it
    /// schedules is attributed to the request's timeline.
    pub fn send_request<F>(&mut self, url: &str, on_settle: F)
    where
        F: FnOnce(&mut Scope<'_, H>, &Settlement) + 'static,
    {
        match self.engine.request_sent(&mut *self.host, url) {
            None => self.host.send(
                url,
                Box::new(move |scope: &mut Scope<'_, H>, settlement: &Settlement| {
                    on_settle(scope, settlement);
                }),
            ),
            Some(inflight) => self.host.send(
                url,
                Box::new(move |scope: &mut Scope<'_, H>, settlement: &Settlement| {
                    scope.engine.request_settled(&*scope.host, inflight, settlement);
                    on_settle(scope, settlement);
                }),
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Marks
    // -------------------------------------------------------------------------

    /// Records an application mark on the current timeline.
    pub fn add_mark(
        &mut self,
        name: impl Into<MarkName>,
        detail: Option<Detail>,
        at: Option<f64>,
    ) -> Option<Mark> {
        self.engine.add_mark(&*self.host, name, detail, at)
    }
}
