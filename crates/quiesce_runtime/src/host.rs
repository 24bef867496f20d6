//! The simulated host.
//!
//! [`SimHost`] keeps an agenda of due tasks ordered by virtual time and
//! scheduling order. Timer handles are recycled: the smallest free handle is
//! reused, the way real hosts reuse ids once a timer is gone.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use quiesce_engine::{
    Host, HostEnv, HostIntervalCallback, HostSettleCallback, HostTimerCallback, NetworkTransport,
    ResourceTiming, Scope, Settlement, TimerProvider, TriggerEvent,
};
use quiesce_foundation::{Clock, MemoryProbe, MemorySnapshot, TimerHandle};
use quiesce_tree::Tree;
use tracing::trace;

use crate::clock::{VirtualClock, ms_to_us, us_to_ms};
use crate::network::{Route, SimNetwork, timing_entry};

/// Handler run for a scheduled event.
pub type EventHandler = Box<dyn FnOnce(&mut Scope<'_, SimHost>)>;

// =============================================================================
// Agenda
// =============================================================================

/// A unit of work due at some virtual time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Task {
    Timer { handle: TimerHandle, uid: u64 },
    Settle { ticket: u64 },
    Event { ticket: u64 },
}

enum TimerCallback {
    Once(HostTimerCallback<SimHost>),
    Recurring {
        period_us: u64,
        callback: Option<HostIntervalCallback<SimHost>>,
    },
}

struct TimerEntry {
    uid: u64,
    callback: TimerCallback,
}

/// A timer callback taken out of the host to be run.
pub(crate) enum FiredTimer {
    Once(HostTimerCallback<SimHost>),
    Recurring(HostIntervalCallback<SimHost>),
}

struct Exchange {
    url: String,
    sent_at: f64,
    route: Route,
    callback: HostSettleCallback<SimHost>,
}

pub(crate) struct ScheduledEvent {
    pub(crate) event: TriggerEvent,
    pub(crate) handler: EventHandler,
}

// =============================================================================
// Sim Host
// =============================================================================

/// A deterministic single-threaded host.
pub struct SimHost {
    clock: VirtualClock,
    tree: Tree,
    memory: Option<MemorySnapshot>,
    network: SimNetwork,
    agenda: BTreeMap<(u64, u64), Task>,
    next_seq: u64,
    timers: HashMap<TimerHandle, TimerEntry>,
    free_handles: BTreeSet<u64>,
    next_handle: u64,
    next_uid: u64,
    exchanges: HashMap<u64, Exchange>,
    events: HashMap<u64, ScheduledEvent>,
    next_ticket: u64,
}

impl fmt::Debug for SimHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimHost")
            .field("clock", &self.clock)
            .field("nodes", &self.tree.len())
            .field("agenda", &self.agenda.len())
            .field("timers", &self.timers.len())
            .field("exchanges", &self.exchanges.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Creates a host at virtual time zero with an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(VirtualClock::default())
    }

    /// Creates a host with the given clock.
    #[must_use]
    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            clock,
            tree: Tree::new(),
            memory: None,
            network: SimNetwork::new(),
            agenda: BTreeMap::new(),
            next_seq: 0,
            timers: HashMap::new(),
            free_handles: BTreeSet::new(),
            next_handle: 0,
            next_uid: 0,
            exchanges: HashMap::new(),
            events: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Returns the virtual clock.
    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// Returns the virtual clock mutably.
    pub fn clock_mut(&mut self) -> &mut VirtualClock {
        &mut self.clock
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    /// Returns the network mutably.
    pub fn network_mut(&mut self) -> &mut SimNetwork {
        &mut self.network
    }

    /// Sets the heap usage the host reports.
    pub fn set_memory(&mut self, memory: Option<MemorySnapshot>) {
        self.memory = memory;
    }

    /// Returns the number of live timers.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// Returns the number of requests not yet settled.
    #[must_use]
    pub fn inflight_requests(&self) -> usize {
        self.exchanges.len()
    }

    /// Returns true if nothing is due.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.agenda.is_empty()
    }

    /// Returns the virtual time of the next due task, in ms.
    #[must_use]
    pub fn next_due(&self) -> Option<f64> {
        self.agenda.keys().next().map(|(due, _)| us_to_ms(*due))
    }

    // -------------------------------------------------------------------------
    // Agenda
    // -------------------------------------------------------------------------

    fn push_task(&mut self, due_us: u64, task: Task) {
        self.next_seq += 1;
        self.agenda.insert((due_us, self.next_seq), task);
    }

    /// Removes the earliest task due at or before `deadline_us`.
    pub(crate) fn pop_task(&mut self, deadline_us: u64) -> Option<(u64, Task)> {
        let (&(due, _), _) = self.agenda.first_key_value()?;
        if due > deadline_us {
            return None;
        }
        self.agenda.pop_first().map(|((due, _), task)| (due, task))
    }

    pub(crate) fn schedule_event(&mut self, delay: f64, event: TriggerEvent, handler: EventHandler) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.events.insert(ticket, ScheduledEvent { event, handler });
        let due = self.clock.now_us().saturating_add(ms_to_us(delay));
        self.push_task(due, Task::Event { ticket });
    }

    pub(crate) fn take_event(&mut self, ticket: u64) -> Option<ScheduledEvent> {
        self.events.remove(&ticket)
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    fn allocate_handle(&mut self) -> TimerHandle {
        if let Some(handle) = self.free_handles.pop_first() {
            return TimerHandle(handle);
        }
        self.next_handle += 1;
        TimerHandle(self.next_handle)
    }

    fn insert_timer(&mut self, callback: TimerCallback, delay_us: u64) -> TimerHandle {
        let handle = self.allocate_handle();
        self.next_uid += 1;
        let uid = self.next_uid;
        self.timers.insert(handle, TimerEntry { uid, callback });
        let due = self.clock.now_us().saturating_add(delay_us);
        self.push_task(due, Task::Timer { handle, uid });
        handle
    }

    /// Takes a due timer's callback out of the host.
    ///
    /// One-shot timers are removed and their handle freed before the
    /// callback runs. Recurring timers are re-armed and must be handed back
    /// with [`SimHost::restore_interval`].
    pub(crate) fn take_fired(&mut self, handle: TimerHandle, uid: u64) -> Option<FiredTimer> {
        let entry = self.timers.get_mut(&handle).filter(|entry| entry.uid == uid)?;
        let recurring = match &mut entry.callback {
            TimerCallback::Recurring {
                period_us,
                callback,
            } => Some((*period_us, callback.take()?)),
            TimerCallback::Once(_) => None,
        };
        if let Some((period_us, callback)) = recurring {
            let due = self.clock.now_us().saturating_add(period_us);
            self.push_task(due, Task::Timer { handle, uid });
            return Some(FiredTimer::Recurring(callback));
        }
        let entry = self.timers.remove(&handle)?;
        self.free_handles.insert(handle.0);
        match entry.callback {
            TimerCallback::Once(callback) => Some(FiredTimer::Once(callback)),
            TimerCallback::Recurring { .. } => None,
        }
    }

    /// Returns a recurring callback after it ran, unless it was cancelled meanwhile.
    pub(crate) fn restore_interval(
        &mut self,
        handle: TimerHandle,
        uid: u64,
        restored: HostIntervalCallback<SimHost>,
    ) {
        let Some(entry) = self.timers.get_mut(&handle).filter(|entry| entry.uid == uid) else {
            return;
        };
        if let TimerCallback::Recurring { callback, .. } = &mut entry.callback {
            *callback = Some(restored);
        }
    }

    // -------------------------------------------------------------------------
    // Network
    // -------------------------------------------------------------------------

    /// Takes a due exchange, recording its timing entry.
    pub(crate) fn take_settlement(
        &mut self,
        ticket: u64,
    ) -> Option<(HostSettleCallback<SimHost>, Settlement)> {
        let exchange = self.exchanges.remove(&ticket)?;
        let route = exchange.route;
        if route.record_timing {
            let name = route.response_url.as_deref().unwrap_or(&exchange.url);
            self.network
                .push_timing(timing_entry(name, exchange.sent_at, route.latency_ms));
        }
        let mut settlement = Settlement::new(route.status);
        settlement.response_url = route.response_url;
        Some((exchange.callback, settlement))
    }
}

impl Clock for SimHost {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn wall_clock_ms(&self) -> u64 {
        self.clock.wall_clock_ms()
    }
}

impl MemoryProbe for SimHost {
    fn memory(&self) -> Option<MemorySnapshot> {
        self.memory
    }
}

impl TimerProvider for SimHost {
    fn schedule(&mut self, callback: HostTimerCallback<Self>, delay: f64) -> TimerHandle {
        let handle = self.insert_timer(TimerCallback::Once(callback), ms_to_us(delay));
        trace!(%handle, delay, "timer scheduled");
        handle
    }

    fn schedule_recurring(
        &mut self,
        callback: HostIntervalCallback<Self>,
        period: f64,
    ) -> TimerHandle {
        let period_us = ms_to_us(period).max(1);
        let handle = self.insert_timer(
            TimerCallback::Recurring {
                period_us,
                callback: Some(callback),
            },
            period_us,
        );
        trace!(%handle, period, "interval scheduled");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if self.timers.remove(&handle).is_some() {
            self.free_handles.insert(handle.0);
            trace!(%handle, "timer cancelled");
        }
    }
}

impl NetworkTransport for SimHost {
    fn send(&mut self, url: &str, on_settle: HostSettleCallback<Self>) {
        let route = self.network.route_for(url);
        self.network.log_send(url);
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let due = self.clock.now_us().saturating_add(ms_to_us(route.latency_ms));
        self.exchanges.insert(
            ticket,
            Exchange {
                url: url.to_string(),
                sent_at: self.clock.now(),
                route,
                callback: on_settle,
            },
        );
        self.push_task(due, Task::Settle { ticket });
        trace!(url, ticket, "request sent");
    }

    fn timing_entries(&self) -> Option<&[ResourceTiming]> {
        self.network
            .timing_supported()
            .then_some(self.network.timing())
    }

    fn clear_timing_entries(&mut self) -> bool {
        if !self.network.timing_supported() {
            return false;
        }
        self.network.clear_timing();
        true
    }
}

impl HostEnv for SimHost {
    type Tree = Tree;

    fn tree(&self) -> &Tree {
        &self.tree
    }
}

impl Host for SimHost {
    fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }
}
