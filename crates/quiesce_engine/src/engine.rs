//! The instrumentation facade.
//!
//! [`Engine`] ties the registry, pending-work bookkeeping, chain detection,
//! mutation correlation and dispatch together. Application code reaches it
//! through a [`Scope`](crate::Scope); hosts call [`Engine::capture_trigger`]
//! for external events and [`Engine::observe_mutations`] after each turn.

use std::backtrace::Backtrace;
use std::collections::HashMap;

use quiesce_foundation::{Clock, Detail, DetailValue, Error, RequestId, TimelineId, TimerHandle};
use quiesce_tree::{MutationRecord, TreeInspector};
use tracing::{debug, error, trace, warn};

use crate::chain::{ChainDetector, IntervalFiring, IntervalPolicy};
use crate::config::EngineConfig;
use crate::correlator;
use crate::dispatch::{Dispatcher, TimelineReport};
use crate::host::{Host, HostEnv};
use crate::labels::Labeler;
use crate::mark::{Mark, MarkName, MarkStore};
use crate::network::{Settlement, TimingPhase, closest_entry};
use crate::pending::{PendingWork, WorkId};
use crate::timeline::{
    HeapUsage, Timeline, TimelineRegistry, TimelineSeed, Trigger, TriggerEvent,
};

/// Synthetic trigger for each firing of a runaway timer chain.
pub const PSEUDO_INTERVAL_TRIGGER: &str = "pseudo_interval";

/// Synthetic trigger for untracked interval firings.
pub const INTERVAL_TRIGGER: &str = "interval";

// =============================================================================
// Internal Records
// =============================================================================

#[derive(Clone, Debug)]
struct TimeoutRecord {
    runaway: bool,
    stack: Option<String>,
}

#[derive(Clone, Debug)]
struct IntervalRecord {
    policy: IntervalPolicy,
    release_after_callback: bool,
    stack: Option<String>,
}

/// The timer whose callback is running, for chain depth of timers it schedules.
#[derive(Clone, Copy, Debug)]
struct TimerFrame {
    handle: TimerHandle,
    depth: u32,
}

/// A tracked request between send and settlement.
#[derive(Clone, Debug)]
pub(crate) struct InflightRequest {
    id: RequestId,
    timeline: TimelineId,
    url: String,
    sent_at: f64,
}

// =============================================================================
// Engine
// =============================================================================

/// Reconstructs which asynchronous work belongs to which user action.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    labeler: Labeler,
    started: bool,
    registry: TimelineRegistry,
    marks: MarkStore,
    pending: PendingWork,
    chains: ChainDetector,
    dispatcher: Dispatcher,
    timeouts: HashMap<TimerHandle, TimeoutRecord>,
    intervals: HashMap<TimerHandle, IntervalRecord>,
    frames: Vec<TimerFrame>,
    next_request: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Creates a stopped engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            labeler: Labeler::from_config(&config),
            chains: ChainDetector::new(config.chain_depth_limit),
            config,
            started: false,
            registry: TimelineRegistry::new(),
            marks: MarkStore::new(),
            pending: PendingWork::new(),
            dispatcher: Dispatcher::new(),
            timeouts: HashMap::new(),
            intervals: HashMap::new(),
            frames: Vec::new(),
            next_request: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns true while instrumentation is active.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Starts instrumentation and installs the completion callback.
    ///
    /// The first start queues the configured initial trigger so work that
    /// happens before any interaction is captured.
    pub fn start<C, F>(&mut self, clock: &C, on_complete: F)
    where
        C: Clock + ?Sized,
        F: FnMut(&TimelineReport) + 'static,
    {
        self.dispatcher.set_callback(Box::new(on_complete));
        self.started = true;
        let untouched = self.registry.is_empty()
            && self.registry.queued().is_none()
            && self.registry.current_id().is_none();
        if untouched {
            if let Some(kind) = self.config.initial_trigger.clone() {
                self.registry.queue(Trigger::new(kind, None, clock.now()));
            }
        }
        debug!("engine started");
    }

    /// Stops instrumentation. Primitives pass through until restarted.
    pub fn stop(&mut self) {
        self.started = false;
        debug!("engine stopped");
    }

    // -------------------------------------------------------------------------
    // Triggers and Marks
    // -------------------------------------------------------------------------

    /// Captures an external event, starting a new causal scope.
    ///
    /// Events outside the configured trigger set are ignored. Returns true
    /// if the event was accepted.
    pub fn capture_trigger<C: Clock + ?Sized>(&mut self, clock: &C, event: &TriggerEvent) -> bool {
        if !self.started || !self.config.is_trigger_event(&event.kind) {
            return false;
        }
        self.queue_trigger(Trigger::new(event.kind.clone(), event.target, clock.now()));
        true
    }

    /// Records an application mark on the current timeline.
    ///
    /// A queued trigger becomes a timeline here if none is current. Returns
    /// `None` when stopped or when there is nothing to attribute the mark to.
    pub fn add_mark<E: HostEnv + ?Sized>(
        &mut self,
        env: &E,
        name: impl Into<MarkName>,
        detail: Option<Detail>,
        at: Option<f64>,
    ) -> Option<Mark> {
        if !self.started {
            return None;
        }
        self.mark(env, name.into(), detail, at)
    }

    /// Removes and returns every buffered mark.
    pub fn pop_all_marks(&mut self) -> Vec<Mark> {
        self.marks.pop_all()
    }

    /// Returns snapshots of timelines created since the last call.
    pub fn pop_all_timelines(&mut self) -> Vec<Timeline> {
        self.registry.pop_all()
    }

    /// Reports every quiesced timeline and clears the current timeline.
    pub fn flush(&mut self) -> Vec<TimelineId> {
        if !self.started {
            return Vec::new();
        }
        self.dispatcher
            .flush(&mut self.pending, &mut self.registry, &self.marks)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Returns the current timeline without materializing a queued trigger.
    #[must_use]
    pub fn current_timeline(&self) -> Option<&Timeline> {
        self.registry.current_id().and_then(|id| self.registry.get(id))
    }

    /// Returns a live timeline by id.
    #[must_use]
    pub fn timeline(&self, id: TimelineId) -> Option<&Timeline> {
        self.registry.get(id)
    }

    /// Returns the timeline registry.
    #[must_use]
    pub fn registry(&self) -> &TimelineRegistry {
        &self.registry
    }

    /// Returns the buffered marks.
    #[must_use]
    pub fn marks(&self) -> &MarkStore {
        &self.marks
    }

    /// Returns the pending-work bookkeeping.
    #[must_use]
    pub fn pending_work(&self) -> &PendingWork {
        &self.pending
    }

    /// Returns the chain detector.
    #[must_use]
    pub fn chains(&self) -> &ChainDetector {
        &self.chains
    }

    /// Returns how many timelines have been dispatched.
    #[must_use]
    pub fn dispatched_count(&self) -> u64 {
        self.dispatcher.dispatched()
    }

    // -------------------------------------------------------------------------
    // Mutation Observation
    // -------------------------------------------------------------------------

    /// Correlates one batch of tree mutations with the current timeline.
    ///
    /// Records a `render` mark summarizing labeled changes, and extends any
    /// timeline whose retained detached subtree appears among the removals.
    pub fn observe_mutations<E: HostEnv + ?Sized>(
        &mut self,
        env: &E,
        records: &[MutationRecord],
    ) -> Option<Mark> {
        if !self.started || records.is_empty() {
            return None;
        }
        let id = self.current(env)?;
        let tree = env.tree();
        let summary = correlator::summarize(&self.labeler, tree, records);

        for retaining in self.registry.retaining() {
            let Some(timeline) = self.registry.get_mut(retaining) else {
                continue;
            };
            if correlator::recover_detached(&self.labeler, tree, timeline, records) {
                trace!(timeline = %retaining, "recovered detached ancestry");
            }
        }

        let num_timeouts = self.registry.get(id).map_or(0, Timeline::timeouts_set);
        let mut detail = Detail::new();
        detail.insert("components".to_string(), summary.components().into());
        detail.insert("num_timeouts".to_string(), num_timeouts.into());
        self.mark(env, MarkName::Render, Some(detail), None)
    }

    // -------------------------------------------------------------------------
    // Timer Hooks
    // -------------------------------------------------------------------------

    pub(crate) fn timeout_scheduled<E: HostEnv + ?Sized>(
        &mut self,
        env: &E,
        handle: TimerHandle,
        delay: f64,
    ) {
        let parent = self.frames.last().map(|frame| frame.depth);
        let verdict = self.chains.on_schedule(handle, parent);
        let runaway = verdict.is_runaway();
        let stack = self.capture_stack();

        let mut detail = stack_detail(stack.as_deref());
        detail.insert("delay".to_string(), delay.into());
        if runaway {
            detail.insert("non_terminating".to_string(), true.into());
            debug!(%handle, depth = verdict.depth(), "runaway timer chain");
        }
        self.mark(env, MarkName::SetTimeout, Some(detail), None);

        let owner = if runaway { None } else { self.current(env) };
        if let Some(id) = owner {
            if let Some(timeline) = self.registry.get_mut(id) {
                timeline.timeouts_set += 1;
            }
            self.pending
                .register(WorkId::Timer(handle), id, &mut self.registry);
        }
        self.timeouts.insert(handle, TimeoutRecord { runaway, stack });
    }

    /// Completes the firing timer's work; returns false while stopped, when
    /// the callback runs without marks.
    pub(crate) fn enter_timeout<E: HostEnv + ?Sized>(&mut self, env: &E, handle: TimerHandle) -> bool {
        let Some(record) = self.timeouts.remove(&handle) else {
            return false;
        };
        let depth = self.chains.take(handle).unwrap_or(0);
        let owner = if record.runaway {
            None
        } else {
            self.pending.complete(WorkId::Timer(handle), &mut self.registry)
        };
        if !self.started {
            return false;
        }
        if record.runaway {
            self.queue_trigger(Trigger::new(PSEUDO_INTERVAL_TRIGGER, None, env.now()));
        } else {
            self.registry.set_current(owner);
        }
        self.frames.push(TimerFrame { handle, depth });
        let detail = stack_detail(record.stack.as_deref());
        self.mark(env, MarkName::TimeoutCallback, Some(detail), None);
        true
    }

    pub(crate) fn leave_timeout<E: HostEnv + ?Sized>(&mut self, env: &E, handle: TimerHandle) {
        self.pop_frame(handle);
        if self.started {
            self.mark(env, MarkName::TimeoutCallbackDone, None, None);
        }
    }

    pub(crate) fn interval_scheduled<E: HostEnv + ?Sized>(
        &mut self,
        env: &E,
        handle: TimerHandle,
        period: f64,
    ) {
        let policy = IntervalPolicy::new(
            period,
            self.config.max_interval_firings,
            self.config.long_interval_period,
        );
        let stack = self.capture_stack();
        let mut detail = stack_detail(stack.as_deref());
        detail.insert("delay".to_string(), period.into());
        self.mark(env, MarkName::SetInterval, Some(detail), None);

        let owner = if policy.is_tracked() { self.current(env) } else { None };
        if let Some(id) = owner {
            if let Some(timeline) = self.registry.get_mut(id) {
                timeline.intervals_set += 1;
            }
            self.pending
                .register(WorkId::Timer(handle), id, &mut self.registry);
        }
        self.intervals.insert(
            handle,
            IntervalRecord {
                policy,
                release_after_callback: false,
                stack,
            },
        );
    }

    pub(crate) fn enter_interval<E: HostEnv + ?Sized>(&mut self, env: &E, handle: TimerHandle) -> bool {
        let Some(record) = self.intervals.get_mut(&handle) else {
            warn!(%handle, "interval fired without bookkeeping");
            return false;
        };
        let firing = record.policy.on_fire();
        if !self.started {
            if let IntervalFiring::Tracked { last: true, .. } = firing {
                self.pending
                    .complete(WorkId::Timer(handle), &mut self.registry);
            }
            return false;
        }
        let stack = record.stack.clone();
        match firing {
            IntervalFiring::Tracked { last, .. } => {
                record.release_after_callback = last;
                let owner = self.pending.owner(WorkId::Timer(handle));
                self.registry.set_current(owner);
            }
            IntervalFiring::Untracked => {
                self.queue_trigger(Trigger::new(INTERVAL_TRIGGER, None, env.now()));
            }
        }
        let detail = stack_detail(stack.as_deref());
        self.mark(env, MarkName::IntervalCallback, Some(detail), None);
        true
    }

    pub(crate) fn leave_interval<E: HostEnv + ?Sized>(&mut self, env: &E, handle: TimerHandle) {
        if self.started {
            self.mark(env, MarkName::IntervalCallbackDone, None, None);
        }
        let release = self
            .intervals
            .get_mut(&handle)
            .is_some_and(|record| std::mem::take(&mut record.release_after_callback));
        if release {
            self.pending
                .complete(WorkId::Timer(handle), &mut self.registry);
        }
    }

    pub(crate) fn timer_cancelled(&mut self, handle: TimerHandle) {
        self.pending
            .complete(WorkId::Timer(handle), &mut self.registry);
        self.timeouts.remove(&handle);
        self.intervals.remove(&handle);
        self.chains.forget(handle);
    }

    // -------------------------------------------------------------------------
    // Network Hooks
    // -------------------------------------------------------------------------

    pub(crate) fn request_sent<H: Host>(&mut self, host: &mut H, url: &str) -> Option<InflightRequest> {
        if !self.started {
            return None;
        }
        let timeline = self.current(&*host)?;
        self.next_request += 1;
        let id = RequestId(self.next_request);

        let num_timeouts = self.registry.get(timeline).map_or(0, Timeline::timeouts_set);
        let mut detail = Detail::new();
        detail.insert("num_timeouts".to_string(), num_timeouts.into());
        detail.insert("url".to_string(), url.into());
        let sent_at = self
            .mark(&*host, MarkName::NetworkSend, Some(detail), None)
            .map_or_else(|| host.now(), |mark| mark.absolute_time());

        self.pending
            .register(WorkId::Request(id), timeline, &mut self.registry);

        let buffered = host.timing_entries().map_or(0, <[_]>::len);
        if buffered >= self.config.timing_capacity && !host.clear_timing_entries() {
            debug!(buffered, "timing buffer full and cannot be cleared");
        }

        Some(InflightRequest {
            id,
            timeline,
            url: url.to_string(),
            sent_at,
        })
    }

    pub(crate) fn request_settled<H: Host>(
        &mut self,
        host: &H,
        inflight: InflightRequest,
        settlement: &Settlement,
    ) {
        let resolved = self
            .pending
            .complete(WorkId::Request(inflight.id), &mut self.registry);
        if !self.started {
            return;
        }
        if resolved != Some(inflight.timeline) {
            attribution_violation(inflight.timeline, resolved);
            return;
        }
        self.registry.set_current(resolved);

        let num_timeouts = self
            .registry
            .get(inflight.timeline)
            .map_or(0, Timeline::timeouts_set);
        let mut detail = Detail::new();
        detail.insert("num_timeouts".to_string(), num_timeouts.into());
        detail.insert("url".to_string(), inflight.url.as_str().into());
        detail.insert("status".to_string(), u32::from(settlement.status).into());
        if let Some(hook) = &self.config.network_detail {
            detail = hook(settlement).union(detail);
        }

        let name = if settlement.is_success() {
            MarkName::NetworkSuccess
        } else {
            MarkName::NetworkError
        };
        self.mark(host, name, Some(detail.clone()), None);

        let lookup = settlement.response_url.as_deref().unwrap_or(&inflight.url);
        let entry = host
            .timing_entries()
            .and_then(|entries| closest_entry(entries, lookup, inflight.sent_at))
            .cloned();
        match entry {
            Some(entry) => {
                for phase in TimingPhase::ALL {
                    let at = entry.phase(phase);
                    if at != 0.0 {
                        self.mark(host, MarkName::NetworkTiming(phase), Some(detail.clone()), Some(at));
                    }
                }
            }
            None if settlement.is_success() => {
                debug!(url = lookup, "no resource timing entry after request was sent");
            }
            None => {}
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Flushes quiesced timelines and queues a new trigger.
    fn queue_trigger(&mut self, trigger: Trigger) {
        self.flush();
        trace!(kind = %trigger.kind, "trigger queued");
        self.registry.queue(trigger);
    }

    /// Returns the current timeline, materializing a queued trigger if needed.
    fn current<E: HostEnv + ?Sized>(&mut self, env: &E) -> Option<TimelineId> {
        if let Some(id) = self.registry.current_id() {
            return Some(id);
        }
        let trigger = self.registry.take_queued()?;
        let tree = env.tree();
        let (labels, retained_parent) = match trigger.target.filter(|t| tree.contains(*t)) {
            Some(target) => {
                let walk = self.labeler.ancestors(tree, target, true);
                let retained = (walk.top != tree.root()).then_some(walk.top);
                (walk.labels, retained)
            }
            None => (Vec::new(), None),
        };
        let seed = TimelineSeed {
            labels,
            retained_parent,
            wall_clock_ms: env.wall_clock_ms(),
            heap: env.memory().map(HeapUsage::from),
        };
        let kind = trigger.kind.clone();
        let id = self.registry.begin(trigger, seed);
        self.pending.watch(id);
        debug!(timeline = %id, action = %kind, "timeline created");
        Some(id)
    }

    fn mark<E: HostEnv + ?Sized>(
        &mut self,
        env: &E,
        name: MarkName,
        detail: Option<Detail>,
        at: Option<f64>,
    ) -> Option<Mark> {
        let id = self.current(env)?;
        let timeline = self.registry.get(id)?;
        let mark = Mark::new(timeline, name, env.now(), at, detail);
        trace!(timeline = %id, mark = %mark.name, at = mark.timestamp, "mark");
        self.marks.push(mark.clone());
        Some(mark)
    }

    fn pop_frame(&mut self, handle: TimerHandle) {
        if let Some(position) = self.frames.iter().rposition(|frame| frame.handle == handle) {
            self.frames.truncate(position);
        }
    }

    fn capture_stack(&self) -> Option<String> {
        self.config
            .log_timeout_stacks
            .then(|| Backtrace::force_capture().to_string())
    }
}

fn stack_detail(stack: Option<&str>) -> Detail {
    let mut detail = Detail::new();
    if let Some(stack) = stack {
        detail.insert("stack".to_string(), DetailValue::from(stack));
    }
    detail
}

fn attribution_violation(expected: TimelineId, actual: Option<TimelineId>) {
    let err = Error::attribution_mismatch(expected, actual);
    error!(%err, "request settled on a different timeline than it was sent from");
    debug_assert!(actual == Some(expected), "{err}");
}
