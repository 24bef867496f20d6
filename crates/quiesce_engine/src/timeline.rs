//! Timelines and their registry.
//!
//! A timeline is the causal record of one user-perceived action: the trigger
//! that started it, the labels of the UI it touched, and how much work is
//! still outstanding on its behalf.
//!
//! The registry creates timelines lazily. A captured trigger is only
//! queued; the timeline is materialized the first time something needs to
//! be attributed to it, so triggers that cause no work cost nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use quiesce_foundation::{MemorySnapshot, NodeId, TimelineId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// =============================================================================
// Triggers
// =============================================================================

/// An event observed by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TriggerEvent {
    /// Event type, e.g. `"click"`.
    pub kind: String,
    /// The node the event fired on, if any.
    pub target: Option<NodeId>,
}

impl TriggerEvent {
    /// Creates an event with a target node.
    #[must_use]
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target: Some(target),
        }
    }

    /// Creates an event with no target node.
    #[must_use]
    pub fn untargeted(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
        }
    }
}

/// A trigger waiting to become a timeline.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Trigger {
    /// Event type; becomes the timeline's action.
    pub kind: String,
    /// Event target, used for labels.
    pub target: Option<NodeId>,
    /// Host timestamp when the trigger was received; becomes the baseline.
    pub received_at: f64,
}

impl Trigger {
    /// Creates a trigger.
    #[must_use]
    pub fn new(kind: impl Into<String>, target: Option<NodeId>, received_at: f64) -> Self {
        Self {
            kind: kind.into(),
            target,
            received_at,
        }
    }
}

// =============================================================================
// Timeline
// =============================================================================

/// Lifecycle state of a timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimelineState {
    /// Created, nothing registered yet.
    Open,
    /// At least one unit of work is outstanding.
    Waiting,
    /// No work outstanding; eligible for dispatch.
    NotWaiting,
    /// Reported.
    Dispatched,
}

/// Heap usage in megabytes at timeline creation.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeapUsage {
    /// Used heap, MB.
    pub used_mb: f64,
    /// Reserved heap, MB.
    pub total_mb: f64,
    /// Heap limit, MB.
    pub limit_mb: f64,
}

impl From<MemorySnapshot> for HeapUsage {
    #[allow(clippy::cast_precision_loss)]
    fn from(snapshot: MemorySnapshot) -> Self {
        Self {
            used_mb: snapshot.used_bytes as f64 / 1e6,
            total_mb: snapshot.total_bytes as f64 / 1e6,
            limit_mb: snapshot.limit_bytes as f64 / 1e6,
        }
    }
}

/// The causal record of one user action.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Timeline {
    pub(crate) id: TimelineId,
    pub(crate) action: String,
    pub(crate) components: im::Vector<String>,
    pub(crate) created_at_ms: u64,
    pub(crate) baseline: f64,
    pub(crate) pending: u32,
    pub(crate) state: TimelineState,
    pub(crate) retained_parent: Option<NodeId>,
    pub(crate) timeouts_set: u32,
    pub(crate) intervals_set: u32,
    pub(crate) heap: Option<HeapUsage>,
}

impl Timeline {
    /// Returns the timeline id.
    #[must_use]
    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// Returns the trigger kind that started the timeline.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the labels of the UI the action involved, in discovery order.
    #[must_use]
    pub fn components(&self) -> &im::Vector<String> {
        &self.components
    }

    /// Returns the wall-clock creation time, ms since the Unix epoch.
    #[must_use]
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Returns the host timestamp mark times are relative to.
    #[must_use]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Returns the number of outstanding units of work.
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TimelineState {
        self.state
    }

    /// Returns the detached top node awaiting reattachment, if any.
    #[must_use]
    pub fn retained_parent(&self) -> Option<NodeId> {
        self.retained_parent
    }

    /// Returns how many tracked one-shot timers were attributed to this timeline.
    #[must_use]
    pub fn timeouts_set(&self) -> u32 {
        self.timeouts_set
    }

    /// Returns how many tracked recurring timers were attributed to this timeline.
    #[must_use]
    pub fn intervals_set(&self) -> u32 {
        self.intervals_set
    }

    /// Returns heap usage at creation, if the host reports it.
    #[must_use]
    pub fn heap(&self) -> Option<HeapUsage> {
        self.heap
    }

    /// Returns true once the timeline has been reported.
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.state == TimelineState::Dispatched
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.action)?;
        if !self.components.is_empty() {
            let labels: Vec<&str> = self.components.iter().map(String::as_str).collect();
            write!(f, " [{}]", labels.join(", "))?;
        }
        write!(f, " pending={}", self.pending)
    }
}

// =============================================================================
// Timeline Registry
// =============================================================================

/// Everything a new timeline needs besides its trigger.
#[derive(Clone, Debug, Default)]
pub struct TimelineSeed {
    /// Labels from the trigger target's ancestry.
    pub labels: Vec<String>,
    /// Top of the target's ancestry when it is detached from the root.
    pub retained_parent: Option<NodeId>,
    /// Wall-clock creation time.
    pub wall_clock_ms: u64,
    /// Heap usage at creation.
    pub heap: Option<HeapUsage>,
}

/// Owns every live timeline and the notion of "current".
///
/// A timeline stays in the registry until it has both been dispatched and
/// returned once by [`TimelineRegistry::pop_all`].
#[derive(Clone, Debug, Default)]
pub struct TimelineRegistry {
    timelines: BTreeMap<TimelineId, Timeline>,
    next_id: u64,
    current: Option<TimelineId>,
    queued: Option<Trigger>,
    undrained: BTreeSet<TimelineId>,
}

impl TimelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a trigger and forgets the current timeline.
    ///
    /// Replaces any trigger still queued.
    pub fn queue(&mut self, trigger: Trigger) {
        self.queued = Some(trigger);
        self.current = None;
    }

    /// Returns the queued trigger, if any.
    #[must_use]
    pub fn queued(&self) -> Option<&Trigger> {
        self.queued.as_ref()
    }

    /// Removes and returns the queued trigger.
    pub fn take_queued(&mut self) -> Option<Trigger> {
        self.queued.take()
    }

    /// Returns the current timeline id without materializing a queued trigger.
    #[must_use]
    pub fn current_id(&self) -> Option<TimelineId> {
        self.current
    }

    /// Sets the current timeline.
    ///
    /// Unknown or dispatched ids clear it instead.
    pub fn set_current(&mut self, id: Option<TimelineId>) {
        self.current = id.filter(|id| {
            self.timelines
                .get(id)
                .is_some_and(|timeline| !timeline.is_dispatched())
        });
    }

    /// Creates a timeline from a trigger and makes it current.
    pub fn begin(&mut self, trigger: Trigger, seed: TimelineSeed) -> TimelineId {
        self.next_id += 1;
        let id = TimelineId(self.next_id);
        let timeline = Timeline {
            id,
            action: trigger.kind,
            components: seed.labels.into_iter().collect(),
            created_at_ms: seed.wall_clock_ms,
            baseline: trigger.received_at,
            pending: 0,
            state: TimelineState::Open,
            retained_parent: seed.retained_parent,
            timeouts_set: 0,
            intervals_set: 0,
            heap: seed.heap,
        };
        self.timelines.insert(id, timeline);
        self.undrained.insert(id);
        self.current = Some(id);
        id
    }

    /// Returns a timeline by id.
    #[must_use]
    pub fn get(&self, id: TimelineId) -> Option<&Timeline> {
        self.timelines.get(&id)
    }

    /// Returns a mutable timeline by id.
    pub fn get_mut(&mut self, id: TimelineId) -> Option<&mut Timeline> {
        self.timelines.get_mut(&id)
    }

    /// Returns true if the registry still holds the timeline.
    #[must_use]
    pub fn contains(&self, id: TimelineId) -> bool {
        self.timelines.contains_key(&id)
    }

    /// Returns the number of timelines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    /// Returns true if no timelines are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Returns an iterator over held timelines in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Timeline> {
        self.timelines.values()
    }

    /// Returns ids of undispatched timelines waiting on a detached subtree.
    #[must_use]
    pub fn retaining(&self) -> Vec<TimelineId> {
        self.timelines
            .values()
            .filter(|t| t.retained_parent.is_some() && !t.is_dispatched())
            .map(Timeline::id)
            .collect()
    }

    /// Returns snapshots of timelines created since the last call.
    ///
    /// Dispatched timelines are released by this call.
    pub fn pop_all(&mut self) -> Vec<Timeline> {
        let ids = std::mem::take(&mut self.undrained);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(timeline) = self.timelines.get(&id) else {
                continue;
            };
            out.push(timeline.clone());
            if timeline.is_dispatched() {
                self.timelines.remove(&id);
            }
        }
        out
    }

    /// Releases a dispatched timeline once it has also been drained.
    pub fn retire(&mut self, id: TimelineId) {
        let dispatched = self.timelines.get(&id).is_some_and(Timeline::is_dispatched);
        if dispatched && !self.undrained.contains(&id) {
            self.timelines.remove(&id);
        }
        if self.current == Some(id) {
            self.current = None;
        }
    }
}
