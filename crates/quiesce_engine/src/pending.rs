//! Outstanding work per timeline.
//!
//! Every tracked timer and request is registered against the timeline that
//! was current when it was scheduled. A timeline whose count returns to zero
//! becomes a dispatch candidate.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use quiesce_foundation::{RequestId, TimelineId, TimerHandle};
use tracing::error;

use crate::timeline::{TimelineRegistry, TimelineState};

/// A unit of asynchronous work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkId {
    /// A one-shot or recurring timer.
    Timer(TimerHandle),
    /// A network request.
    Request(RequestId),
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer(handle) => write!(f, "{handle}"),
            Self::Request(id) => write!(f, "{id}"),
        }
    }
}

/// Reference counts of outstanding work, plus the waiting and not-waiting sets.
#[derive(Clone, Debug, Default)]
pub struct PendingWork {
    owners: HashMap<WorkId, TimelineId>,
    waiting: BTreeSet<TimelineId>,
    not_waiting: BTreeSet<TimelineId>,
}

impl PendingWork {
    /// Creates empty bookkeeping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `work` as outstanding on `timeline`.
    ///
    /// A work id that is still registered is completed first, so a reused
    /// host handle never inflates a count.
    pub fn register(
        &mut self,
        work: WorkId,
        timeline: TimelineId,
        registry: &mut TimelineRegistry,
    ) -> bool {
        if self.owners.contains_key(&work) {
            error!(%work, "work registered twice; completing the stale entry");
            self.complete(work, registry);
        }
        let Some(entry) = registry.get_mut(timeline) else {
            return false;
        };
        entry.pending += 1;
        entry.state = TimelineState::Waiting;
        self.owners.insert(work, timeline);
        self.not_waiting.remove(&timeline);
        self.waiting.insert(timeline);
        true
    }

    /// Completes `work`, returning the timeline it was registered on.
    ///
    /// Unknown work ids are ignored.
    pub fn complete(&mut self, work: WorkId, registry: &mut TimelineRegistry) -> Option<TimelineId> {
        let timeline = self.owners.remove(&work)?;
        let Some(entry) = registry.get_mut(timeline) else {
            return Some(timeline);
        };
        let Some(remaining) = entry.pending.checked_sub(1) else {
            error!(%work, %timeline, "pending count underflow");
            debug_assert!(entry.pending > 0, "pending count underflow on {timeline}");
            return Some(timeline);
        };
        entry.pending = remaining;
        if remaining == 0 {
            entry.state = TimelineState::NotWaiting;
            self.waiting.remove(&timeline);
            self.not_waiting.insert(timeline);
        }
        Some(timeline)
    }

    /// Adds a freshly created timeline to the dispatch candidates.
    pub fn watch(&mut self, timeline: TimelineId) {
        if !self.waiting.contains(&timeline) {
            self.not_waiting.insert(timeline);
        }
    }

    /// Removes and returns the dispatch candidates in id order.
    pub fn take_not_waiting(&mut self) -> BTreeSet<TimelineId> {
        std::mem::take(&mut self.not_waiting)
    }

    /// Returns the timeline `work` is registered on.
    #[must_use]
    pub fn owner(&self, work: WorkId) -> Option<TimelineId> {
        self.owners.get(&work).copied()
    }

    /// Returns true if the timeline has outstanding work.
    #[must_use]
    pub fn is_waiting(&self, timeline: TimelineId) -> bool {
        self.waiting.contains(&timeline)
    }

    /// Returns true if the timeline is a dispatch candidate.
    #[must_use]
    pub fn is_not_waiting(&self, timeline: TimelineId) -> bool {
        self.not_waiting.contains(&timeline)
    }

    /// Returns the number of registered units of work.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns true if no work is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Returns the waiting timelines in id order.
    pub fn waiting(&self) -> impl Iterator<Item = TimelineId> + '_ {
        self.waiting.iter().copied()
    }
}
