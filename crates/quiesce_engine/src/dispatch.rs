//! Reporting quiesced timelines.

use std::fmt;

use quiesce_foundation::TimelineId;
use tracing::debug;

use crate::mark::{Mark, MarkStore};
use crate::pending::PendingWork;
use crate::timeline::{Timeline, TimelineRegistry, TimelineState};

/// What the completion callback receives for one timeline.
#[derive(Clone, Debug)]
pub struct TimelineReport {
    /// Snapshot of the timeline at dispatch.
    pub timeline: Timeline,
    /// The timeline's still-buffered marks, ordered by timestamp.
    pub marks: Vec<Mark>,
}

impl TimelineReport {
    /// Returns the first mark with the given name.
    #[must_use]
    pub fn mark(&self, name: &str) -> Option<&Mark> {
        self.marks.iter().find(|m| m.name.as_str() == name)
    }

    /// Returns the names of the report's marks, in order.
    #[must_use]
    pub fn mark_names(&self) -> Vec<&str> {
        self.marks.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Callback invoked once per dispatched timeline.
pub type CompletionCallback = Box<dyn FnMut(&TimelineReport)>;

/// Dispatches every quiesced timeline exactly once.
#[derive(Default)]
pub struct Dispatcher {
    callback: Option<CompletionCallback>,
    dispatched: u64,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("callback", &self.callback.is_some())
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no callback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the completion callback, replacing any previous one.
    pub fn set_callback(&mut self, callback: CompletionCallback) {
        self.callback = Some(callback);
    }

    /// Returns how many timelines have been dispatched.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Reports every not-waiting timeline and clears the working set.
    ///
    /// Candidates are re-checked: anything that picked up work again or was
    /// already reported is skipped. Clears the current timeline.
    pub fn flush(
        &mut self,
        pending: &mut PendingWork,
        registry: &mut TimelineRegistry,
        marks: &MarkStore,
    ) -> Vec<TimelineId> {
        let mut reported = Vec::new();
        for id in pending.take_not_waiting() {
            let Some(timeline) = registry.get_mut(id) else {
                continue;
            };
            if timeline.pending > 0 || timeline.is_dispatched() {
                continue;
            }
            timeline.state = TimelineState::Dispatched;
            let report = TimelineReport {
                timeline: timeline.clone(),
                marks: marks.sorted_for_timeline(id),
            };
            debug!(timeline = %id, marks = report.marks.len(), "dispatching timeline");
            if let Some(callback) = self.callback.as_mut() {
                callback(&report);
            }
            self.dispatched += 1;
            registry.retire(id);
            reported.push(id);
        }
        registry.set_current(None);
        reported
    }
}
