//! Marks and the mark store.
//!
//! A mark is a named instant on a timeline. Timestamps are relative to the
//! timeline baseline so reports from different timelines are comparable.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use quiesce_foundation::{Detail, TimelineId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::network::TimingPhase;
use crate::timeline::Timeline;

// =============================================================================
// Mark Names
// =============================================================================

/// The name of a mark.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MarkName {
    /// A one-shot timer was scheduled.
    SetTimeout,
    /// A one-shot timer callback began.
    TimeoutCallback,
    /// A one-shot timer callback returned.
    TimeoutCallbackDone,
    /// A recurring timer was scheduled.
    SetInterval,
    /// A recurring timer callback began.
    IntervalCallback,
    /// A recurring timer callback returned.
    IntervalCallbackDone,
    /// A mutation batch was observed.
    Render,
    /// A request was sent.
    NetworkSend,
    /// A request settled successfully.
    NetworkSuccess,
    /// A request settled with an error.
    NetworkError,
    /// A resource timing phase of a settled request.
    NetworkTiming(TimingPhase),
    /// An application-defined mark.
    Custom(String),
}

impl MarkName {
    /// Returns the wire name of the mark.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SetTimeout => "set_timeout",
            Self::TimeoutCallback => "timeout_callback",
            Self::TimeoutCallbackDone => "timeout_callback_done",
            Self::SetInterval => "set_interval",
            Self::IntervalCallback => "interval_callback",
            Self::IntervalCallbackDone => "interval_callback_done",
            Self::Render => "render",
            Self::NetworkSend => "network_send",
            Self::NetworkSuccess => "network_success",
            Self::NetworkError => "network_error",
            Self::NetworkTiming(phase) => phase.mark_name(),
            Self::Custom(name) => name,
        }
    }

    /// Returns true for marks the engine records on its own.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for MarkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MarkName {
    fn from(name: &str) -> Self {
        Self::Custom(name.to_string())
    }
}

impl From<String> for MarkName {
    fn from(name: String) -> Self {
        Self::Custom(name)
    }
}

// =============================================================================
// Mark
// =============================================================================

/// A named instant on a timeline.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mark {
    /// Owning timeline.
    pub timeline_id: TimelineId,
    /// Mark name.
    pub name: MarkName,
    /// Milliseconds since the timeline baseline.
    pub timestamp: f64,
    /// The timeline baseline, in host timestamp units.
    pub timeline_start: f64,
    /// Optional structured payload.
    pub detail: Option<Detail>,
}

impl Mark {
    /// Creates a mark on `timeline` at `now`, or at `at` when it is a non-zero override.
    #[must_use]
    pub fn new(
        timeline: &Timeline,
        name: MarkName,
        now: f64,
        at: Option<f64>,
        detail: Option<Detail>,
    ) -> Self {
        let absolute = at.filter(|t| *t != 0.0).unwrap_or(now);
        Self {
            timeline_id: timeline.id(),
            name,
            timestamp: absolute - timeline.baseline(),
            timeline_start: timeline.baseline(),
            detail,
        }
    }

    /// Returns the absolute host timestamp of the mark.
    #[must_use]
    pub fn absolute_time(&self) -> f64 {
        self.timestamp + self.timeline_start
    }

    /// Returns a detail entry by key.
    #[must_use]
    pub fn detail_value(&self, key: &str) -> Option<&quiesce_foundation::DetailValue> {
        self.detail.as_ref().and_then(|d| d.get(key))
    }
}

// =============================================================================
// Mark Store
// =============================================================================

/// Buffer of marks awaiting collection, in recording order.
#[derive(Clone, Debug, Default)]
pub struct MarkStore {
    marks: Vec<Mark>,
}

impl MarkStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mark.
    pub fn push(&mut self, mark: Mark) {
        self.marks.push(mark);
    }

    /// Removes and returns every buffered mark.
    pub fn pop_all(&mut self) -> Vec<Mark> {
        std::mem::take(&mut self.marks)
    }

    /// Returns the number of buffered marks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Returns true if no marks are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Returns an iterator over buffered marks.
    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.marks.iter()
    }

    /// Returns buffered marks of one timeline in recording order.
    #[must_use]
    pub fn for_timeline(&self, id: TimelineId) -> Vec<&Mark> {
        self.marks.iter().filter(|m| m.timeline_id == id).collect()
    }

    /// Returns copies of one timeline's buffered marks, stably sorted by timestamp.
    #[must_use]
    pub fn sorted_for_timeline(&self, id: TimelineId) -> Vec<Mark> {
        let mut marks: Vec<Mark> = self
            .marks
            .iter()
            .filter(|m| m.timeline_id == id)
            .cloned()
            .collect();
        marks.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        marks
    }

    /// Returns marks with the given name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Vec<&Mark> {
        self.marks.iter().filter(|m| m.name.as_str() == name).collect()
    }

    /// Returns statistics about the store.
    #[must_use]
    pub fn stats(&self) -> MarkStoreStats {
        let mut name_counts = HashMap::new();
        let mut timelines = BTreeSet::new();
        for mark in &self.marks {
            *name_counts.entry(mark.name.as_str().to_string()).or_insert(0) += 1;
            timelines.insert(mark.timeline_id);
        }

        MarkStoreStats {
            mark_count: self.marks.len(),
            timeline_count: timelines.len(),
            name_counts,
        }
    }
}

// =============================================================================
// Store Statistics
// =============================================================================

/// Statistics about a mark store.
#[derive(Clone, Debug)]
pub struct MarkStoreStats {
    /// Number of buffered marks.
    pub mark_count: usize,
    /// Number of distinct timelines with buffered marks.
    pub timeline_count: usize,
    /// Count of each mark name.
    pub name_counts: HashMap<String, usize>,
}

impl fmt::Display for MarkStoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mark Store Statistics:")?;
        writeln!(f, "  Marks: {}", self.mark_count)?;
        writeln!(f, "  Timelines: {}", self.timeline_count)?;
        if !self.name_counts.is_empty() {
            writeln!(f, "  By name:")?;
            let mut names: Vec<_> = self.name_counts.iter().collect();
            names.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (name, count) in names {
                writeln!(f, "    {name}: {count}")?;
            }
        }
        Ok(())
    }
}
