//! Timer chain and interval policies.
//!
//! A one-shot timer scheduled from inside another timer's callback is one
//! level deeper than its parent. A timer whose parent is already past the
//! depth limit is treated as runaway polling: it keeps running but stops
//! holding a timeline open.

use std::collections::HashMap;

use quiesce_foundation::TimerHandle;

// =============================================================================
// Chain Detector
// =============================================================================

/// Classification of a newly scheduled one-shot timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainVerdict {
    /// Within the depth limit; tracked as pending work.
    Bounded {
        /// Depth in its chain; 0 for a root timer.
        depth: u32,
    },
    /// Beyond the depth limit; runs untracked.
    Runaway {
        /// Depth in its chain.
        depth: u32,
    },
}

impl ChainVerdict {
    /// Returns true for runaway timers.
    #[must_use]
    pub fn is_runaway(self) -> bool {
        matches!(self, Self::Runaway { .. })
    }

    /// Returns the chain depth.
    #[must_use]
    pub fn depth(self) -> u32 {
        match self {
            Self::Bounded { depth } | Self::Runaway { depth } => depth,
        }
    }
}

/// Tracks timer chain depths keyed by host handle.
///
/// Depths are consumed when a timer fires, so a handle the host reuses
/// afterwards starts from a clean slate.
#[derive(Clone, Debug)]
pub struct ChainDetector {
    depths: HashMap<TimerHandle, u32>,
    limit: u32,
}

impl ChainDetector {
    /// Creates a detector with the given depth limit.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            depths: HashMap::new(),
            limit,
        }
    }

    /// Records a scheduled timer.
    ///
    /// `parent_depth` is the depth of the timer whose callback is running, if
    /// any. The timer is runaway when that inherited depth exceeds the limit.
    pub fn on_schedule(&mut self, handle: TimerHandle, parent_depth: Option<u32>) -> ChainVerdict {
        let depth = parent_depth.map_or(0, |d| d.saturating_add(1));
        self.depths.insert(handle, depth);
        if parent_depth.is_some_and(|d| d > self.limit) {
            ChainVerdict::Runaway { depth }
        } else {
            ChainVerdict::Bounded { depth }
        }
    }

    /// Removes and returns the depth of a firing timer.
    pub fn take(&mut self, handle: TimerHandle) -> Option<u32> {
        self.depths.remove(&handle)
    }

    /// Returns the recorded depth of a scheduled timer.
    #[must_use]
    pub fn depth(&self, handle: TimerHandle) -> Option<u32> {
        self.depths.get(&handle).copied()
    }

    /// Drops a cancelled timer.
    pub fn forget(&mut self, handle: TimerHandle) {
        self.depths.remove(&handle);
    }

    /// Returns the number of scheduled timers tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.depths.len()
    }

    /// Returns true if no timers are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

impl Default for ChainDetector {
    fn default() -> Self {
        Self::new(10)
    }
}

// =============================================================================
// Interval Policy
// =============================================================================

/// How one firing of a recurring timer is attributed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalFiring {
    /// Attributed to the timeline that scheduled the interval.
    Tracked {
        /// 1-based firing number.
        firing: u32,
        /// True on the last tracked firing; its registration is released afterwards.
        last: bool,
    },
    /// Starts a fresh timeline of its own.
    Untracked,
}

/// Per-interval firing policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntervalPolicy {
    firings: u32,
    limit: u32,
    tracked: bool,
}

impl IntervalPolicy {
    /// Creates the policy for an interval with `period`.
    ///
    /// Periods longer than `long_period` are never tracked.
    #[must_use]
    pub fn new(period: f64, limit: u32, long_period: f64) -> Self {
        Self {
            firings: 0,
            limit,
            tracked: period <= long_period && limit > 0,
        }
    }

    /// Returns true if the interval is registered as pending work when scheduled.
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Returns the number of firings so far.
    #[must_use]
    pub fn firings(&self) -> u32 {
        self.firings
    }

    /// Advances to the next firing.
    pub fn on_fire(&mut self) -> IntervalFiring {
        self.firings = self.firings.saturating_add(1);
        if self.tracked && self.firings <= self.limit {
            IntervalFiring::Tracked {
                firing: self.firings,
                last: self.firings == self.limit,
            }
        } else {
            IntervalFiring::Untracked
        }
    }
}
