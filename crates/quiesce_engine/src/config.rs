//! Configuration for the engine.

use std::fmt;
use std::rc::Rc;

use quiesce_foundation::{Detail, Error, Result};
use regex::Regex;

use crate::network::Settlement;

/// Pattern stripped from label attributes by default (framework-generated classes).
pub const DEFAULT_IGNORE_PATTERN: &str = r"(^|\s)+((ng-[^\s]+))";

/// Event types accepted as external triggers by default.
pub const DEFAULT_TRIGGER_EVENTS: [&str; 13] = [
    "keydown",
    "keypress",
    "keyup",
    "mousedown",
    "mouseup",
    "click",
    "dblclick",
    "mousemove",
    "mouseover",
    "mousewheel",
    "mouseout",
    "resize",
    "scroll",
];

/// Produces extra detail for a settled request, merged into its completion marks.
pub type NetworkDetailHook = Rc<dyn Fn(&Settlement) -> Detail>;

/// Configuration for the engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Capture a backtrace when a timer is scheduled and attach it to its marks.
    pub log_timeout_stacks: bool,
    /// Matches stripped from label attribute values.
    pub ignore_label_pattern: Option<Regex>,
    /// Attributes consulted, in order, for a node's label.
    pub label_attributes: Vec<String>,
    /// Maximum characters of text used to label an unlabeled trigger target.
    pub text_label_limit: usize,
    /// Event types accepted as triggers.
    pub trigger_events: Vec<String>,
    /// Trigger queued by `start` so pre-interaction work is captured.
    pub initial_trigger: Option<String>,
    /// Chain depth a parent timer may reach before the timers it schedules are runaway.
    pub chain_depth_limit: u32,
    /// Firings of a recurring timer attributed to its timeline.
    pub max_interval_firings: u32,
    /// Periods above this are never tracked.
    pub long_interval_period: f64,
    /// Buffered timing entries at which the host buffer is cleared.
    pub timing_capacity: usize,
    /// Optional extra detail for network completion marks.
    pub network_detail: Option<NetworkDetailHook>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_timeout_stacks: false,
            ignore_label_pattern: Regex::new(DEFAULT_IGNORE_PATTERN).ok(),
            label_attributes: vec!["tc".to_string(), "tv".to_string(), "class".to_string()],
            text_label_limit: 50,
            trigger_events: DEFAULT_TRIGGER_EVENTS.iter().map(|s| (*s).to_string()).collect(),
            initial_trigger: Some("page_load".to_string()),
            chain_depth_limit: 10,
            max_interval_firings: 10,
            long_interval_period: 1000.0,
            timing_capacity: 149,
            network_detail: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("log_timeout_stacks", &self.log_timeout_stacks)
            .field(
                "ignore_label_pattern",
                &self.ignore_label_pattern.as_ref().map(Regex::as_str),
            )
            .field("label_attributes", &self.label_attributes)
            .field("text_label_limit", &self.text_label_limit)
            .field("trigger_events", &self.trigger_events)
            .field("initial_trigger", &self.initial_trigger)
            .field("chain_depth_limit", &self.chain_depth_limit)
            .field("max_interval_firings", &self.max_interval_firings)
            .field("long_interval_period", &self.long_interval_period)
            .field("timing_capacity", &self.timing_capacity)
            .field("network_detail", &self.network_detail.is_some())
            .finish()
    }
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable/disable stack capture for timers.
    #[must_use]
    pub fn with_timeout_stacks(mut self, enabled: bool) -> Self {
        self.log_timeout_stacks = enabled;
        self
    }

    /// Builder method to set the ignored-label pattern.
    pub fn with_ignore_pattern(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::invalid_pattern(e.to_string()))?;
        self.ignore_label_pattern = Some(regex);
        Ok(self)
    }

    /// Builder method to disable label filtering.
    #[must_use]
    pub fn without_ignore_pattern(mut self) -> Self {
        self.ignore_label_pattern = None;
        self
    }

    /// Builder method to set the label attributes.
    #[must_use]
    pub fn with_label_attributes(mut self, attributes: &[&str]) -> Self {
        self.label_attributes = attributes.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Builder method to set the accepted trigger events.
    #[must_use]
    pub fn with_trigger_events(mut self, events: &[&str]) -> Self {
        self.trigger_events = events.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Builder method to set or clear the trigger queued on start.
    #[must_use]
    pub fn with_initial_trigger(mut self, trigger: Option<&str>) -> Self {
        self.initial_trigger = trigger.map(str::to_string);
        self
    }

    /// Builder method to set the runaway chain depth limit.
    #[must_use]
    pub fn with_chain_depth_limit(mut self, limit: u32) -> Self {
        self.chain_depth_limit = limit;
        self
    }

    /// Builder method to set how many interval firings are tracked.
    #[must_use]
    pub fn with_max_interval_firings(mut self, firings: u32) -> Self {
        self.max_interval_firings = firings;
        self
    }

    /// Builder method to set the never-tracked interval period threshold.
    #[must_use]
    pub fn with_long_interval_period(mut self, period: f64) -> Self {
        self.long_interval_period = period;
        self
    }

    /// Builder method to set the timing-entry pruning threshold.
    #[must_use]
    pub fn with_timing_capacity(mut self, capacity: usize) -> Self {
        self.timing_capacity = capacity;
        self
    }

    /// Builder method to install a network detail hook.
    #[must_use]
    pub fn with_network_detail<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Settlement) -> Detail + 'static,
    {
        self.network_detail = Some(Rc::new(hook));
        self
    }

    /// Returns true if `kind` is an accepted trigger event.
    #[must_use]
    pub fn is_trigger_event(&self, kind: &str) -> bool {
        self.trigger_events.iter().any(|t| t == kind)
    }
}
