//! Routed fake network.

use std::collections::HashMap;

use quiesce_engine::ResourceTiming;

/// Resource timing entries the simulated host buffers before dropping new ones.
pub const DEFAULT_TIMING_BUFFER_LIMIT: usize = 150;

/// How a URL responds.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Time from send to settlement.
    pub latency_ms: f64,
    /// Response status; 0 simulates a transport failure.
    pub status: u16,
    /// Final URL after redirects.
    pub response_url: Option<String>,
    /// Whether a resource timing entry is recorded on settlement.
    pub record_timing: bool,
}

impl Route {
    /// A 200 response after `latency_ms`.
    #[must_use]
    pub fn ok(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            status: 200,
            response_url: None,
            record_timing: true,
        }
    }

    /// A transport failure after `latency_ms`.
    #[must_use]
    pub fn unreachable(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            status: 0,
            response_url: None,
            record_timing: false,
        }
    }

    /// Builder method to set the status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set the final URL.
    #[must_use]
    pub fn with_response_url(mut self, url: impl Into<String>) -> Self {
        self.response_url = Some(url.into());
        self
    }

    /// Builder method to skip the timing entry.
    #[must_use]
    pub fn without_timing(mut self) -> Self {
        self.record_timing = false;
        self
    }
}

/// Routes, sent-request log, and resource timing buffer.
#[derive(Clone, Debug)]
pub struct SimNetwork {
    routes: HashMap<String, Route>,
    sent: Vec<String>,
    timing: Vec<ResourceTiming>,
    timing_supported: bool,
    timing_buffer_limit: usize,
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            sent: Vec::new(),
            timing: Vec::new(),
            timing_supported: true,
            timing_buffer_limit: DEFAULT_TIMING_BUFFER_LIMIT,
        }
    }
}

impl SimNetwork {
    /// Creates a network with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces the route for `url`.
    pub fn route(&mut self, url: impl Into<String>, route: Route) {
        self.routes.insert(url.into(), route);
    }

    /// Returns the route for `url`; unrouted URLs are unreachable.
    #[must_use]
    pub fn route_for(&self, url: &str) -> Route {
        self.routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| Route::unreachable(1.0))
    }

    /// Returns every URL sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    pub(crate) fn log_send(&mut self, url: &str) {
        self.sent.push(url.to_string());
    }

    /// Enables or disables the timing history.
    pub fn set_timing_supported(&mut self, supported: bool) {
        self.timing_supported = supported;
    }

    /// Returns true if the timing history is available.
    #[must_use]
    pub fn timing_supported(&self) -> bool {
        self.timing_supported
    }

    /// Returns the buffered timing entries.
    #[must_use]
    pub fn timing(&self) -> &[ResourceTiming] {
        &self.timing
    }

    /// Appends a timing entry unless the buffer is full.
    pub fn push_timing(&mut self, entry: ResourceTiming) -> bool {
        if !self.timing_supported || self.timing.len() >= self.timing_buffer_limit {
            return false;
        }
        self.timing.push(entry);
        true
    }

    /// Empties the timing buffer.
    pub fn clear_timing(&mut self) {
        self.timing.clear();
    }
}

/// Builds the timing entry for a request sent at `sent_at` that took `latency_ms`.
///
/// DNS and connection phases are left unmeasured.
#[must_use]
pub fn timing_entry(name: &str, sent_at: f64, latency_ms: f64) -> ResourceTiming {
    let start = sent_at + 0.05;
    let span = (latency_ms - 0.05).max(0.0);
    ResourceTiming {
        name: name.to_string(),
        start_time: start,
        fetch_start: start,
        request_start: start + span * 0.2,
        response_start: start + span * 0.6,
        response_end: start + span,
        ..ResourceTiming::default()
    }
}
