//! Network settlement and resource timing types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a request as reported by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Response status; 0 for transport-level failures (abort, unreachable).
    pub status: u16,
    /// Final URL after redirects, when the transport knows it.
    pub response_url: Option<String>,
}

impl Settlement {
    /// Creates a settlement with the given status.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            response_url: None,
        }
    }

    /// Builder method to set the response URL.
    #[must_use]
    pub fn with_response_url(mut self, url: impl Into<String>) -> Self {
        self.response_url = Some(url.into());
        self
    }

    /// Returns true for 2xx responses and 304.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) || self.status == 304
    }
}

/// Timing phases reported per resource, in request order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimingPhase {
    /// Resource fetch was initiated.
    StartTime,
    /// Fetch began (after redirects).
    FetchStart,
    /// DNS lookup began.
    DomainLookupStart,
    /// DNS lookup finished.
    DomainLookupEnd,
    /// Connection began.
    ConnectStart,
    /// Connection established.
    ConnectEnd,
    /// Request was sent.
    RequestStart,
    /// First response byte arrived.
    ResponseStart,
    /// Last response byte arrived.
    ResponseEnd,
}

impl TimingPhase {
    /// Every phase, in request order.
    pub const ALL: [Self; 9] = [
        Self::StartTime,
        Self::FetchStart,
        Self::DomainLookupStart,
        Self::DomainLookupEnd,
        Self::ConnectStart,
        Self::ConnectEnd,
        Self::RequestStart,
        Self::ResponseStart,
        Self::ResponseEnd,
    ];

    /// Name of the mark recorded for this phase.
    #[must_use]
    pub const fn mark_name(self) -> &'static str {
        match self {
            Self::StartTime => "network_start_time",
            Self::FetchStart => "network_fetch_start",
            Self::DomainLookupStart => "network_domain_lookup_start",
            Self::DomainLookupEnd => "network_domain_lookup_end",
            Self::ConnectStart => "network_connect_start",
            Self::ConnectEnd => "network_connect_end",
            Self::RequestStart => "network_request_start",
            Self::ResponseStart => "network_response_start",
            Self::ResponseEnd => "network_response_end",
        }
    }
}

/// One entry of the host's post-hoc resource timing history.
///
/// Times are host high-resolution timestamps; zero means "not measured".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceTiming {
    /// Resource URL.
    pub name: String,
    /// See [`TimingPhase::StartTime`].
    pub start_time: f64,
    /// See [`TimingPhase::FetchStart`].
    pub fetch_start: f64,
    /// See [`TimingPhase::DomainLookupStart`].
    pub domain_lookup_start: f64,
    /// See [`TimingPhase::DomainLookupEnd`].
    pub domain_lookup_end: f64,
    /// See [`TimingPhase::ConnectStart`].
    pub connect_start: f64,
    /// See [`TimingPhase::ConnectEnd`].
    pub connect_end: f64,
    /// See [`TimingPhase::RequestStart`].
    pub request_start: f64,
    /// See [`TimingPhase::ResponseStart`].
    pub response_start: f64,
    /// See [`TimingPhase::ResponseEnd`].
    pub response_end: f64,
}

impl ResourceTiming {
    /// Returns the timestamp of one phase.
    #[must_use]
    pub fn phase(&self, phase: TimingPhase) -> f64 {
        match phase {
            TimingPhase::StartTime => self.start_time,
            TimingPhase::FetchStart => self.fetch_start,
            TimingPhase::DomainLookupStart => self.domain_lookup_start,
            TimingPhase::DomainLookupEnd => self.domain_lookup_end,
            TimingPhase::ConnectStart => self.connect_start,
            TimingPhase::ConnectEnd => self.connect_end,
            TimingPhase::RequestStart => self.request_start,
            TimingPhase::ResponseStart => self.response_start,
            TimingPhase::ResponseEnd => self.response_end,
        }
    }
}

/// Finds the entry for `url` that started strictly after `sent_at`, closest to it.
///
/// Among equally close entries the most recently recorded wins.
#[must_use]
pub fn closest_entry<'a>(
    entries: &'a [ResourceTiming],
    url: &str,
    sent_at: f64,
) -> Option<&'a ResourceTiming> {
    entries
        .iter()
        .rev()
        .filter(|entry| entry.name.contains(url) && entry.start_time > sent_at)
        .min_by(|a, b| a.start_time.total_cmp(&b.start_time))
}
