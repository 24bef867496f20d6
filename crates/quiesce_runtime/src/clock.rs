//! Virtual time.

use quiesce_foundation::Clock;

/// Wall-clock time the virtual clock starts at, ms since the Unix epoch.
pub const DEFAULT_EPOCH_MS: u64 = 1_700_000_000_000;

/// Converts milliseconds to whole microseconds, clamping negatives to zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ms_to_us(ms: f64) -> u64 {
    if ms.is_nan() || ms <= 0.0 {
        return 0;
    }
    (ms * 1000.0).round() as u64
}

/// Converts microseconds to fractional milliseconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

/// A clock that only moves forward when told to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VirtualClock {
    now_us: u64,
    epoch_ms: u64,
}

impl VirtualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new(epoch_ms: u64) -> Self {
        Self { now_us: 0, epoch_ms }
    }

    /// Returns the current time in microseconds.
    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.now_us
    }

    /// Moves the clock forward to `us`; earlier times are ignored.
    pub fn advance_to_us(&mut self, us: u64) {
        self.now_us = self.now_us.max(us);
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance(&mut self, ms: f64) {
        self.now_us = self.now_us.saturating_add(ms_to_us(ms));
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH_MS)
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> f64 {
        us_to_ms(self.now_us)
    }

    fn wall_clock_ms(&self) -> u64 {
        self.epoch_ms + self.now_us / 1000
    }
}
