//! Host time and memory capabilities.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Time source exposed by the host.
pub trait Clock {
    /// Monotonic high-resolution time since the host started, in milliseconds.
    fn now(&self) -> f64;

    /// Absolute wall-clock time, in milliseconds since the Unix epoch.
    fn wall_clock_ms(&self) -> u64;
}

/// Heap usage reported by hosts that expose it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemorySnapshot {
    /// Bytes currently in use.
    pub used_bytes: u64,
    /// Bytes currently reserved.
    pub total_bytes: u64,
    /// Upper bound the host will allow.
    pub limit_bytes: u64,
}

/// Optional heap inspection capability.
///
/// Absent on many hosts; the default implementation reports nothing.
pub trait MemoryProbe {
    /// Returns the current heap usage, if the host can report it.
    fn memory(&self) -> Option<MemorySnapshot> {
        None
    }
}
