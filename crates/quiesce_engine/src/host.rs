//! Host capabilities the engine is layered over.
//!
//! The engine never owns the event loop. It wraps callbacks handed to the
//! host's timer and network primitives, and inspects the host's UI tree.
//! Every callback receives a [`Scope`] so it can schedule further work
//! through the same instrumented primitives.

use quiesce_foundation::{Clock, MemoryProbe, TimerHandle};
use quiesce_tree::TreeInspector;

use crate::network::{ResourceTiming, Settlement};
use crate::scope::Scope;

/// A one-shot timer callback as stored by the host.
pub type HostTimerCallback<H> = Box<dyn FnOnce(&mut Scope<'_, H>, TimerHandle)>;

/// A recurring timer callback as stored by the host.
pub type HostIntervalCallback<H> = Box<dyn FnMut(&mut Scope<'_, H>, TimerHandle)>;

/// A request settlement callback as stored by the host.
pub type HostSettleCallback<H> = Box<dyn FnOnce(&mut Scope<'_, H>, &Settlement)>;

/// Host timers.
///
/// Callbacks must run later, on a turn of their own, never from inside the
/// scheduling call. Handles may be reused once a timer has fired or been
/// cancelled.
pub trait TimerProvider: Sized {
    /// Schedules a one-shot callback after `delay` milliseconds.
    fn schedule(&mut self, callback: HostTimerCallback<Self>, delay: f64) -> TimerHandle;

    /// Schedules a callback every `period` milliseconds until cancelled.
    fn schedule_recurring(&mut self, callback: HostIntervalCallback<Self>, period: f64)
    -> TimerHandle;

    /// Cancels a timer. Unknown handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Host network transport.
pub trait NetworkTransport: Sized {
    /// Sends a request; `on_settle` runs on a later turn with its outcome.
    fn send(&mut self, url: &str, on_settle: HostSettleCallback<Self>);

    /// Returns the buffered resource timing history, if the host keeps one.
    fn timing_entries(&self) -> Option<&[ResourceTiming]> {
        None
    }

    /// Clears the timing history; returns false if unsupported.
    fn clear_timing_entries(&mut self) -> bool {
        false
    }
}

/// The read-only view of a host the engine needs to attribute work.
pub trait HostEnv: Clock + MemoryProbe {
    /// The host UI tree.
    type Tree: TreeInspector;

    /// Returns the UI tree.
    fn tree(&self) -> &Self::Tree;
}

/// A full host: timers, network, and a mutable UI tree.
pub trait Host: HostEnv + TimerProvider + NetworkTransport + 'static {
    /// Returns the UI tree for mutation by application callbacks.
    fn tree_mut(&mut self) -> &mut Self::Tree;
}
