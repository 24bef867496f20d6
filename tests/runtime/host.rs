//! Simulated host primitives

use quiesce_engine::{HostTimerCallback, NetworkTransport, Scope, Settlement, TimerProvider};
use quiesce_foundation::{Clock, MemoryProbe, MemorySnapshot, TimerHandle};
use quiesce_runtime::{Route, SimHost, VirtualClock};

fn noop() -> HostTimerCallback<SimHost> {
    Box::new(|_: &mut Scope<'_, SimHost>, _: TimerHandle| {})
}

#[test]
fn clock_starts_at_the_epoch() {
    let host = SimHost::with_clock(VirtualClock::new(1_000));
    assert!(host.now().abs() < f64::EPSILON);
    assert_eq!(host.wall_clock_ms(), 1_000);
}

#[test]
fn smallest_free_handle_is_reused() {
    let mut host = SimHost::new();
    let handles: Vec<TimerHandle> = (0..4).map(|_| host.schedule(noop(), 10.0)).collect();
    host.cancel(handles[2]);
    host.cancel(handles[0]);
    assert_eq!(host.schedule(noop(), 10.0), handles[0]);
    assert_eq!(host.schedule(noop(), 10.0), handles[2]);
    assert_eq!(host.schedule(noop(), 10.0), TimerHandle(5));
}

#[test]
fn zero_period_interval_is_clamped() {
    let mut host = SimHost::new();
    host.schedule_recurring(
        Box::new(|_: &mut Scope<'_, SimHost>, _: TimerHandle| {}),
        0.0,
    );
    assert_eq!(host.next_due(), Some(0.001));
}

#[test]
fn cancelling_unknown_handle_is_harmless() {
    let mut host = SimHost::new();
    host.cancel(TimerHandle(42));
    assert_eq!(host.active_timers(), 0);
    assert_eq!(host.schedule(noop(), 1.0), TimerHandle(1));
}

#[test]
fn sends_are_logged_and_pending() {
    let mut host = SimHost::new();
    host.network_mut().route("/a", Route::ok(5.0));
    host.send("/a", Box::new(|_: &mut Scope<'_, SimHost>, _: &Settlement| {}));
    host.send("/missing", Box::new(|_: &mut Scope<'_, SimHost>, _: &Settlement| {}));
    assert_eq!(host.network().sent(), ["/a", "/missing"]);
    assert_eq!(host.inflight_requests(), 2);
    assert_eq!(host.next_due(), Some(1.0));
}

#[test]
fn memory_snapshot_is_optional() {
    let mut host = SimHost::new();
    assert!(host.memory().is_none());
    let snapshot = MemorySnapshot {
        used_bytes: 1,
        total_bytes: 2,
        limit_bytes: 3,
    };
    host.set_memory(Some(snapshot));
    assert_eq!(host.memory(), Some(snapshot));
}

#[test]
fn clearing_timing_reports_support() {
    let mut host = SimHost::new();
    assert!(host.clear_timing_entries());
    host.network_mut().set_timing_supported(false);
    assert!(!host.clear_timing_entries());
    assert!(host.timing_entries().is_none());
}
