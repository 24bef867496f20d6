//! Trigger capture and dispatch

use quiesce_engine::{EngineConfig, Scope, Settlement, TimelineState};
use quiesce_foundation::MemorySnapshot;
use quiesce_runtime::{Route, SimHost};

use crate::common::{Harness, idle, render_components};

// =============================================================================
// Synchronous Work
// =============================================================================

#[test]
fn sync_render_dispatches_on_next_flush() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "submit-btn");
    h.start();

    assert!(h.click(button, move |scope: &mut Scope<'_, SimHost>| {
        let tree = scope.tree_mut();
        let spinner = tree.create_element("span");
        tree.append_child(button, spinner).unwrap();
    }));
    assert!(h.reports().is_empty());

    h.event_loop.flush();
    let report = h.report("click");
    assert_eq!(render_components(&report), vec!["submit-btn ADD 1".to_string()]);
    assert_eq!(report.mark_names(), vec!["render"]);
    assert_eq!(report.timeline.pending(), 0);
    assert_eq!(report.timeline.state(), TimelineState::Dispatched);
}

#[test]
fn next_trigger_is_a_flush_boundary() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("saving", None, None);
    });
    assert!(h.reports().is_empty());
    h.click(button, idle);
    assert_eq!(h.reports().len(), 1);
    assert_eq!(h.report("click").mark_names(), vec!["saving"]);
}

#[test]
fn trigger_without_work_never_materializes() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "noop");
    h.start();

    h.click(button, idle);
    h.click(button, idle);
    h.event_loop.flush();
    assert!(h.reports().is_empty());
    assert!(h.event_loop.engine().registry().is_empty());
}

#[test]
fn each_timeline_dispatches_once() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("saving", None, None);
    });
    assert_eq!(h.event_loop.flush().len(), 1);
    assert!(h.event_loop.flush().is_empty());
    assert_eq!(h.reports().len(), 1);
    assert_eq!(h.event_loop.engine().dispatched_count(), 1);
}

// =============================================================================
// Trigger Capture
// =============================================================================

#[test]
fn startup_work_lands_on_page_load() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "menu");
    h.start();

    h.event_loop.run(|scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("app_ready", None, None);
    });
    h.click(button, idle);

    let report = h.report("page_load");
    assert_eq!(report.mark_names(), vec!["app_ready"]);
    assert!(report.timeline.components().is_empty());
}

#[test]
fn unlisted_events_are_ignored() {
    let mut h = Harness::new();
    let input = h.element(None, "input", "search");
    h.start();

    assert!(!h.fire("focus", input, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("focused", None, None);
    }));
    h.event_loop.flush();
    assert_eq!(h.report("page_load").mark_names(), vec!["focused"]);
}

#[test]
fn timeline_labels_come_from_target_ancestry() {
    let mut h = Harness::new();
    let nav = h.element(None, "nav", "main-nav");
    let link = h.element(Some(nav), "a", "home-link");
    h.start();

    h.click(link, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("navigating", None, None);
    });
    let timeline = h.event_loop.engine().current_timeline().unwrap();
    let labels: Vec<&str> = timeline.components().iter().map(String::as_str).collect();
    assert_eq!(labels, vec!["home-link", "main-nav"]);
}

#[test]
fn heap_usage_is_recorded_in_megabytes() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.event_loop.host_mut().set_memory(Some(MemorySnapshot {
        used_bytes: 12_000_000,
        total_bytes: 20_000_000,
        limit_bytes: 2_000_000_000,
    }));
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("saving", None, None);
    });
    h.event_loop.flush();
    let heap = h.report("click").timeline.heap().unwrap();
    assert!((heap.used_mb - 12.0).abs() < 1e-9);
    assert!((heap.limit_mb - 2000.0).abs() < 1e-9);
}

// =============================================================================
// Marks and Snapshots
// =============================================================================

#[test]
fn report_marks_are_ordered_by_timestamp() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();
    h.event_loop.host_mut().clock_mut().advance(100.0);

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("late", None, Some(130.0));
        scope.add_mark("early", None, Some(110.0));
        scope.add_mark("now", None, None);
    });
    h.event_loop.flush();

    let report = h.report("click");
    assert_eq!(report.mark_names(), vec!["now", "early", "late"]);
    assert!((report.marks[1].timestamp - 10.0).abs() < 1e-9);
    assert!((report.marks[0].timeline_start - 100.0).abs() < 1e-9);
}

#[test]
fn popped_marks_are_not_reported() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("saving", None, None);
    });
    let drained = h.event_loop.engine_mut().pop_all_marks();
    assert_eq!(drained.len(), 1);
    h.event_loop.flush();
    assert!(h.report("click").marks.is_empty());
}

#[test]
fn timeline_snapshots_are_drained_once() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("saving", None, None);
    });
    let snapshots = h.event_loop.engine_mut().pop_all_timelines();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].action(), "click");
    assert!(h.event_loop.engine_mut().pop_all_timelines().is_empty());

    h.event_loop.flush();
    assert!(h.event_loop.engine().registry().is_empty());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn stopped_engine_passes_primitives_through() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();
    h.event_loop.stop();

    let fired = std::rc::Rc::new(std::cell::Cell::new(false));
    let flag = std::rc::Rc::clone(&fired);
    assert!(!h.click(button, move |scope: &mut Scope<'_, SimHost>| {
        assert!(scope.add_mark("ignored", None, None).is_none());
        scope.set_timeout(5.0, move |_: &mut Scope<'_, SimHost>| flag.set(true));
    }));
    h.event_loop.run_until_idle(10);

    assert!(fired.get());
    assert!(h.event_loop.engine().marks().is_empty());
    assert!(h.event_loop.engine().pending_work().is_empty());
    assert!(h.event_loop.flush().is_empty());
}

#[test]
fn restart_does_not_requeue_page_load() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();
    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("first", None, None);
    });
    h.event_loop.stop();
    h.start();

    h.event_loop.run(|scope: &mut Scope<'_, SimHost>| {
        scope.add_mark("second", None, None);
    });
    h.event_loop.flush();
    let report = h.report("click");
    assert_eq!(report.mark_names(), vec!["first", "second"]);
}

#[test]
fn work_settling_while_stopped_is_still_completed() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.event_loop.host_mut().network_mut().route("/api/save", Route::ok(8.0));
    h.start();
    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.set_timeout(5.0, |_: &mut Scope<'_, SimHost>| {});
        scope.send_request("/api/save", |_: &mut Scope<'_, SimHost>, _: &Settlement| {});
    });
    assert_eq!(h.event_loop.engine().pending_work().len(), 2);

    h.event_loop.stop();
    h.event_loop.run_until_idle(10);
    assert!(h.event_loop.engine().pending_work().is_empty());
    assert!(h.reports().is_empty());

    h.start();
    h.click(button, |_: &mut Scope<'_, SimHost>| {});
    h.event_loop.flush();
    let report = h.report("click");
    assert_eq!(report.timeline.state(), TimelineState::Dispatched);
    assert_eq!(report.timeline.pending(), 0);
    assert_eq!(report.mark_names(), vec!["set_timeout", "network_send"]);
}

#[test]
fn intervals_released_while_stopped_do_not_strand_their_timeline() {
    let mut h = Harness::with_config(EngineConfig::new().with_max_interval_firings(2));
    let poll = h.element(None, "button", "poll");
    let other = h.element(None, "button", "other");
    h.start();
    h.click(poll, |scope: &mut Scope<'_, SimHost>| {
        scope.set_interval(10.0, |_: &mut Scope<'_, SimHost>| {});
    });
    let cleared = h.event_loop.run(|scope: &mut Scope<'_, SimHost>| {
        scope.set_interval(10.0, |_: &mut Scope<'_, SimHost>| {})
    });
    assert_eq!(h.event_loop.engine().pending_work().len(), 2);

    h.event_loop.stop();
    h.event_loop.run_for(15.0);
    h.event_loop
        .run(|scope: &mut Scope<'_, SimHost>| scope.clear_interval(cleared));
    assert_eq!(h.event_loop.engine().pending_work().len(), 1);
    h.event_loop.run_for(10.0);
    assert!(h.event_loop.engine().pending_work().is_empty());

    h.start();
    h.click(other, |_: &mut Scope<'_, SimHost>| {});
    h.event_loop.flush();
    let report = h.report("click");
    assert_eq!(report.timeline.pending(), 0);
    assert_eq!(report.timeline.intervals_set(), 2);
}
