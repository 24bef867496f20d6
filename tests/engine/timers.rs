//! Timer and interval accounting

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quiesce_engine::{EngineConfig, Scope, TimelineState};
use quiesce_foundation::TimerHandle;
use quiesce_runtime::SimHost;

use crate::common::{Harness, idle, render_components};

/// Schedules a chain of `remaining` timers, each from the previous one's callback.
fn chain(scope: &mut Scope<'_, SimHost>, remaining: u32) {
    if remaining == 0 {
        return;
    }
    scope.set_timeout(1.0, move |scope: &mut Scope<'_, SimHost>| {
        chain(scope, remaining - 1);
    });
}

// =============================================================================
// Timeouts
// =============================================================================

#[test]
fn timeline_waits_for_its_timer() {
    let mut h = Harness::new();
    let menu = h.element(None, "div", "menu");
    h.start();

    h.fire("mouseover", menu, move |scope: &mut Scope<'_, SimHost>| {
        scope.set_timeout(5.0, move |scope: &mut Scope<'_, SimHost>| {
            let tree = scope.tree_mut();
            let tooltip = tree.create_element("span");
            tree.append_child(menu, tooltip).unwrap();
        });
    });
    let id = h.event_loop.engine().current_timeline().unwrap().id();
    assert_eq!(
        h.event_loop.engine().timeline(id).unwrap().state(),
        TimelineState::Waiting
    );

    h.event_loop.flush();
    assert!(h.reports().is_empty());

    assert!(h.event_loop.step());
    let timeline = h.event_loop.engine().timeline(id).unwrap();
    assert_eq!(timeline.state(), TimelineState::NotWaiting);
    assert_eq!(timeline.pending(), 0);

    h.event_loop.flush();
    let report = h.report("mouseover");
    assert_eq!(
        report.mark_names(),
        vec![
            "set_timeout",
            "timeout_callback",
            "timeout_callback_done",
            "render"
        ]
    );
    assert_eq!(render_components(&report), vec!["menu ADD 1".to_string()]);
    let render = report.mark("render").unwrap();
    assert_eq!(
        render.detail_value("num_timeouts").and_then(|v| v.as_int()),
        Some(1)
    );
}

#[test]
fn set_timeout_mark_records_delay() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.set_timeout(250.0, idle);
    });
    let mark = h.event_loop.engine().marks().by_name("set_timeout")[0].clone();
    assert_eq!(mark.detail_value("delay").and_then(|v| v.as_float()), Some(250.0));
    assert!(mark.detail_value("stack").is_none());
}

#[test]
fn timeout_stacks_are_attached_when_enabled() {
    let mut h = Harness::with_config(EngineConfig::new().with_timeout_stacks(true));
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.set_timeout(1.0, idle);
    });
    h.event_loop.run_until_idle(5);
    let marks = h.event_loop.engine().marks();
    for name in ["set_timeout", "timeout_callback"] {
        let mark = marks.by_name(name)[0];
        assert!(mark.detail_value("stack").and_then(|v| v.as_text()).is_some());
    }
}

#[test]
fn cancel_completes_before_returning() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    let observed = Rc::new(Cell::new(u32::MAX));
    let probe = Rc::clone(&observed);
    h.click(button, move |scope: &mut Scope<'_, SimHost>| {
        let handle = scope.set_timeout(50.0, idle);
        scope.clear_timeout(handle);
        let pending = scope
            .engine()
            .current_timeline()
            .map_or(u32::MAX, |t| t.pending());
        probe.set(pending);
    });
    assert_eq!(observed.get(), 0);
    assert_eq!(h.event_loop.host().active_timers(), 0);

    h.event_loop.run_for(100.0);
    h.event_loop.flush();
    assert_eq!(h.report("click").mark_names(), vec!["set_timeout"]);
}

#[test]
fn recycled_handle_completes_only_the_new_holder() {
    let mut h = Harness::new();
    let first = h.element(None, "button", "first");
    let second = h.element(None, "button", "second");
    h.start();

    let handles = Rc::new(RefCell::new(Vec::<TimerHandle>::new()));
    let log = Rc::clone(&handles);
    h.click(first, move |scope: &mut Scope<'_, SimHost>| {
        log.borrow_mut().push(scope.set_timeout(10.0, idle));
        log.borrow_mut().push(scope.set_timeout(100.0, idle));
    });
    let first_id = h.event_loop.engine().current_timeline().unwrap().id();
    h.event_loop.run_for(15.0);

    let log = Rc::clone(&handles);
    h.click(second, move |scope: &mut Scope<'_, SimHost>| {
        log.borrow_mut().push(scope.set_timeout(5.0, idle));
    });
    let second_id = h.event_loop.engine().current_timeline().unwrap().id();
    assert_eq!(handles.borrow()[2], handles.borrow()[0]);

    h.event_loop.run_for(10.0);
    let engine = h.event_loop.engine();
    assert_eq!(engine.timeline(first_id).unwrap().pending(), 1);
    assert_eq!(engine.timeline(second_id).unwrap().pending(), 0);

    h.event_loop.run_until_idle(10);
    h.event_loop.flush();
    assert_eq!(h.reports().len(), 2);
}

#[test]
fn siblings_fired_in_one_turn_share_depth() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "save");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.set_timeout(1.0, |scope: &mut Scope<'_, SimHost>| {
            let a = scope.set_timeout(1.0, idle);
            let b = scope.set_timeout(1.0, idle);
            let chains = scope.engine().chains();
            assert_eq!(chains.depth(a), Some(1));
            assert_eq!(chains.depth(b), Some(1));
        });
    });
    h.event_loop.run_until_idle(10);
    h.event_loop.flush();
    assert_eq!(h.report("click").timeline.timeouts_set(), 3);
}

// =============================================================================
// Runaway Chains
// =============================================================================

#[test]
fn bounded_chain_keeps_the_timeline_waiting() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "poll");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| chain(scope, 12));
    h.event_loop.run_until_idle(100);
    h.event_loop.flush();

    let report = h.report("click");
    assert_eq!(report.timeline.timeouts_set(), 12);
    assert!(report.marks.iter().all(|m| m.detail_value("non_terminating").is_none()));
}

#[test]
fn runaway_chain_stops_contributing_pending_work() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "poll");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| chain(scope, 15));
    h.event_loop.run_until_idle(100);
    h.event_loop.flush();

    let click = h.report("click");
    assert_eq!(click.timeline.timeouts_set(), 12);
    let flagged = click
        .marks
        .iter()
        .filter(|m| m.detail_value("non_terminating").is_some())
        .count();
    assert_eq!(flagged, 1);

    let pseudo: Vec<_> = h
        .reports()
        .into_iter()
        .filter(|r| r.timeline.action() == "pseudo_interval")
        .collect();
    assert_eq!(pseudo.len(), 3);
    assert!(pseudo.iter().all(|r| r.timeline.pending() == 0));
}

#[test]
fn chain_depth_limit_is_configurable() {
    let mut h = Harness::with_config(EngineConfig::new().with_chain_depth_limit(2));
    let button = h.element(None, "button", "poll");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| chain(scope, 6));
    h.event_loop.run_until_idle(20);
    h.event_loop.flush();
    assert_eq!(h.report("click").timeline.timeouts_set(), 4);
}

// =============================================================================
// Intervals
// =============================================================================

#[test]
fn interval_is_tracked_for_its_first_firings() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "ticker");
    h.start();

    let ticks = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&ticks);
    h.click(button, move |scope: &mut Scope<'_, SimHost>| {
        scope.set_interval(100.0, move |_: &mut Scope<'_, SimHost>| {
            counter.set(counter.get() + 1);
        });
    });
    let id = h.event_loop.engine().current_timeline().unwrap().id();

    h.event_loop.run_for(950.0);
    assert_eq!(ticks.get(), 9);
    assert_eq!(h.event_loop.engine().timeline(id).unwrap().pending(), 1);

    h.event_loop.run_for(100.0);
    assert_eq!(ticks.get(), 10);
    assert_eq!(h.event_loop.engine().timeline(id).unwrap().pending(), 0);

    h.event_loop.flush();
    let click = h.report("click");
    assert_eq!(click.timeline.intervals_set(), 1);
    assert_eq!(
        click
            .marks
            .iter()
            .filter(|m| m.name.as_str() == "interval_callback")
            .count(),
        10
    );

    h.event_loop.run_for(100.0);
    assert_eq!(ticks.get(), 11);
    h.event_loop.flush();
    assert_eq!(h.report("interval").marks.len(), 2);
}

#[test]
fn long_interval_is_never_tracked() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "refresh");
    h.start();

    h.click(button, |scope: &mut Scope<'_, SimHost>| {
        scope.set_interval(5_000.0, |_: &mut Scope<'_, SimHost>| {});
    });
    let id = h.event_loop.engine().current_timeline().unwrap().id();
    assert_eq!(h.event_loop.engine().timeline(id).unwrap().pending(), 0);

    h.event_loop.run_for(5_000.0);
    assert_eq!(h.report("click").mark_names(), vec!["set_interval"]);
    h.event_loop.flush();
    assert_eq!(
        h.report("interval").mark_names(),
        vec!["interval_callback", "interval_callback_done"]
    );
}

#[test]
fn cleared_interval_releases_its_timeline() {
    let mut h = Harness::new();
    let button = h.element(None, "button", "ticker");
    h.start();

    let slot = Rc::new(Cell::new(None));
    let store = Rc::clone(&slot);
    h.click(button, move |scope: &mut Scope<'_, SimHost>| {
        store.set(Some(scope.set_interval(10.0, |_: &mut Scope<'_, SimHost>| {})));
    });
    h.event_loop.run_for(25.0);

    let handle = slot.get().unwrap();
    h.event_loop.run(move |scope: &mut Scope<'_, SimHost>| scope.clear_interval(handle));
    assert_eq!(h.event_loop.host().active_timers(), 0);
    h.event_loop.flush();
    let click = h.report("click");
    assert_eq!(click.timeline.pending(), 0);
    assert_eq!(
        click
            .marks
            .iter()
            .filter(|m| m.name.as_str() == "interval_callback_done")
            .count(),
        2
    );
}
