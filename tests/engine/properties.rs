//! Property tests over randomized workloads

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use quiesce_engine::{EngineConfig, Scope, Settlement};
use quiesce_foundation::TimerHandle;
use quiesce_runtime::{Route, SimHost};

use crate::common::Harness;

#[derive(Clone, Debug)]
enum Work {
    Timeout { delay: u16, cancel: bool },
    Request { latency: u16 },
    Nested { delay: u16, depth: u8 },
}

fn work_strategy() -> impl Strategy<Value = Work> {
    prop_oneof![
        (0u16..500, any::<bool>()).prop_map(|(delay, cancel)| Work::Timeout { delay, cancel }),
        (1u16..300).prop_map(|latency| Work::Request { latency }),
        (0u16..50, 1u8..15).prop_map(|(delay, depth)| Work::Nested { delay, depth }),
    ]
}

fn nested(scope: &mut Scope<'_, SimHost>, delay: f64, depth: u8) {
    if depth == 0 {
        return;
    }
    scope.set_timeout(delay, move |scope: &mut Scope<'_, SimHost>| {
        nested(scope, delay, depth - 1);
    });
}

fn perform(scope: &mut Scope<'_, SimHost>, work: &[Work], cancels: &Rc<RefCell<Vec<TimerHandle>>>) {
    for (i, item) in work.iter().enumerate() {
        match *item {
            Work::Timeout { delay, cancel } => {
                let handle = scope.set_timeout(f64::from(delay), |_: &mut Scope<'_, SimHost>| {});
                if cancel {
                    cancels.borrow_mut().push(handle);
                }
            }
            Work::Request { latency } => {
                let url = format!("/r/{i}");
                scope.host_mut().network_mut().route(url.clone(), Route::ok(f64::from(latency)));
                scope.send_request(&url, |_: &mut Scope<'_, SimHost>, _: &Settlement| {});
            }
            Work::Nested { delay, depth } => nested(scope, f64::from(delay), depth),
        }
    }
}

proptest! {
    #[test]
    fn pending_returns_to_zero_and_dispatches_once(
        work in prop::collection::vec(work_strategy(), 1..12),
        cancel_after in 0u16..600,
    ) {
        let mut h = Harness::new();
        let button = h.element(None, "button", "go");
        h.start();

        let cancels = Rc::new(RefCell::new(Vec::new()));
        let queue = Rc::clone(&cancels);
        h.click(button, move |scope: &mut Scope<'_, SimHost>| perform(scope, &work, &queue));
        let id = h.event_loop.engine().current_timeline().unwrap().id();

        h.event_loop.run_for(f64::from(cancel_after));
        let handles = cancels.borrow().clone();
        h.event_loop.run(move |scope: &mut Scope<'_, SimHost>| {
            for handle in handles {
                scope.clear_timeout(handle);
                scope.clear_timeout(handle);
            }
        });
        h.event_loop.run_until_idle(10_000);

        if let Some(timeline) = h.event_loop.engine().timeline(id) {
            prop_assert_eq!(timeline.pending(), 0);
        }
        h.event_loop.flush();
        h.event_loop.flush();
        let dispatched = h.reports().iter().filter(|r| r.timeline.id() == id).count();
        prop_assert_eq!(dispatched, 1);
        prop_assert!(h.event_loop.engine().pending_work().is_empty());
    }

    #[test]
    fn report_marks_never_go_backwards(
        work in prop::collection::vec(work_strategy(), 1..10),
    ) {
        let mut h = Harness::new();
        let button = h.element(None, "button", "go");
        h.start();

        let cancels = Rc::new(RefCell::new(Vec::new()));
        h.click(button, move |scope: &mut Scope<'_, SimHost>| perform(scope, &work, &cancels));
        h.event_loop.run_until_idle(10_000);
        h.event_loop.flush();

        for report in h.reports() {
            for pair in report.marks.windows(2) {
                prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            }
            for mark in &report.marks {
                prop_assert_eq!(mark.timeline_id, report.timeline.id());
            }
        }
    }

    #[test]
    fn interval_tracking_is_bounded(
        period in 1u32..2_000,
        limit in 0u32..15,
        runs in 1u32..30,
    ) {
        let config = EngineConfig::new().with_max_interval_firings(limit);
        let mut h = Harness::with_config(config);
        let button = h.element(None, "button", "tick");
        h.start();

        let slot = Rc::new(Cell::new(None));
        let store = Rc::clone(&slot);
        h.click(button, move |scope: &mut Scope<'_, SimHost>| {
            store.set(Some(scope.set_interval(f64::from(period), |_: &mut Scope<'_, SimHost>| {})));
        });
        h.event_loop.run_until_idle(runs as usize);
        if let Some(handle) = slot.get() {
            h.event_loop.run(move |scope: &mut Scope<'_, SimHost>| scope.clear_interval(handle));
        }
        h.event_loop.flush();

        let click = h.report("click");
        let tracked = click
            .marks
            .iter()
            .filter(|m| m.name.as_str() == "interval_callback")
            .count();
        let expected = if f64::from(period) <= 1_000.0 { limit.min(runs) } else { 0 };
        prop_assert_eq!(tracked, expected as usize);
        prop_assert_eq!(click.timeline.pending(), 0);
    }
}
