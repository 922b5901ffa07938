//! Downtime lifecycle invariants: depth never goes negative, every depth
//! transition through zero produces exactly one STARTED and one
//! STOPPED/CANCELLED, and overlapping downtimes leave depth equal to the
//! number still active.

mod common;

use proptest::prelude::*;
use vigil_core::{Downtime, NotificationType};

use common::world;

fn fixed_host_downtime(start: i64, end: i64) -> Downtime {
    Downtime::new("web1", None, start, end, true, 0, 0, "ops", "window")
}

#[test]
fn triggered_cascade_depth_and_comments() {
    let w = world();
    let a = w.downtimes.schedule(fixed_host_downtime(100, 7300));
    let mut b = fixed_host_downtime(100, 7300);
    b.triggered_by = a;
    w.downtimes.schedule(b);

    w.downtimes.handle_start(a);
    let host = w.store.host("web1").unwrap();
    assert_eq!(host.read().scheduled_downtime_depth, 2);

    w.downtimes.unschedule(a);
    assert_eq!(host.read().scheduled_downtime_depth, 0);
    assert!(w.downtimes.is_empty());
    assert!(w.comments.is_empty());
}

#[test]
fn start_stop_notifications_only_on_zero_transitions() {
    let w = world();
    let ids: Vec<u64> = (0..3)
        .map(|_| w.downtimes.schedule(fixed_host_downtime(100, 7300)))
        .collect();
    for id in &ids {
        w.downtimes.handle_start(*id);
    }
    let starts: Vec<_> = w
        .notifier
        .take()
        .into_iter()
        .filter(|(_, _, k)| *k == NotificationType::DowntimeStart)
        .collect();
    assert_eq!(starts.len(), 1, "only the 0→1 transition announces");

    for id in &ids {
        w.downtimes.handle_end(*id);
    }
    let ends: Vec<_> = w
        .notifier
        .take()
        .into_iter()
        .filter(|(_, _, k)| *k == NotificationType::DowntimeEnd)
        .collect();
    assert_eq!(ends.len(), 1, "only the 1→0 transition announces");
}

/// One step of a random downtime workload.
#[derive(Debug, Clone)]
enum Step {
    Schedule,
    Start(usize),
    End(usize),
    Unschedule(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Schedule),
        (0usize..8).prop_map(Step::Start),
        (0usize..8).prop_map(Step::End),
        (0usize..8).prop_map(Step::Unschedule),
    ]
}

proptest! {
    #[test]
    fn depth_invariant_over_random_workloads(steps in proptest::collection::vec(step_strategy(), 1..60)) {
        let w = world();
        let mut ids: Vec<u64> = Vec::new();

        for step in steps {
            match step {
                Step::Schedule => {
                    ids.push(w.downtimes.schedule(fixed_host_downtime(100, i64::MAX / 2)));
                }
                Step::Start(i) => {
                    if let Some(id) = ids.get(i) {
                        w.downtimes.handle_start(*id);
                    }
                }
                Step::End(i) => {
                    if let Some(id) = ids.get(i) {
                        w.downtimes.handle_end(*id);
                    }
                }
                Step::Unschedule(i) => {
                    if let Some(id) = ids.get(i) {
                        w.downtimes.unschedule(*id);
                    }
                }
            }
            // Depth is unsigned in the row; the invariant that matters is
            // that it always equals the number of in-effect downtimes.
            let depth = w.store.host("web1").unwrap().read().scheduled_downtime_depth;
            let active = w.downtimes.all().iter().filter(|d| d.in_effect).count();
            prop_assert_eq!(depth as usize, active);
        }

        // Symmetric teardown of whatever survived.
        for d in w.downtimes.all() {
            w.downtimes.unschedule(d.id);
        }
        let depth = w.store.host("web1").unwrap().read().scheduled_downtime_depth;
        prop_assert_eq!(depth, 0);
    }

    #[test]
    fn pending_flex_matches_waiting_downtimes(n in 1usize..6, started in proptest::collection::vec(any::<bool>(), 6)) {
        let w = world();
        let now = vigil_core::unix_now();
        let mut ids = Vec::new();
        for _ in 0..n {
            ids.push(w.downtimes.schedule(Downtime::new(
                "web1", None, now - 10, now + 10_000, false, 600, 0, "ops", "flex",
            )));
        }
        for (id, start) in ids.iter().zip(&started) {
            if *start {
                w.downtimes.handle_start(*id);
            }
        }
        let waiting = w
            .downtimes
            .all()
            .iter()
            .filter(|d| !d.in_effect && d.incremented_pending)
            .count();
        let pending = w.store.host("web1").unwrap().read().pending_flex_downtime;
        prop_assert_eq!(pending as usize, waiting);
    }
}
