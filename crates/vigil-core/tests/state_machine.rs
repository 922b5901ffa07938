//! End-to-end scenarios for the result-to-state machine, plus the
//! idempotence property: applying the same result twice is a no-op.

mod common;

use proptest::prelude::*;
use vigil_core::{
    unix_now, Acknowledgement, CheckResult, CheckType, Downtime, HostState, NotificationType,
    ServiceState, StateType,
};

use common::world;

fn svc_result(rc: i32, start: i64) -> CheckResult {
    CheckResult {
        host_name: "web1".into(),
        service_description: Some("http".into()),
        return_code: rc,
        output: format!("status {rc}"),
        check_type: CheckType::Active,
        exited_ok: true,
        start_time: start,
        finish_time: start + 1,
        latency: 0.0,
    }
}

fn host_result(rc: i32, start: i64) -> CheckResult {
    CheckResult {
        host_name: "web1".into(),
        service_description: None,
        return_code: rc,
        output: "ping".into(),
        check_type: CheckType::Active,
        exited_ok: true,
        start_time: start,
        finish_time: start + 1,
        latency: 0.0,
    }
}

#[test]
fn soft_to_hard_then_single_problem_notification() {
    let w = world();
    let base = unix_now() + 100;

    w.handler.handle(&svc_result(2, base));
    w.handler.handle(&svc_result(2, base + 30));
    assert_eq!(w.notifier.count(), 0);

    w.handler.handle(&svc_result(2, base + 60));
    let s = w.store.service("web1", "http").unwrap().read().clone();
    assert_eq!(s.state, ServiceState::Critical);
    assert_eq!(s.state_type, StateType::Hard);
    assert_eq!(s.current_attempt, 3);

    let sent = w.notifier.take();
    assert_eq!(
        sent,
        vec![("web1".to_string(), Some("http".to_string()), NotificationType::Problem)]
    );
}

#[test]
fn recovery_after_hard_problem_clears_everything() {
    let w = world();
    let base = unix_now() + 100;
    for i in 0..3 {
        w.handler.handle(&svc_result(2, base + i * 30));
    }
    {
        let row = w.store.service("web1", "http").unwrap();
        row.write().acknowledgement = Acknowledgement::Normal;
    }
    w.notifier.take();

    w.handler.handle(&svc_result(0, base + 200));
    let s = w.store.service("web1", "http").unwrap().read().clone();
    assert_eq!(s.state, ServiceState::Ok);
    assert_eq!(s.acknowledgement, Acknowledgement::None);
    assert_eq!(s.notified_on, 0);
    assert_eq!(s.notification_number, 0);
    let kinds: Vec<_> = w.notifier.take().into_iter().map(|r| r.2).collect();
    assert_eq!(kinds, vec![NotificationType::Recovery]);
}

#[test]
fn downtime_hides_notifications_until_it_ends() {
    let w = world();
    let base = unix_now() + 100;

    // Host under a started fixed downtime.
    let id = w
        .downtimes
        .schedule(Downtime::new("web1", None, 100, i64::MAX / 2, true, 0, 0, "ops", "window"));
    w.downtimes.handle_start(id);
    w.notifier.take();

    for i in 0..3 {
        w.handler.handle(&host_result(1, base + i * 30));
    }
    assert_eq!(
        w.notifier.count(),
        0,
        "hard DOWN inside downtime stays silent"
    );
    assert_eq!(
        w.store.host("web1").unwrap().read().state,
        HostState::Down
    );

    // End the downtime; recover; fail hard again: now it notifies.
    w.downtimes.handle_end(id);
    w.notifier.take();
    w.handler.handle(&host_result(0, base + 200));
    w.notifier.take();
    for i in 0..3 {
        w.handler.handle(&host_result(1, base + 300 + i * 30));
    }
    let kinds: Vec<_> = w.notifier.take().into_iter().map(|r| r.2).collect();
    assert!(kinds.contains(&NotificationType::Problem));
}

#[test]
fn sticky_ack_survives_state_change_normal_does_not() {
    let w = world();
    let base = unix_now() + 100;
    for i in 0..3 {
        w.handler.handle(&svc_result(2, base + i * 30));
    }

    // Normal ack clears on a CRITICAL→WARNING transition.
    {
        let row = w.store.service("web1", "http").unwrap();
        row.write().acknowledgement = Acknowledgement::Normal;
    }
    w.handler.handle(&svc_result(1, base + 100));
    assert_eq!(
        w.store.service("web1", "http").unwrap().read().acknowledgement,
        Acknowledgement::None
    );

    // Sticky ack survives the same transition.
    {
        let row = w.store.service("web1", "http").unwrap();
        row.write().acknowledgement = Acknowledgement::Sticky;
    }
    w.handler.handle(&svc_result(2, base + 200));
    assert_eq!(
        w.store.service("web1", "http").unwrap().read().acknowledgement,
        Acknowledgement::Sticky
    );

    // ...but not recovery.
    w.handler.handle(&svc_result(0, base + 300));
    assert_eq!(
        w.store.service("web1", "http").unwrap().read().acknowledgement,
        Acknowledgement::None
    );
}

proptest! {
    /// Applying any result twice leaves the same state as applying it once.
    #[test]
    fn duplicate_results_are_net_zero(codes in proptest::collection::vec(0i32..4, 1..12)) {
        let w = world();
        let base = unix_now() + 100;
        for (i, rc) in codes.iter().enumerate() {
            let r = svc_result(*rc, base + (i as i64) * 30);
            w.handler.handle(&r);
            let snapshot = w.store.service("web1", "http").unwrap().read().clone();
            w.handler.handle(&r);
            let again = w.store.service("web1", "http").unwrap().read().clone();
            prop_assert_eq!(snapshot.state, again.state);
            prop_assert_eq!(snapshot.state_type, again.state_type);
            prop_assert_eq!(snapshot.current_attempt, again.current_attempt);
            prop_assert_eq!(snapshot.last_check, again.last_check);
            prop_assert_eq!(snapshot.notification_number, again.notification_number);
        }
    }

    /// Attempts never exceed max_attempts, and HARD always means the
    /// attempt counter reached it (or a 1-attempt object).
    #[test]
    fn attempts_bounded_by_max(codes in proptest::collection::vec(0i32..4, 1..30)) {
        let w = world();
        let base = unix_now() + 100;
        for (i, rc) in codes.iter().enumerate() {
            w.handler.handle(&svc_result(*rc, base + (i as i64) * 30));
            let s = w.store.service("web1", "http").unwrap().read().clone();
            prop_assert!(s.current_attempt <= s.max_attempts);
        }
    }
}
