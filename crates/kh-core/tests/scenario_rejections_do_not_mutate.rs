//! Scenario: every rejection is distinguishable and leaves state untouched.
//!
//! Covers the mismatched-waiter confirm, cancel on a free kiosk, finishing
//! twice, and unknown ids for every operation.

use chrono::{DateTime, TimeZone, Utc};
use kh_core::*;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, h, m, 0).unwrap()
}

fn hall() -> Coordinator {
    Coordinator::new(
        ["kiosko-1", "kiosko-2", "kiosko-3", "kiosko-4"].map(KioskId::new),
        ["mesero1", "mesero2", "mesero3"].map(WaiterId::new),
    )
}

fn k(s: &str) -> KioskId {
    KioskId::new(s)
}

fn w(s: &str) -> WaiterId {
    WaiterId::new(s)
}

#[test]
fn scenario_confirm_by_wrong_waiter_is_mismatch() {
    let mut c = hall();
    c.claim(&k("kiosko-1"), &w("mesero1"), at(10, 0)).unwrap();
    let before = c.snapshot();

    let err = c.confirm(&k("kiosko-1"), &w("mesero2")).unwrap_err();
    assert_eq!(err.kind(), "mismatched_waiter");
    match &err {
        Rejection::MismatchedWaiter { assigned, .. } => {
            assert_eq!(assigned.as_ref(), Some(&w("mesero1")));
        }
        other => panic!("unexpected rejection: {other:?}"),
    }
    assert!(err.to_string().contains("mesero1"));
    assert_eq!(c.snapshot(), before, "no state mutated");
    assert!(c.notifications().get(&w("mesero1")).unwrap().pending);
}

#[test]
fn scenario_cancel_free_kiosk_is_illegal() {
    let mut c = hall();
    let before = c.snapshot();
    let err = c.cancel(&k("kiosko-4")).unwrap_err();
    assert_eq!(
        err,
        Rejection::IllegalStateTransition {
            kiosk: k("kiosko-4"),
            status: KioskStatus::Free,
            operation: "be cancelled",
        }
    );
    assert_eq!(c.snapshot(), before);
}

#[test]
fn scenario_second_finish_is_rejected_without_change() {
    let mut c = hall();
    c.claim(&k("kiosko-2"), &w("mesero2"), at(10, 0)).unwrap();
    c.finish(&k("kiosko-2"), at(10, 30)).unwrap();
    let before = c.snapshot();

    let err = c.finish(&k("kiosko-2"), at(10, 31)).unwrap_err();
    assert_eq!(err.kind(), "illegal_state_transition");
    assert_eq!(c.snapshot(), before);
    assert_eq!(c.snapshot().kiosks[&k("kiosko-2")].ended_at, Some(at(10, 30)));
}

#[test]
fn scenario_unknown_ids_are_unknown_entity_everywhere() {
    let mut c = hall();
    let ghost = k("kiosko-99");
    let before = c.snapshot();

    let errs = [
        c.request_help(&ghost, at(8, 0)).unwrap_err(),
        c.claim(&ghost, &w("mesero1"), at(8, 0)).unwrap_err(),
        c.claim(&k("kiosko-1"), &w("mesero99"), at(8, 0)).unwrap_err(),
        c.confirm(&ghost, &w("mesero1")).unwrap_err(),
        c.finish(&ghost, at(8, 0)).unwrap_err(),
        c.cancel(&ghost).unwrap_err(),
        c.clear_notification(&w("mesero99")).unwrap_err(),
    ];
    for e in &errs {
        assert!(e.is_unknown_entity(), "expected unknown entity, got {e:?}");
        assert_eq!(e.kind(), "unknown_entity");
    }
    assert_eq!(c.snapshot(), before);
}

#[test]
fn scenario_rejection_kinds_are_distinct() {
    let mut c = hall();
    c.claim(&k("kiosko-1"), &w("mesero1"), at(8, 0)).unwrap();

    let unknown = c.finish(&k("nope"), at(8, 1)).unwrap_err();
    let conflict = c.claim(&k("kiosko-2"), &w("mesero1"), at(8, 1)).unwrap_err();
    let mismatch = c.confirm(&k("kiosko-1"), &w("mesero3")).unwrap_err();
    let illegal = c.cancel(&k("kiosko-3")).unwrap_err();

    let kinds = [unknown.kind(), conflict.kind(), mismatch.kind(), illegal.kind()];
    let mut uniq = kinds.to_vec();
    uniq.sort();
    uniq.dedup();
    assert_eq!(uniq.len(), 4, "kinds collided: {kinds:?}");
}
