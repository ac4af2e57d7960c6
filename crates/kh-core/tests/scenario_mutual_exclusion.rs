//! Scenario: a waiter never attends two kiosks at once.
//!
//! 1. Sequential: a second claim by the same waiter is a conflict and leaves
//!    the target kiosk unchanged.
//! 2. Concurrent: many threads race to claim different kiosks for the same
//!    waiter through one lock; exactly one wins.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use chrono::{TimeZone, Utc};
use kh_core::*;

fn hall() -> Coordinator {
    Coordinator::new(
        ["kiosko-1", "kiosko-2", "kiosko-3", "kiosko-4"].map(KioskId::new),
        ["mesero1", "mesero2", "mesero3"].map(WaiterId::new),
    )
}

#[test]
fn scenario_second_claim_by_same_waiter_conflicts() {
    let mut c = hall();
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 15, 0, 0).unwrap();
    let waiter = WaiterId::new("mesero1");

    let out = c.claim(&KioskId::new("kiosko-2"), &waiter, now).unwrap();
    assert_eq!(out.state.status, KioskStatus::Attending);
    assert_eq!(out.state.assigned_waiter, Some(waiter.clone()));
    let n = c.notifications().get(&waiter).unwrap();
    assert!(n.pending);
    assert_eq!(n.kiosk, Some(KioskId::new("kiosko-2")));

    let err = c.claim(&KioskId::new("kiosko-3"), &waiter, now).unwrap_err();
    assert_eq!(
        err,
        Rejection::ConflictingAssignment {
            waiter: waiter.clone(),
            attending: KioskId::new("kiosko-2"),
        }
    );
    assert_eq!(
        c.kiosks().get(&KioskId::new("kiosko-3")).unwrap(),
        &Kiosk::free()
    );
    assert_eq!(
        c.notifications().get(&waiter).unwrap().kiosk,
        Some(KioskId::new("kiosko-2")),
        "notification still points at the first kiosk"
    );
}

#[test]
fn scenario_pending_kiosk_conflict_leaves_it_pending() {
    let mut c = hall();
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 15, 0, 0).unwrap();
    c.request_help(&KioskId::new("kiosko-4"), now).unwrap();
    c.claim(&KioskId::new("kiosko-1"), &WaiterId::new("mesero2"), now)
        .unwrap();

    let err = c
        .claim(&KioskId::new("kiosko-4"), &WaiterId::new("mesero2"), now)
        .unwrap_err();
    assert_eq!(err.kind(), "conflicting_assignment");
    let k4 = c.kiosks().get(&KioskId::new("kiosko-4")).unwrap();
    assert_eq!(k4.status, KioskStatus::Pending);
    assert_eq!(k4.assigned_waiter, None);
}

#[test]
fn scenario_concurrent_claims_assign_waiter_once() {
    let kiosks: Vec<KioskId> = (1..=16).map(|i| KioskId::new(format!("kiosko-{i}"))).collect();
    let hall = Arc::new(Mutex::new(Coordinator::new(
        kiosks.clone(),
        [WaiterId::new("mesero1")],
    )));
    let barrier = Arc::new(Barrier::new(kiosks.len()));

    let handles: Vec<_> = kiosks
        .into_iter()
        .map(|kiosk| {
            let hall = Arc::clone(&hall);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut c = hall.lock().unwrap();
                c.claim(&kiosk, &WaiterId::new("mesero1"), Utc::now()).is_ok()
            })
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(wins, 1, "exactly one claim may succeed");

    let c = hall.lock().unwrap();
    c.check_invariants().unwrap();
    let attending = c
        .kiosks()
        .iter()
        .filter(|(_, k)| k.status == KioskStatus::Attending)
        .count();
    assert_eq!(attending, 1);
}
