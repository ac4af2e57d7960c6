//! Assignment coordinator
//!
//! # Design
//!
//! The only component with business logic. Every transition reads and writes
//! both registries, and enforces three invariants:
//!
//! 1. **Legal transitions only.** Illegal operations return a [`Rejection`]
//!    and leave both registries untouched: every check runs before the first
//!    write, and the single fallible write (the notification) runs first.
//! 2. **Mutual exclusion.** A waiter attends at most one kiosk. `claim` scans
//!    every other kiosk before assigning; this scan is the correctness check,
//!    not a cache.
//! 3. **Notification follows assignment.** `claim` raises the waiter's alert;
//!    `confirm`, `finish` and `cancel` clear it.
//!
//! # State diagram
//!
//! ```text
//!             request_help            claim
//!    Free ─────────────────► Pending ───────► Attending ──┐ confirm
//!     ▲  │                      │                 │  ▲     │ (status unchanged)
//!     │  └──────────── claim ───┼────────────────►│  └─────┘
//!     │                         │                 │
//!     └──── finish / cancel ────┴─────────────────┘
//! ```
//!
//! The machine is cyclic; there is no terminal state. Callers serialise
//! access (`&mut self`); the coordinator itself holds no lock.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolation, Rejection};
use crate::kiosks::KioskRegistry;
use crate::notifications::NotificationRegistry;
use crate::types::{
    Availability, CompletedService, HallSnapshot, Kiosk, KioskId, KioskStatus, LastAction,
    WaiterId,
};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Description of one applied transition, suitable for broadcasting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub kiosk: KioskId,
    pub from: KioskStatus,
    pub to: KioskStatus,
    pub action: LastAction,
    /// Waiter involved, if any (the claimant, confirmer, or the released one).
    pub waiter: Option<WaiterId>,
}

/// Successful operation result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub transition: Transition,
    /// Human-readable summary for the caller.
    pub message: String,
    /// Kiosk state after the transition.
    pub state: Kiosk,
}

/// Result of an explicit notification clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    NothingPending,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Owns both registries and mediates every state change.
#[derive(Clone, Debug)]
pub struct Coordinator {
    kiosks: KioskRegistry,
    notifications: NotificationRegistry,
}

impl Coordinator {
    /// Boot the hall: every kiosk `Free`, every notification cleared.
    pub fn new<K, W>(kiosks: K, waiters: W) -> Self
    where
        K: IntoIterator<Item = KioskId>,
        W: IntoIterator<Item = WaiterId>,
    {
        Self {
            kiosks: KioskRegistry::new(kiosks),
            notifications: NotificationRegistry::new(waiters),
        }
    }

    pub fn kiosks(&self) -> &KioskRegistry {
        &self.kiosks
    }

    pub fn notifications(&self) -> &NotificationRegistry {
        &self.notifications
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// A customer asks for help. Legal only from `Free`.
    pub fn request_help(
        &mut self,
        kiosk: &KioskId,
        now: DateTime<Utc>,
    ) -> Result<Outcome, Rejection> {
        let k = self
            .kiosks
            .get_mut(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        if k.status != KioskStatus::Free {
            return Err(illegal(kiosk, k.status, "request help"));
        }

        k.status = KioskStatus::Pending;
        k.started_at = Some(now);
        k.ended_at = None;
        k.last_action = Some(LastAction::RequestedHelp);

        Ok(outcome(
            kiosk,
            KioskStatus::Free,
            LastAction::RequestedHelp,
            None,
            k,
            format!("{kiosk} requested service"),
        ))
    }

    /// A waiter takes ownership of a `Free` or `Pending` kiosk.
    ///
    /// Check order: unknown kiosk, unknown waiter, waiter already attending
    /// another kiosk, kiosk not claimable.
    pub fn claim(
        &mut self,
        kiosk: &KioskId,
        waiter: &WaiterId,
        now: DateTime<Utc>,
    ) -> Result<Outcome, Rejection> {
        let status = self
            .kiosks
            .get(kiosk)
            .map(|k| k.status)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        if !self.notifications.contains(waiter) {
            return Err(Rejection::unknown_waiter(waiter));
        }
        if let Some(other) = self.kiosks.attending_kiosk_of(waiter, Some(kiosk)) {
            return Err(Rejection::ConflictingAssignment {
                waiter: waiter.clone(),
                attending: other.clone(),
            });
        }
        if status == KioskStatus::Attending {
            return Err(illegal(kiosk, status, "be claimed"));
        }

        self.notifications.raise(waiter, kiosk, now)?;

        let k = self
            .kiosks
            .get_mut(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        if status == KioskStatus::Free {
            k.ended_at = None;
        }
        k.status = KioskStatus::Attending;
        k.assigned_waiter = Some(waiter.clone());
        // Keep the original request time when coming from Pending.
        k.started_at.get_or_insert(now);
        k.last_action = Some(LastAction::ClaimedBy(waiter.clone()));

        Ok(outcome(
            kiosk,
            status,
            LastAction::ClaimedBy(waiter.clone()),
            Some(waiter.clone()),
            k,
            format!("{kiosk} is being attended by {waiter}"),
        ))
    }

    /// The assigned waiter acknowledges arrival (RFID read).
    ///
    /// Clears the waiter's notification; kiosk status is unchanged.
    pub fn confirm(&mut self, kiosk: &KioskId, waiter: &WaiterId) -> Result<Outcome, Rejection> {
        let k = self
            .kiosks
            .get(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        if k.assigned_waiter.as_ref() != Some(waiter) {
            return Err(Rejection::MismatchedWaiter {
                kiosk: kiosk.clone(),
                attempted: waiter.clone(),
                assigned: k.assigned_waiter.clone(),
            });
        }
        if k.status != KioskStatus::Attending {
            return Err(illegal(kiosk, k.status, "be confirmed"));
        }

        self.notifications.clear(waiter)?;

        let k = self
            .kiosks
            .get_mut(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        k.last_action = Some(LastAction::ConfirmedBy(waiter.clone()));

        Ok(outcome(
            kiosk,
            KioskStatus::Attending,
            LastAction::ConfirmedBy(waiter.clone()),
            Some(waiter.clone()),
            k,
            format!("{waiter} confirmed attendance at {kiosk}"),
        ))
    }

    /// Close the engagement and return the kiosk to `Free`.
    ///
    /// `ended_at` stays visible until the next cycle starts.
    pub fn finish(&mut self, kiosk: &KioskId, now: DateTime<Utc>) -> Result<Outcome, Rejection> {
        let (status, waiter) = self.releasable(kiosk, "finish")?;

        if let Some(w) = &waiter {
            self.notifications.clear(w)?;
        }

        let k = self
            .kiosks
            .get_mut(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        k.ended_at = Some(now);
        k.last_action = Some(LastAction::Finished);
        k.last_service = Some(CompletedService {
            waiter: waiter.clone(),
            started_at: k.started_at,
            ended_at: now,
        });
        k.status = KioskStatus::Free;
        k.assigned_waiter = None;
        k.started_at = None;

        Ok(outcome(
            kiosk,
            status,
            LastAction::Finished,
            waiter,
            k,
            format!("{kiosk} finished and is free"),
        ))
    }

    /// Abort a `Pending` or `Attending` kiosk without recording a service.
    pub fn cancel(&mut self, kiosk: &KioskId) -> Result<Outcome, Rejection> {
        let (status, waiter) = self.releasable(kiosk, "be cancelled")?;

        if let Some(w) = &waiter {
            self.notifications.clear(w)?;
        }

        let k = self
            .kiosks
            .get_mut(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        k.ended_at = None;
        k.last_action = Some(LastAction::Cancelled);
        k.status = KioskStatus::Free;
        k.assigned_waiter = None;
        k.started_at = None;

        Ok(outcome(
            kiosk,
            status,
            LastAction::Cancelled,
            waiter,
            k,
            format!("{kiosk} was cancelled and is free"),
        ))
    }

    /// Explicit notification acknowledgement from a waiter device.
    pub fn clear_notification(&mut self, waiter: &WaiterId) -> Result<ClearOutcome, Rejection> {
        if self.notifications.clear(waiter)? {
            Ok(ClearOutcome::Cleared)
        } else {
            Ok(ClearOutcome::NothingPending)
        }
    }

    // Shared precondition of finish/cancel: kiosk exists and is not Free.
    fn releasable(
        &self,
        kiosk: &KioskId,
        operation: &'static str,
    ) -> Result<(KioskStatus, Option<WaiterId>), Rejection> {
        let k = self
            .kiosks
            .get(kiosk)
            .ok_or_else(|| Rejection::unknown_kiosk(kiosk))?;
        match k.status {
            KioskStatus::Free => Err(illegal(kiosk, k.status, operation)),
            KioskStatus::Pending | KioskStatus::Attending => {
                Ok((k.status, k.assigned_waiter.clone()))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Availability of one waiter, or `None` if not in the pool.
    pub fn availability_of(&self, waiter: &WaiterId) -> Option<Availability> {
        if !self.notifications.contains(waiter) {
            return None;
        }
        let kiosk = self.kiosks.attending_kiosk_of(waiter, None).cloned();
        Some(Availability {
            available: kiosk.is_none(),
            busy: kiosk.is_some(),
            kiosk,
        })
    }

    /// Availability of every waiter, derived from the kiosk map on each call.
    pub fn availability(&self) -> BTreeMap<WaiterId, Availability> {
        self.notifications
            .waiters()
            .filter_map(|w| self.availability_of(w).map(|a| (w.clone(), a)))
            .collect()
    }

    /// Owned, consistent copy of the whole hall.
    pub fn snapshot(&self) -> HallSnapshot {
        HallSnapshot {
            kiosks: self.kiosks.snapshot(),
            notifications: self.notifications.snapshot(),
            availability: self.availability(),
        }
    }

    /// Verify every cross-registry invariant.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut attending: BTreeMap<&WaiterId, &KioskId> = BTreeMap::new();

        for (id, k) in self.kiosks.iter() {
            let should_have_waiter = k.status == KioskStatus::Attending;
            if k.assigned_waiter.is_some() != should_have_waiter {
                return Err(InvariantViolation::WaiterStatusMismatch {
                    kiosk: id.clone(),
                    status: k.status,
                    has_waiter: k.assigned_waiter.is_some(),
                });
            }
            if k.status != KioskStatus::Free && k.started_at.is_none() {
                return Err(InvariantViolation::MissingStartedAt {
                    kiosk: id.clone(),
                    status: k.status,
                });
            }
            if let Some(w) = &k.assigned_waiter {
                if let Some(first) = attending.insert(w, id) {
                    return Err(InvariantViolation::DoubleAssignment {
                        waiter: w.clone(),
                        first: first.clone(),
                        second: id.clone(),
                    });
                }
            }
        }

        for (w, n) in self.notifications.iter() {
            if !n.pending {
                continue;
            }
            let matches = n
                .kiosk
                .as_ref()
                .and_then(|k| self.kiosks.get(k))
                .is_some_and(|k| k.is_attended_by(w));
            if !matches {
                return Err(InvariantViolation::DanglingNotification { waiter: w.clone() });
            }
        }

        Ok(())
    }
}

fn illegal(kiosk: &KioskId, status: KioskStatus, operation: &'static str) -> Rejection {
    Rejection::IllegalStateTransition {
        kiosk: kiosk.clone(),
        status,
        operation,
    }
}

fn outcome(
    kiosk: &KioskId,
    from: KioskStatus,
    action: LastAction,
    waiter: Option<WaiterId>,
    state: &Kiosk,
    message: String,
) -> Outcome {
    Outcome {
        transition: Transition {
            kiosk: kiosk.clone(),
            from,
            to: state.status,
            action,
            waiter,
        },
        message,
        state: state.clone(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hall() -> Coordinator {
        Coordinator::new(
            ["kiosko-1", "kiosko-2", "kiosko-3", "kiosko-4"].map(KioskId::new),
            ["mesero1", "mesero2", "mesero3"].map(WaiterId::new),
        )
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn k(s: &str) -> KioskId {
        KioskId::new(s)
    }

    fn w(s: &str) -> WaiterId {
        WaiterId::new(s)
    }

    #[test]
    fn request_help_moves_free_to_pending() {
        let mut c = hall();
        let out = c.request_help(&k("kiosko-1"), at(10, 0)).unwrap();
        assert_eq!(out.transition.from, KioskStatus::Free);
        assert_eq!(out.transition.to, KioskStatus::Pending);
        assert_eq!(out.state.started_at, Some(at(10, 0)));
        assert_eq!(out.state.assigned_waiter, None);
        assert_eq!(out.state.last_action, Some(LastAction::RequestedHelp));
        c.check_invariants().unwrap();
    }

    #[test]
    fn request_help_twice_is_rejected_without_mutation() {
        let mut c = hall();
        c.request_help(&k("kiosko-1"), at(10, 0)).unwrap();
        let before = c.snapshot();
        let err = c.request_help(&k("kiosko-1"), at(10, 5)).unwrap_err();
        assert_eq!(err.kind(), "illegal_state_transition");
        assert_eq!(c.snapshot(), before);
    }

    #[test]
    fn claim_from_pending_preserves_request_time() {
        let mut c = hall();
        c.request_help(&k("kiosko-1"), at(10, 0)).unwrap();
        let out = c.claim(&k("kiosko-1"), &w("mesero1"), at(10, 3)).unwrap();
        assert_eq!(out.transition.from, KioskStatus::Pending);
        assert_eq!(out.state.started_at, Some(at(10, 0)));
        assert_eq!(out.state.assigned_waiter, Some(w("mesero1")));
    }

    #[test]
    fn claim_from_free_stamps_now_and_raises_notification() {
        let mut c = hall();
        let out = c.claim(&k("kiosko-2"), &w("mesero1"), at(11, 0)).unwrap();
        assert_eq!(out.state.started_at, Some(at(11, 0)));
        let n = c.notifications().get(&w("mesero1")).unwrap();
        assert!(n.pending);
        assert_eq!(n.kiosk, Some(k("kiosko-2")));
        assert_eq!(n.raised_at, Some(at(11, 0)));
        c.check_invariants().unwrap();
    }

    #[test]
    fn claim_by_unknown_waiter_is_unknown_entity() {
        let mut c = hall();
        let err = c.claim(&k("kiosko-1"), &w("mesero9"), at(9, 0)).unwrap_err();
        assert!(err.is_unknown_entity());
        assert_eq!(c.kiosks().get(&k("kiosko-1")).unwrap().status, KioskStatus::Free);
    }

    #[test]
    fn claim_on_attending_kiosk_is_illegal_not_conflicting() {
        let mut c = hall();
        c.claim(&k("kiosko-1"), &w("mesero1"), at(9, 0)).unwrap();
        // Same waiter, same kiosk: the exclusivity scan skips this kiosk.
        let err = c.claim(&k("kiosko-1"), &w("mesero1"), at(9, 1)).unwrap_err();
        assert_eq!(err.kind(), "illegal_state_transition");
        let err = c.claim(&k("kiosko-1"), &w("mesero2"), at(9, 1)).unwrap_err();
        assert_eq!(err.kind(), "illegal_state_transition");
        assert!(!c.notifications().get(&w("mesero2")).unwrap().pending);
    }

    #[test]
    fn confirm_clears_notification_and_keeps_status() {
        let mut c = hall();
        c.claim(&k("kiosko-1"), &w("mesero1"), at(9, 0)).unwrap();
        let out = c.confirm(&k("kiosko-1"), &w("mesero1")).unwrap();
        assert_eq!(out.transition.from, KioskStatus::Attending);
        assert_eq!(out.transition.to, KioskStatus::Attending);
        assert_eq!(out.state.last_action, Some(LastAction::ConfirmedBy(w("mesero1"))));
        assert!(!c.notifications().get(&w("mesero1")).unwrap().pending);
        c.check_invariants().unwrap();
    }

    #[test]
    fn confirm_on_pending_kiosk_names_nobody_assigned() {
        let mut c = hall();
        c.request_help(&k("kiosko-3"), at(9, 0)).unwrap();
        let err = c.confirm(&k("kiosko-3"), &w("mesero1")).unwrap_err();
        assert_eq!(
            err,
            Rejection::MismatchedWaiter {
                kiosk: k("kiosko-3"),
                attempted: w("mesero1"),
                assigned: None,
            }
        );
        assert_eq!(err.to_string(), "wrong waiter for kiosko-3: assigned to nobody");
    }

    #[test]
    fn finish_records_service_and_resets() {
        let mut c = hall();
        c.request_help(&k("kiosko-1"), at(9, 0)).unwrap();
        c.claim(&k("kiosko-1"), &w("mesero2"), at(9, 2)).unwrap();
        let out = c.finish(&k("kiosko-1"), at(9, 20)).unwrap();

        assert_eq!(out.transition.waiter, Some(w("mesero2")));
        let kiosk = &out.state;
        assert_eq!(kiosk.status, KioskStatus::Free);
        assert_eq!(kiosk.assigned_waiter, None);
        assert_eq!(kiosk.started_at, None);
        assert_eq!(kiosk.ended_at, Some(at(9, 20)));
        assert_eq!(
            kiosk.last_service,
            Some(CompletedService {
                waiter: Some(w("mesero2")),
                started_at: Some(at(9, 0)),
                ended_at: at(9, 20),
            })
        );
        assert!(!c.notifications().get(&w("mesero2")).unwrap().pending);
        c.check_invariants().unwrap();
    }

    #[test]
    fn next_cycle_clears_previous_end_stamp() {
        let mut c = hall();
        c.claim(&k("kiosko-1"), &w("mesero1"), at(9, 0)).unwrap();
        c.finish(&k("kiosko-1"), at(9, 10)).unwrap();
        let out = c.request_help(&k("kiosko-1"), at(9, 30)).unwrap();
        assert_eq!(out.state.ended_at, None);
        assert!(out.state.last_service.is_some(), "last service survives");
    }

    #[test]
    fn finish_from_pending_releases_without_waiter() {
        let mut c = hall();
        c.request_help(&k("kiosko-4"), at(9, 0)).unwrap();
        let out = c.finish(&k("kiosko-4"), at(9, 1)).unwrap();
        assert_eq!(out.transition.waiter, None);
        assert_eq!(out.state.last_service.unwrap().waiter, None);
    }

    #[test]
    fn cancel_clears_end_stamp_and_notification() {
        let mut c = hall();
        c.claim(&k("kiosko-2"), &w("mesero3"), at(12, 0)).unwrap();
        let out = c.cancel(&k("kiosko-2")).unwrap();
        assert_eq!(out.state.status, KioskStatus::Free);
        assert_eq!(out.state.ended_at, None);
        assert_eq!(out.state.last_action, Some(LastAction::Cancelled));
        assert_eq!(out.state.last_service, None);
        assert!(!c.notifications().get(&w("mesero3")).unwrap().pending);
        assert!(c.availability_of(&w("mesero3")).unwrap().available);
    }

    #[test]
    fn clear_notification_distinguishes_outcomes() {
        let mut c = hall();
        assert_eq!(
            c.clear_notification(&w("mesero1")).unwrap(),
            ClearOutcome::NothingPending
        );
        c.claim(&k("kiosko-1"), &w("mesero1"), at(8, 0)).unwrap();
        assert_eq!(c.clear_notification(&w("mesero1")).unwrap(), ClearOutcome::Cleared);
        assert!(c
            .clear_notification(&w("mesero7"))
            .unwrap_err()
            .is_unknown_entity());
        // Kiosk still attended; only the alert went away.
        assert_eq!(
            c.kiosks().get(&k("kiosko-1")).unwrap().status,
            KioskStatus::Attending
        );
        c.check_invariants().unwrap();
    }

    #[test]
    fn availability_tracks_attending_only() {
        let mut c = hall();
        c.request_help(&k("kiosko-1"), at(8, 0)).unwrap();
        c.claim(&k("kiosko-2"), &w("mesero2"), at(8, 1)).unwrap();
        let av = c.availability();
        assert_eq!(av.len(), 3);
        assert!(av[&w("mesero1")].available);
        assert!(av[&w("mesero2")].busy);
        assert_eq!(av[&w("mesero2")].kiosk, Some(k("kiosko-2")));
        assert_eq!(c.availability_of(&w("ghost")), None);
    }

    #[test]
    fn invariant_checker_catches_double_assignment() {
        let mut c = hall();
        for id in ["kiosko-1", "kiosko-2"] {
            let kiosk = c.kiosks.get_mut(&k(id)).unwrap();
            kiosk.status = KioskStatus::Attending;
            kiosk.assigned_waiter = Some(w("mesero1"));
            kiosk.started_at = Some(at(8, 0));
        }
        assert!(matches!(
            c.check_invariants(),
            Err(InvariantViolation::DoubleAssignment { .. })
        ));
    }
}
