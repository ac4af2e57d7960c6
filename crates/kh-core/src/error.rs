use std::fmt;

use thiserror::Error;

use crate::types::{KioskId, KioskStatus, WaiterId};

/// Which roster an unknown id was looked up in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Kiosk,
    Waiter,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Kiosk => f.write_str("kiosk"),
            EntityKind::Waiter => f.write_str("waiter"),
        }
    }
}

/// Why an operation was refused.
///
/// Every rejection is a caller error, final for the current state, and
/// guarantees that nothing was mutated.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The id is not part of the fixed roster.
    #[error("{kind} {id} does not exist")]
    UnknownEntity { kind: EntityKind, id: String },

    /// The operation is not legal from the kiosk's current status.
    #[error("{kiosk} cannot {operation} while {status}")]
    IllegalStateTransition {
        kiosk: KioskId,
        status: KioskStatus,
        operation: &'static str,
    },

    /// The waiter already attends another kiosk.
    #[error("{waiter} is already attending {attending}")]
    ConflictingAssignment {
        waiter: WaiterId,
        attending: KioskId,
    },

    /// Confirm attempted by someone other than the assigned waiter.
    #[error("wrong waiter for {kiosk}: assigned to {}", assigned_label(.assigned))]
    MismatchedWaiter {
        kiosk: KioskId,
        attempted: WaiterId,
        assigned: Option<WaiterId>,
    },
}

fn assigned_label(assigned: &Option<WaiterId>) -> String {
    match assigned {
        Some(w) => w.to_string(),
        None => "nobody".to_string(),
    }
}

fn presence(has: &bool) -> &'static str {
    if *has {
        "set"
    } else {
        "unset"
    }
}

impl Rejection {
    pub(crate) fn unknown_kiosk(id: &KioskId) -> Self {
        Rejection::UnknownEntity {
            kind: EntityKind::Kiosk,
            id: id.to_string(),
        }
    }

    pub(crate) fn unknown_waiter(id: &WaiterId) -> Self {
        Rejection::UnknownEntity {
            kind: EntityKind::Waiter,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::UnknownEntity { .. } => "unknown_entity",
            Rejection::IllegalStateTransition { .. } => "illegal_state_transition",
            Rejection::ConflictingAssignment { .. } => "conflicting_assignment",
            Rejection::MismatchedWaiter { .. } => "mismatched_waiter",
        }
    }

    pub fn is_unknown_entity(&self) -> bool {
        matches!(self, Rejection::UnknownEntity { .. })
    }
}

/// A broken cross-registry invariant. Never produced by a legal sequence of
/// coordinator calls; surfaced by [`crate::Coordinator::check_invariants`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{kiosk} is {status} but assigned_waiter is {}", presence(.has_waiter))]
    WaiterStatusMismatch {
        kiosk: KioskId,
        status: KioskStatus,
        has_waiter: bool,
    },

    #[error("{kiosk} is {status} without started_at")]
    MissingStartedAt { kiosk: KioskId, status: KioskStatus },

    #[error("{waiter} attends both {first} and {second}")]
    DoubleAssignment {
        waiter: WaiterId,
        first: KioskId,
        second: KioskId,
    },

    #[error("{waiter} has a pending notification that does not match an attended kiosk")]
    DanglingNotification { waiter: WaiterId },
}
