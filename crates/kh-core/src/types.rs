use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable kiosk identity (e.g. `kiosko-1`). Drawn from a fixed roster.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KioskId(pub String);

impl KioskId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KioskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable waiter identity (e.g. `mesero1`). Drawn from a fixed pool.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaiterId(pub String);

impl WaiterId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// KioskStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of one kiosk. Cyclic: `Free → Pending → Attending → Free`,
/// with `Pending` optional (a `Free` kiosk may be claimed directly).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskStatus {
    /// Idle; the rest state of the cycle.
    Free,
    /// A customer asked for help; no waiter yet.
    Pending,
    /// A waiter owns the kiosk.
    Attending,
}

impl KioskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KioskStatus::Free => "free",
            KioskStatus::Pending => "pending",
            KioskStatus::Attending => "attending",
        }
    }
}

impl fmt::Display for KioskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LastAction
// ---------------------------------------------------------------------------

/// Label of the most recent transition applied to a kiosk.
///
/// Only the latest label is kept; this is not a log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "waiter", rename_all = "snake_case")]
pub enum LastAction {
    RequestedHelp,
    ClaimedBy(WaiterId),
    ConfirmedBy(WaiterId),
    Finished,
    Cancelled,
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastAction::RequestedHelp => f.write_str("help requested"),
            LastAction::ClaimedBy(w) => write!(f, "claimed by {w}"),
            LastAction::ConfirmedBy(w) => write!(f, "confirmed by {w} with RFID"),
            LastAction::Finished => f.write_str("service finished"),
            LastAction::Cancelled => f.write_str("cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Kiosk
// ---------------------------------------------------------------------------

/// Summary of the most recent finished engagement at a kiosk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedService {
    /// `None` when the kiosk was finished straight from `Pending`.
    pub waiter: Option<WaiterId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

/// Authoritative state of one kiosk.
///
/// # Invariants (enforced by the coordinator)
/// - `assigned_waiter.is_some()` iff `status == Attending`.
/// - `started_at.is_some()` whenever `status != Free`.
/// - `ended_at` is only ever set by a finish, and is cleared when the next
///   cycle starts or on cancel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kiosk {
    pub status: KioskStatus,
    pub assigned_waiter: Option<WaiterId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_action: Option<LastAction>,
    pub last_service: Option<CompletedService>,
}

impl Kiosk {
    /// Boot state: `Free`, nothing recorded.
    pub fn free() -> Self {
        Self {
            status: KioskStatus::Free,
            assigned_waiter: None,
            started_at: None,
            ended_at: None,
            last_action: None,
            last_service: None,
        }
    }

    /// `true` if `waiter` currently owns this kiosk.
    pub fn is_attended_by(&self, waiter: &WaiterId) -> bool {
        self.status == KioskStatus::Attending && self.assigned_waiter.as_ref() == Some(waiter)
    }
}

impl Default for Kiosk {
    fn default() -> Self {
        Self::free()
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Pending-alert record for one waiter's handheld device.
///
/// `pending == true` implies `kiosk` names a kiosk this waiter is attending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub pending: bool,
    pub kiosk: Option<KioskId>,
    /// Time of the last raise; kept after a clear so devices can tell alerts apart.
    pub raised_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Availability / snapshot
// ---------------------------------------------------------------------------

/// Derived, never cached: computed from the kiosk map on every read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub busy: bool,
    /// The kiosk the waiter is attending, if busy.
    pub kiosk: Option<KioskId>,
}

/// Owned point-in-time copy of the whole hall.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallSnapshot {
    pub kiosks: BTreeMap<KioskId, Kiosk>,
    pub notifications: BTreeMap<WaiterId, Notification>,
    pub availability: BTreeMap<WaiterId, Availability>,
}
