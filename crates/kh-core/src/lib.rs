//! kh-core
//!
//! Kiosk / waiter assignment state machine for a walk-up service hall.
//!
//! Layout:
//! - [`KioskRegistry`] owns the authoritative per-kiosk state.
//! - [`NotificationRegistry`] owns the pending-alert flag per waiter.
//! - [`Coordinator`] is the only component that mutates either registry and
//!   enforces every cross-registry invariant.
//!
//! Pure deterministic logic. No IO, no wall-clock: every mutating call takes
//! `now` from the caller. Serialising concurrent callers is the embedding
//! layer's job (the daemon wraps a single `Coordinator` in one lock).

mod coordinator;
mod error;
mod kiosks;
mod notifications;
mod types;

pub use coordinator::{ClearOutcome, Coordinator, Outcome, Transition};
pub use error::{EntityKind, InvariantViolation, Rejection};
pub use kiosks::KioskRegistry;
pub use notifications::NotificationRegistry;
pub use types::*;
