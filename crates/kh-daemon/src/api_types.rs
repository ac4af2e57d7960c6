//! Request and response types for all kh-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests.  No business logic lives here.

use kh_core::{Kiosk, KioskId, Rejection};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub config_hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Kiosk / waiter operations
// ---------------------------------------------------------------------------

/// Body of every accepted kiosk transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub msg: String,
    pub kiosk: KioskId,
    /// Kiosk state right after the transition.
    pub state: Kiosk,
}

/// Body of an accepted notification clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub msg: String,
    /// false = the waiter had nothing pending.
    pub had_pending: bool,
}

/// Body of a refused operation (404 / 409).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionResponse {
    pub error: String,
    /// "unknown_entity" | "illegal_state_transition" | "conflicting_assignment"
    /// | "mismatched_waiter"
    pub reason: String,
}

impl From<&Rejection> for RejectionResponse {
    fn from(r: &Rejection) -> Self {
        Self {
            error: r.to_string(),
            reason: r.kind().to_string(),
        }
    }
}

/// Body of an internal failure (500), e.g. report rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
