//! Shared runtime state for kh-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The whole hall (both
//! registries) sits behind ONE lock: every mutation takes the write side for
//! the full operation, every read or report snapshot takes the read side.
//! A per-kiosk lock would not do, because a claim scans all kiosks.

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use kh_config::HallConfig;
use kh_core::{Coordinator, HallSnapshot, KioskId, Outcome, Rejection, Transition, WaiterId};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::error;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Transition(Transition),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
///
/// State lives for the process only: a restart boots every kiosk `Free` and
/// every notification cleared.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Kiosk + notification registries, mediated by the coordinator.
    pub hall: Arc<RwLock<Coordinator>>,
    /// Zone used for report wall-clock times.
    pub report_tz: Tz,
    /// Hash of the effective config, if loaded from files.
    pub config_hash: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Default fleet (`kiosko-1..4`, `mesero1..3`), Bogota report zone.
    pub fn new() -> Self {
        Self::with_parts(&HallConfig::default(), chrono_tz::America::Bogota, None)
    }

    /// Build from a validated config.
    pub fn from_config(cfg: &HallConfig, config_hash: Option<String>) -> anyhow::Result<Self> {
        let tz = cfg.timezone()?;
        Ok(Self::with_parts(cfg, tz, config_hash))
    }

    fn with_parts(cfg: &HallConfig, report_tz: Tz, config_hash: Option<String>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let hall = Coordinator::new(
            cfg.fleet.kiosks.iter().map(KioskId::new),
            cfg.fleet.waiters.iter().map(WaiterId::new),
        );

        Self {
            bus,
            build: BuildInfo {
                service: "kh-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            hall: Arc::new(RwLock::new(hall)),
            report_tz,
            config_hash,
        }
    }

    /// Run one coordinator operation inside the write lock.
    ///
    /// On success the transition is broadcast after the lock is released.
    pub async fn apply<F>(&self, op: F) -> Result<Outcome, Rejection>
    where
        F: FnOnce(&mut Coordinator) -> Result<Outcome, Rejection>,
    {
        let result = {
            let mut hall = self.hall.write().await;
            let result = op(&mut *hall);
            if cfg!(debug_assertions) {
                if let Err(v) = hall.check_invariants() {
                    error!(violation = %v, "hall invariant broken");
                }
            }
            result
        };

        if let Ok(out) = &result {
            let _ = self.bus.send(BusMsg::Transition(out.transition.clone()));
        }
        result
    }

    /// Consistent copy of the hall, taken under the read lock.
    pub async fn snapshot(&self) -> HallSnapshot {
        self.hall.read().await.snapshot()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
