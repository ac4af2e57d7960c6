//! kh-report
//!
//! Read-only reporting over a [`HallSnapshot`]. Never touches live state:
//! callers take the snapshot under the coordinator lock and hand it here.
//!
//! Durations are wall-clock, same-day only: the time of day of both stamps
//! in the configured zone is compared, with no date component. A service
//! whose end time of day is earlier than its start (it crossed midnight) is
//! excluded and counted in `excluded_overnight`; it never yields negative or
//! wrapped seconds.

mod csv_export;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use kh_core::{HallSnapshot, KioskId, KioskStatus, WaiterId};
use serde::{Deserialize, Serialize};

pub use csv_export::{history_csv, summary_csv};

/// Full report document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallReport {
    pub generated_at: DateTime<Utc>,
    pub timezone: String,
    pub history: Vec<HistoryRow>,
    pub waiters: Vec<WaiterSummary>,
}

/// One row per kiosk, in kiosk id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub kiosk: KioskId,
    pub status: KioskStatus,
    pub waiter: Option<WaiterId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_action: Option<String>,
    pub last_service: Option<ServiceRow>,
}

/// The most recent finished engagement at a kiosk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRow {
    pub waiter: Option<WaiterId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    /// `None` when there is no start stamp or the service crossed midnight.
    pub duration_secs: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaiterSummary {
    pub waiter: WaiterId,
    /// Kiosks currently attended plus finished services, by this waiter.
    pub engagements: u32,
    pub mean_duration_secs: Option<f64>,
    pub excluded_overnight: u32,
}

/// Seconds between two stamps using time of day only, in `tz`.
///
/// `None` if `ended`'s time of day is before `started`'s.
pub fn same_day_duration_secs(started: DateTime<Utc>, ended: DateTime<Utc>, tz: &Tz) -> Option<i64> {
    let s = started.with_timezone(tz).time();
    let e = ended.with_timezone(tz).time();
    if e < s {
        return None;
    }
    Some((e - s).num_seconds())
}

#[derive(Default)]
struct Tally {
    engagements: u32,
    total_secs: i64,
    samples: u32,
    excluded_overnight: u32,
}

pub fn build_report(snapshot: &HallSnapshot, tz: Tz, generated_at: DateTime<Utc>) -> HallReport {
    let mut tallies: BTreeMap<WaiterId, Tally> = snapshot
        .notifications
        .keys()
        .map(|w| (w.clone(), Tally::default()))
        .collect();

    let mut history = Vec::with_capacity(snapshot.kiosks.len());
    for (id, k) in &snapshot.kiosks {
        if k.status == KioskStatus::Attending {
            if let Some(w) = &k.assigned_waiter {
                tallies.entry(w.clone()).or_default().engagements += 1;
            }
        }

        let last_service = k.last_service.as_ref().map(|svc| {
            let duration_secs = svc
                .started_at
                .and_then(|s| same_day_duration_secs(s, svc.ended_at, &tz));
            if let Some(w) = &svc.waiter {
                let t = tallies.entry(w.clone()).or_default();
                t.engagements += 1;
                match (svc.started_at, duration_secs) {
                    (Some(_), Some(d)) => {
                        t.total_secs += d;
                        t.samples += 1;
                    }
                    (Some(_), None) => t.excluded_overnight += 1,
                    (None, _) => {}
                }
            }
            ServiceRow {
                waiter: svc.waiter.clone(),
                started_at: svc.started_at,
                ended_at: svc.ended_at,
                duration_secs,
            }
        });

        history.push(HistoryRow {
            kiosk: id.clone(),
            status: k.status,
            waiter: k.assigned_waiter.clone(),
            started_at: k.started_at,
            ended_at: k.ended_at,
            last_action: k.last_action.as_ref().map(|a| a.to_string()),
            last_service,
        });
    }

    let waiters = tallies
        .into_iter()
        .map(|(waiter, t)| WaiterSummary {
            waiter,
            engagements: t.engagements,
            mean_duration_secs: (t.samples > 0).then(|| t.total_secs as f64 / f64::from(t.samples)),
            excluded_overnight: t.excluded_overnight,
        })
        .collect();

    HallReport {
        generated_at,
        timezone: tz.name().to_string(),
        history,
        waiters,
    }
}

/// File name stem for an export, e.g. `reporte_kioskos_20260504_131200`.
pub fn report_file_stem(generated_at: DateTime<Utc>, tz: &Tz) -> String {
    format!(
        "reporte_kioskos_{}",
        generated_at.with_timezone(tz).format("%Y%m%d_%H%M%S")
    )
}
