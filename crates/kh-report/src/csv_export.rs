//! CSV rendering of a [`HallReport`].
//!
//! Stamps are written as local `HH:MM:SS` in the report's zone, matching
//! what the hall staff see on the wall clock.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::HallReport;

#[derive(Serialize)]
struct HistoryCsvRow<'a> {
    kiosk: &'a str,
    status: &'static str,
    waiter: Option<&'a str>,
    started_at: Option<String>,
    ended_at: Option<String>,
    last_action: Option<&'a str>,
    last_service_waiter: Option<&'a str>,
    last_service_secs: Option<i64>,
}

#[derive(Serialize)]
struct SummaryCsvRow<'a> {
    waiter: &'a str,
    engagements: u32,
    mean_duration_secs: Option<String>,
    excluded_overnight: u32,
}

fn local_hms(ts: Option<DateTime<Utc>>, tz: &Tz) -> Option<String> {
    ts.map(|t| t.with_timezone(tz).format("%H:%M:%S").to_string())
}

fn report_tz(report: &HallReport) -> Result<Tz> {
    report
        .timezone
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("report carries unknown timezone {}: {e}", report.timezone))
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr.into_inner().context("flush csv writer failed")?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

/// One line per kiosk.
pub fn history_csv(report: &HallReport) -> Result<String> {
    let tz = report_tz(report)?;
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for row in &report.history {
        let svc = row.last_service.as_ref();
        wtr.serialize(HistoryCsvRow {
            kiosk: row.kiosk.as_str(),
            status: row.status.as_str(),
            waiter: row.waiter.as_ref().map(|w| w.as_str()),
            started_at: local_hms(row.started_at, &tz),
            ended_at: local_hms(row.ended_at, &tz),
            last_action: row.last_action.as_deref(),
            last_service_waiter: svc.and_then(|s| s.waiter.as_ref()).map(|w| w.as_str()),
            last_service_secs: svc.and_then(|s| s.duration_secs),
        })
        .context("serialize history row failed")?;
    }
    finish(wtr)
}

/// One line per waiter.
pub fn summary_csv(report: &HallReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for s in &report.waiters {
        wtr.serialize(SummaryCsvRow {
            waiter: s.waiter.as_str(),
            engagements: s.engagements,
            mean_duration_secs: s.mean_duration_secs.map(|m| format!("{m:.1}")),
            excluded_overnight: s.excluded_overnight,
        })
        .context("serialize summary row failed")?;
    }
    finish(wtr)
}
