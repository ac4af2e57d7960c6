//! Axum router and all HTTP handlers for kh-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  Handlers only translate between HTTP and the
//! coordinator: every business rule lives in `kh-core`.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use kh_core::{ClearOutcome, KioskId, Outcome, Rejection, WaiterId};
use kh_report::{build_report, history_csv, report_file_stem, summary_csv, HallReport};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{ClearResponse, ErrorResponse, HealthResponse, OperationResponse, RejectionResponse},
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/kiosks", get(kiosks))
        .route("/v1/kiosks/:kiosk/request", post(request_help))
        .route("/v1/kiosks/:kiosk/claim/:waiter", post(claim))
        .route("/v1/kiosks/:kiosk/confirm/:waiter", post(confirm))
        .route("/v1/kiosks/:kiosk/finish", post(finish))
        .route("/v1/kiosks/:kiosk/cancel", post(cancel))
        .route("/v1/waiters/availability", get(availability))
        .route("/v1/waiters/:waiter/notification", get(notification))
        .route("/v1/waiters/:waiter/notification/clear", post(clear_notification))
        .route("/v1/report", get(report))
        .route("/v1/report/history.csv", get(report_history_csv))
        .route("/v1/report/summary.csv", get(report_summary_csv))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Shared response helpers
// ---------------------------------------------------------------------------

/// Unknown ids → 404; every state rejection → 409.
fn rejected(op: &'static str, r: &Rejection) -> Response {
    let status = if r.is_unknown_entity() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::CONFLICT
    };
    warn!(op, reason = r.kind(), "{r}");
    (status, Json(RejectionResponse::from(r))).into_response()
}

fn operation_response(op: &'static str, result: Result<Outcome, Rejection>) -> Response {
    match result {
        Ok(out) => {
            info!(
                op,
                kiosk = %out.transition.kiosk,
                waiter = ?out.transition.waiter,
                from = %out.transition.from,
                to = %out.transition.to,
                "{}",
                out.message
            );
            (
                StatusCode::OK,
                Json(OperationResponse {
                    msg: out.message,
                    kiosk: out.transition.kiosk,
                    state: out.state,
                }),
            )
                .into_response()
        }
        Err(r) => rejected(op, &r),
    }
}

fn internal_error(err: anyhow::Error) -> Response {
    warn!(error = %format!("{err:#}"), "report rendering failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("{err:#}"),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Full kiosk map, keyed by kiosk id.
pub(crate) async fn kiosks(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let map = st.hall.read().await.kiosks().snapshot();
    (StatusCode::OK, Json(map))
}

/// Derived waiter availability, computed fresh on every call.
pub(crate) async fn availability(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let av = st.hall.read().await.availability();
    (StatusCode::OK, Json(av))
}

/// Polled by waiter handhelds.
pub(crate) async fn notification(
    State(st): State<Arc<AppState>>,
    Path(waiter): Path<String>,
) -> Response {
    let waiter = WaiterId::new(waiter);
    let found = st.hall.read().await.notifications().get(&waiter).cloned();
    match found {
        Some(n) => (StatusCode::OK, Json(n)).into_response(),
        None => rejected("notification", &Rejection::UnknownEntity {
            kind: kh_core::EntityKind::Waiter,
            id: waiter.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Kiosk transitions
// ---------------------------------------------------------------------------

pub(crate) async fn request_help(
    State(st): State<Arc<AppState>>,
    Path(kiosk): Path<String>,
) -> Response {
    let kiosk = KioskId::new(kiosk);
    let result = st.apply(|h| h.request_help(&kiosk, Utc::now())).await;
    operation_response("request_help", result)
}

pub(crate) async fn claim(
    State(st): State<Arc<AppState>>,
    Path((kiosk, waiter)): Path<(String, String)>,
) -> Response {
    let (kiosk, waiter) = (KioskId::new(kiosk), WaiterId::new(waiter));
    let result = st.apply(|h| h.claim(&kiosk, &waiter, Utc::now())).await;
    operation_response("claim", result)
}

/// RFID confirmation from the kiosk reader.
pub(crate) async fn confirm(
    State(st): State<Arc<AppState>>,
    Path((kiosk, waiter)): Path<(String, String)>,
) -> Response {
    let (kiosk, waiter) = (KioskId::new(kiosk), WaiterId::new(waiter));
    let result = st.apply(|h| h.confirm(&kiosk, &waiter)).await;
    operation_response("confirm", result)
}

pub(crate) async fn finish(
    State(st): State<Arc<AppState>>,
    Path(kiosk): Path<String>,
) -> Response {
    let kiosk = KioskId::new(kiosk);
    let result = st.apply(|h| h.finish(&kiosk, Utc::now())).await;
    operation_response("finish", result)
}

pub(crate) async fn cancel(
    State(st): State<Arc<AppState>>,
    Path(kiosk): Path<String>,
) -> Response {
    let kiosk = KioskId::new(kiosk);
    let result = st.apply(|h| h.cancel(&kiosk)).await;
    operation_response("cancel", result)
}

// ---------------------------------------------------------------------------
// POST /v1/waiters/:waiter/notification/clear
// ---------------------------------------------------------------------------

pub(crate) async fn clear_notification(
    State(st): State<Arc<AppState>>,
    Path(waiter): Path<String>,
) -> Response {
    let waiter = WaiterId::new(waiter);
    let result = st.hall.write().await.clear_notification(&waiter);

    match result {
        Ok(outcome) => {
            let had_pending = outcome == ClearOutcome::Cleared;
            info!(waiter = %waiter, had_pending, "notification/clear");
            let _ = st.bus.send(BusMsg::LogLine {
                level: "INFO".to_string(),
                msg: format!("notification for {waiter} cleared"),
            });
            (
                StatusCode::OK,
                Json(ClearResponse {
                    msg: format!("notification for {waiter} cleared"),
                    had_pending,
                }),
            )
                .into_response()
        }
        Err(r) => rejected("clear_notification", &r),
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

async fn current_report(st: &AppState) -> HallReport {
    let snap = st.snapshot().await;
    build_report(&snap, st.report_tz, Utc::now())
}

pub(crate) async fn report(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let report = current_report(&st).await;
    info!(kiosks = report.history.len(), "report");
    (StatusCode::OK, Json(report))
}

pub(crate) async fn report_history_csv(State(st): State<Arc<AppState>>) -> Response {
    let report = current_report(&st).await;
    match history_csv(&report) {
        Ok(body) => csv_attachment(&report, st.report_tz, "historial", body),
        Err(e) => internal_error(e),
    }
}

pub(crate) async fn report_summary_csv(State(st): State<Arc<AppState>>) -> Response {
    let report = current_report(&st).await;
    match summary_csv(&report) {
        Ok(body) => csv_attachment(&report, st.report_tz, "meseros", body),
        Err(e) => internal_error(e),
    }
}

fn csv_attachment(report: &HallReport, tz: chrono_tz::Tz, sheet: &str, body: String) -> Response {
    let file = format!("{}_{sheet}.csv", report_file_stem(report.generated_at, &tz));
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{file}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    info!(file = %file, "report export");
    (StatusCode::OK, headers, body).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Transition(_) => "transition",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
