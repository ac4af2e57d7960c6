//! kh-daemon entry point.
//!
//! Sets up tracing, loads the hall config, builds the shared state, wires
//! middleware, and starts the HTTP server.  Route handlers live in
//! `routes.rs`; shared state lives in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use kh_config::{load_layered_yaml, HallConfig};
use kh_daemon::{routes, state};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (cfg, config_hash) = load_config()?;
    info!(
        kiosks = cfg.fleet.kiosks.len(),
        waiters = cfg.fleet.waiters.len(),
        timezone = %cfg.report.timezone,
        config_hash = config_hash.as_deref().unwrap_or("defaults"),
        "hall config loaded"
    );

    let shared = Arc::new(state::AppState::from_config(&cfg, config_hash)?);
    warn!("hall state is in-memory only; a restart frees every kiosk");

    state::spawn_heartbeat(
        shared.bus.clone(),
        Duration::from_secs(cfg.daemon.heartbeat_secs),
    );

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&cfg.daemon.cors_allowed_origins));

    let addr = match bind_addr_from_env() {
        Some(a) => a,
        None => cfg.bind_addr()?,
    };
    info!("kh-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("kh-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `KH_CONFIG` = comma-separated YAML paths, base first.  Unset = built-in
/// defaults (no hash).
fn load_config() -> anyhow::Result<(HallConfig, Option<String>)> {
    let Ok(raw) = std::env::var("KH_CONFIG") else {
        return Ok((HallConfig::default(), None));
    };
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let loaded = load_layered_yaml(&paths).with_context(|| format!("load config from {raw}"))?;
    Ok((loaded.config, Some(loaded.config_hash)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("KH_DAEMON_ADDR").ok()?.parse().ok()
}

/// Empty origin list = any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(origins)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
