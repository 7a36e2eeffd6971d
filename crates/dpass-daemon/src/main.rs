//! dpass-daemon entry point.
//!
//! Thin on purpose: load config, set up tracing, boot the shared state,
//! wire middleware, serve. Handlers live in `routes.rs`; shared state and
//! background tasks in `state.rs`.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use dpass_config::{
    load_layered_yaml, report_unused_keys, DeskConfig, LoadedConfig, UnusedKeyPolicy,
};
use dpass_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (cfg, config_hash) = load_config()?;
    let shared = state::AppState::boot(&cfg, config_hash).await?;

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(15));
    state::spawn_view_forwarder(shared.clone());

    let app = routes::build_router(shared.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or(cfg.daemon_addr);
    info!(
        palace_gates = cfg.layout.palace_gates,
        torchlight_gates = cfg.layout.torchlight_gates,
        "dpass-daemon listening on http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server crashed")?;

    state::shutdown(&shared).await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Config files come from `DPASS_CONFIG` (comma-separated, merged in
/// order). Without it every setting takes its default.
fn load_config() -> anyhow::Result<(DeskConfig, Option<String>)> {
    let raw = std::env::var("DPASS_CONFIG").unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paths.is_empty() {
        info!("DPASS_CONFIG not set; using default configuration");
        return Ok((DeskConfig::default(), None));
    }

    let LoadedConfig {
        config_hash,
        config_json,
        ..
    } = load_layered_yaml(&paths).context("config load failed")?;

    let report = report_unused_keys(&config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &report.unused_leaf_pointers {
        warn!(key = %ptr, "unused config key");
    }

    let cfg = DeskConfig::from_config_json(&config_json)?;
    info!(config_hash = %config_hash, files = paths.len(), "config loaded");
    Ok((cfg, Some(config_hash)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("DPASS_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
