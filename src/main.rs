use std::net::SocketAddr;

use anyhow::Context;
use tenantgate_backend::{
    app::build_router,
    config::Config,
    state::AppState,
    worker::{start_background_workers, RATE_LIMIT_PURGE_INTERVAL},
};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    let addr = config.bind_addr;

    let state = AppState::initialize(config)
        .await
        .context("failed to connect to the database")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = start_background_workers(state.clone(), RATE_LIMIT_PURGE_INTERVAL, shutdown_rx);

    let make_service =
        build_router(state.clone()).into_make_service_with_connect_info::<SocketAddr>();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = worker.await {
        warn!(?err, "background worker ended abnormally");
    }
    state.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

/// `RUST_LOG` filtering (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
