//! Speech Guardian Server - Headless Daemon
//!
//! Relays live audio from WebSocket clients to the AI worker through the
//! breaker-protected pooled client and streams back transcripts and stable
//! moderation events.
//!
//! - `GET /ws/audio?session_id=` audio session
//! - `GET /metrics` Prometheus exposition
//! - `GET /health`, `/healthz`, `/readyz`
//! - `/api/circuits/*` breaker inspection and control

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod cli;
mod router;
mod server_utils;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::Cli;
use guardian_core::relay::prometheus;
use guardian_types::GuardianConfig;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log filter '{}'", cli.log_level))?;
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = GuardianConfig::from_env().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.check().context("invalid configuration")?;

    info!("🚀 Speech Guardian v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        worker = %config.worker.base_url,
        breaker_enabled = config.breaker.enable_circuit_breaker,
        max_sockets = config.worker.max_sockets,
        "Relay configured"
    );

    prometheus::init_metrics().context("failed to install Prometheus recorder")?;

    let state = AppState::new(config)?;
    let probe_task = state.health_probe().start();

    let listener = server_utils::create_listener(&state.config().server).await?;
    let app = router::build_router(state.clone());

    info!("🌐 Server listening on http://{}", state.config().server.socket_addr());
    info!("🎙️ Audio sessions at ws://{}/ws/audio", state.config().server.socket_addr());

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    state.health_probe().shutdown();
    let _ = probe_task.await;
    info!("👋 Speech Guardian stopped");
    Ok(())
}
