//! HTPC Agent - Windows host agent for remote HTPC control
//!
//! Runs on the monitored PC and exposes the fixed command catalogue over
//! HTTP on port 8086: navigation and media keys, Windows shortcuts, app and
//! URL launching, power transitions and volume control. Hardware telemetry
//! is served separately by the hardware monitor on its own port; this
//! process only executes commands and reports its own liveness.

mod catalogue;
mod executor;
mod http;
mod os;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::info;

use crate::catalogue::Catalogue;
use crate::executor::CommandExecutor;
use crate::http::{AppState, COMMAND_PORT};
use crate::os::NativeOs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    info!("HTPC Agent v{} starting...", env!("CARGO_PKG_VERSION"));

    let catalogue = Catalogue::new();
    info!(
        "Catalogue loaded: {} static entries + 4 parametrized families",
        catalogue.len()
    );

    let executor = Arc::new(CommandExecutor::new(catalogue, Arc::new(NativeOs)));
    let state = AppState {
        executor,
        started_at: Instant::now(),
    };

    let app = http::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], COMMAND_PORT));

    // a busy command port is fatal: better to abort loudly than run a
    // half-initialized agent
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind command port {addr}"))?;

    info!("Agent listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
