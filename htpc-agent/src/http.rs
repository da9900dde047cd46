//! HTTP surface of the agent.
//!
//! Three endpoints on the fixed command port:
//! - `POST /command`  execute one catalogue token, JSON in/out
//! - `GET  /health`   liveness probe, 200 while the process is up
//! - `GET  /status`   human-readable control panel snapshot
//!
//! No authentication and no rate limiting: the agent is a local-network
//! trust boundary by contract, not an internet-facing service.

use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::executor::CommandExecutor;

pub const COMMAND_PORT: u16 = 8086;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<CommandExecutor>,
    pub started_at: Instant,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/command", post(run_command))
        .route("/health", get(health))
        .route("/status", get(status_page))
        .fallback(not_found)
        .with_state(state)
}

// POST /command
async fn run_command(
    State(app): State<AppState>,
    Json(req): Json<CommandRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match app.executor.execute(&req.command).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "success", "message": outcome.message })),
        ),
        Err(e) => {
            warn!("Command '{}' rejected: {}", req.command, e);
            let code = if e.is_caller_fault() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                code,
                Json(serde_json::json!({ "status": "error", "message": e.to_string() })),
            )
        }
    }
}

// GET /health (toujours accessible, répond tant que le process tourne)
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "agent_version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().timestamp(),
    }))
}

// GET /status (instantané lisible, jamais parsé par le contrôleur)
async fn status_page(State(app): State<AppState>) -> Html<String> {
    let uptime = app.started_at.elapsed().as_secs();
    let hours = uptime / 3600;
    let minutes = (uptime % 3600) / 60;
    let commands = app.executor.catalogue().len();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>HTPC Agent Control Panel</title>
    <meta charset="UTF-8">
</head>
<body>
    <h1>HTPC Agent Control Panel</h1>
    <p><strong>Status:</strong> RUNNING (v{version})</p>
    <ul>
        <li>Network port: {port} (HTTP)</li>
        <li>Uptime: {hours}h {minutes}m</li>
        <li>Catalogue entries: {commands} + 4 parametrized families</li>
    </ul>
    <h3>Available features</h3>
    <ul>
        <li>Windows shortcuts (Win+L, Win+D, ...)</li>
        <li>Navigation, media and function keys</li>
        <li>Volume management</li>
        <li>Power management</li>
        <li>Custom app and URL launching</li>
    </ul>
    <p>Configure your remote with this PC's IP address to start controlling your HTPC.</p>
</body>
</html>"#,
        version = env!("CARGO_PKG_VERSION"),
        port = COMMAND_PORT,
    ))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Endpoint not found" })),
    )
}
