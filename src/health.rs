//! HTTP health check and metrics endpoint

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{AppState, SessionPhase};

/// Routes served by the health server
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server for health checks and metrics
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let session = &state.session;
    let phase = session.phase();
    let status = if phase == SessionPhase::Failed {
        "unhealthy"
    } else {
        "healthy"
    };

    Json(serde_json::json!({
        "status": status,
        "component": "l3-recorder",
        "phase": phase,
        "symbol": session.symbol(),
        "events": session.event_count(),
        "elapsed_secs": session.elapsed().as_secs(),
        "duration_secs": session.duration_budget().as_secs(),
        "output_path": state.config.output_path.display().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
