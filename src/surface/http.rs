//! HTTP surface: liveness, readiness, and a JSON metrics dump.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::info;

use super::registry::AgentRegistry;
use crate::error::Result;

pub fn router(registry: Arc<AgentRegistry>) -> Router {
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(registry)
}

/// Binds the listener and serves until the process exits.
pub async fn serve(registry: Arc<AgentRegistry>, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Health surface listening");
    axum::serve(listener, router(registry)).await?;
    Ok(())
}

async fn live(State(registry): State<Arc<AgentRegistry>>) -> impl IntoResponse {
    let status = if registry.liveness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(serde_json::json!({ "status": "alive" })))
}

async fn ready(State(registry): State<Arc<AgentRegistry>>) -> impl IntoResponse {
    if registry.readiness() {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready" })),
        )
    }
}

async fn metrics(State(registry): State<Arc<AgentRegistry>>) -> impl IntoResponse {
    Json(registry.metrics())
}
