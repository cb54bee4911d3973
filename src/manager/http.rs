//! Admin HTTP API for the manager
//!
//! Read-only: health probes, the current node/range table, and Prometheus
//! counters. Client traffic never goes through here.

use crate::manager::Manager;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<Manager>,
}

#[derive(Debug, Serialize)]
struct NodeStatus {
    id: u64,
    addr: String,
    range_start: i32,
    range_end: i32,
    joined_at: String,
}

pub fn create_router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/admin/status", get(admin_status))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Ready when at least one storage node is registered
async fn health(State(state): State<AdminState>) -> impl IntoResponse {
    let nodes = state.manager.node_count().await;
    let status = if nodes > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        axum::Json(json!({
            "status": if nodes > 0 { "healthy" } else { "no storage" },
            "nodes": nodes,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn health_live() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(json!({
            "alive": true,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().timestamp(),
        })),
    )
}

async fn admin_status(State(state): State<AdminState>) -> impl IntoResponse {
    let nodes: Vec<NodeStatus> = {
        let registry = state.manager.registry.read().await;
        registry
            .records()
            .map(|record| NodeStatus {
                id: record.id(),
                addr: record.addr().to_string(),
                range_start: record.range.start,
                range_end: record.range.end,
                joined_at: record.joined_at.to_rfc3339(),
            })
            .collect()
    };

    axum::Json(json!({
        "nb_nodes": nodes.len(),
        "nodes": nodes,
        "wal_path": state.manager.wal().path().display().to_string(),
        "started_at": state.manager.started_at().to_rfc3339(),
    }))
}

async fn metrics(State(state): State<AdminState>) -> impl IntoResponse {
    let nodes = state.manager.node_count().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.manager.metrics().to_prometheus(nodes),
    )
}
