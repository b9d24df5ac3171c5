//! Health check handler

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{extract::State, Json};

use crate::models::{HealthResponse, HealthStatus};
use crate::AppState;

/// Server start time for uptime calculation
static START_TIME: OnceLock<Instant> = OnceLock::new();

pub(super) fn mark_started() {
    START_TIME.get_or_init(Instant::now);
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime = START_TIME.get_or_init(Instant::now).elapsed().as_secs();
    let engine_version = state.engine.version().await.ok();

    let status = if engine_version.is_some() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        engine_version,
    })
}
