//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, process id, uptime, serving strategy, config source metadata
//! and cumulative request statistics. Under the process pool each worker
//! answers for itself, so `pid` tells the workers apart.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub git: String,
    pub pid: u32,
    pub uptime_seconds: u64,
    pub strategy: String,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub digest: String,
    pub upstream: String,
    pub timeout_ms: u64,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_in_flight: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let loaded = &state.loaded;
    let config = &loaded.config;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git: env!("SLOWRELAY_GIT_SHORT").to_string(),
        pid: std::process::id(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        strategy: config.strategy.describe(),
        config: ConfigHealth {
            source: loaded.source_name.clone(),
            digest: loaded.short_digest().to_string(),
            upstream: config.upstream.url.clone(),
            timeout_ms: config.upstream.timeout,
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_in_flight: state.stats.in_flight.load(Ordering::Relaxed),
        },
    })
}
