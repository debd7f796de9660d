//! Health Check API
//!
//! Provides health check endpoint for monitoring and load balancers.

use crate::console::ConsoleState;
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status
    pub status: &'static str,
    /// Application version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Active console sessions
    pub sessions: usize,
    /// Cached backend responses
    pub cached_responses: u64,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// Health check handler
///
/// Returns 200 OK with health information.
pub async fn health_check(State(state): State<ConsoleState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_secs(),
        sessions: state.sessions.len(),
        cached_responses: state.cache.stats().entries,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Liveness check (minimal response)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness check
///
/// Ready only while the backend API answers.
pub async fn readiness(State(state): State<ConsoleState>) -> StatusCode {
    match state.api.ping().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "Backend unreachable, not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Create health check router
pub fn health_router() -> Router<ConsoleState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
}
