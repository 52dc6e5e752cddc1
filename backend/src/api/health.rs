//! Health endpoint

use crate::api::utils::RouterState;
use crate::chat::BridgeStatus;
use axum::{extract::State, response::Json};
use serde::Serialize;

/// Liveness plus relay counters
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Relay counters
    #[serde(flatten)]
    pub bridge: BridgeStatus,
}

/// GET /api/health
pub async fn health_check(State(state): State<RouterState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        bridge: state.bridge.status().await,
    })
}
