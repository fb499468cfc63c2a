//! Liveness probe.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// `GET /health`
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
