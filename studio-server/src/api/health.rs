//! Health check and favicon endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health - Service and model status.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "model": state.generator.registry().status(),
            "feature_enabled": state.feature_gate.is_enabled(),
        })),
    )
}

/// GET /favicon.ico
pub async fn favicon() -> Json<Value> {
    Json(json!({ "message": "ok" }))
}
