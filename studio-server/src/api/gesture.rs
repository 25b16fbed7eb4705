//! Gesture acknowledgement endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::routing::post;
use axum::{Json, Router};
use gesture_studio_common::RecognizeResponse;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::state::AppState;

/// Build the gesture router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/recognize", post(recognize))
}

/// POST /api/recognize - Echo a gesture back with a fixed confidence.
async fn recognize(body: Bytes) -> Result<Json<RecognizeResponse>> {
    let payload: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| Error::Internal(e.to_string()))?
    };

    let gesture = payload
        .get("gesture")
        .and_then(Value::as_str)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| Error::Validation("Gesture data is required".to_string()))?;

    Ok(Json(RecognizeResponse::acknowledge(gesture)))
}
