//! HTTP API.

pub mod generate;
pub mod gesture;
pub mod health;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(gesture::router())
        .merge(generate::router())
}
