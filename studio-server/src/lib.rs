//! Gesture Studio server - gesture echo and text-to-image generation.

pub mod api;
pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod feature;
pub mod generation;
pub mod logging;
pub mod state;

pub use artifact::{Artifact, ArtifactStore};
pub use config::Config;
pub use engine::{DiffusionEngine, EngineLoader, GenerationParams, ModelHandle, ModelRegistry};
pub use error::{Error, Result};
pub use feature::FeatureGate;
pub use generation::{GenerationRequest, GenerationResult, GenerationSettings, Generator};
pub use state::AppState;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::CorsConfig;

/// Build the full HTTP surface over `state`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let images = ServeDir::new(state.generator.artifacts().dir());
    let images_prefix = state.generator.artifacts().url_prefix().to_string();

    Router::new()
        .nest("/api", api::router())
        .route("/health", get(api::health::health))
        .route("/favicon.ico", get(api::health::favicon))
        .nest_service(&images_prefix, images)
        .layer(cors_layer(&state.config.cors))
        .layer(middleware::from_fn(logging::request_logger))
        .with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
