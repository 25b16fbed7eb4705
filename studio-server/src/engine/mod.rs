//! Diffusion engine abstraction layer.
//!
//! This module defines the `DiffusionEngine` trait that abstracts text-to-image
//! backends (the in-process procedural pipeline, a remote sidecar) behind a
//! common interface, and the `ModelRegistry` that owns the single shared
//! engine instance.

mod procedural;
mod registry;
mod scheduler;
mod sidecar;

pub use procedural::{ProceduralEngine, ProceduralLoader};
pub use registry::{ModelHandle, ModelRegistry};
pub use scheduler::{Scheduler, NUM_TRAIN_TIMESTEPS};
pub use sidecar::{SidecarEngine, SidecarLoader};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{EngineConfig, EngineKind, GenerationConfig};
use crate::error::{Error, Result};

/// Inputs of one inference call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub seed: u64,
    pub steps: u32,
}

/// Primary trait for diffusion engines.
///
/// An engine owns a mutable scheduler configuration. Callers set the step
/// count through [`DiffusionEngine::scheduler_mut`] immediately before
/// [`DiffusionEngine::generate`]; both must happen under the same exclusive
/// borrow, which [`ModelHandle`] enforces.
#[async_trait]
pub trait DiffusionEngine: Send + Sync {
    /// Unique identifier for this engine type (e.g., "procedural", "sidecar").
    fn engine_type(&self) -> &'static str;

    fn scheduler(&self) -> &Scheduler;

    fn scheduler_mut(&mut self) -> &mut Scheduler;

    /// Produce one PNG-encoded image. Runs to completion once started.
    async fn generate(&mut self, params: &GenerationParams) -> Result<Vec<u8>>;
}

/// Expensive one-time construction of an engine.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Name of the model being loaded, for logging.
    fn model_name(&self) -> &str;

    async fn load(&self) -> Result<Box<dyn DiffusionEngine>>;
}

/// Build the loader selected by `engine.kind`.
pub fn loader_from_config(
    engine: &EngineConfig,
    generation: &GenerationConfig,
) -> Result<Arc<dyn EngineLoader>> {
    let loader: Arc<dyn EngineLoader> = match engine.kind {
        EngineKind::Procedural => Arc::new(ProceduralLoader::new(
            &engine.model,
            generation.width,
            generation.height,
        )),
        EngineKind::Sidecar => {
            let url = engine.sidecar_url.as_deref().ok_or_else(|| {
                Error::Internal("engine.sidecar_url is not configured".to_string())
            })?;
            Arc::new(SidecarLoader::new(
                url,
                &engine.model,
                generation.width,
                generation.height,
                Duration::from_secs(engine.timeout_secs),
            ))
        }
    };
    Ok(loader)
}
