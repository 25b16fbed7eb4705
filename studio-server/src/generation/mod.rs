//! Generation request lifecycle.
//!
//! [`Generator::generate`] is the one-shot path: acquire the engine, run
//! inference, persist the artifact. [`Generator::stream`] runs the same work
//! while emitting ordered [`StreamEvent`](gesture_studio_common::StreamEvent)s.

mod stream;

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use gesture_studio_common::PNG_DATA_URL_PREFIX;

use crate::artifact::{Artifact, ArtifactStore};
use crate::config::GenerationConfig;
use crate::engine::{GenerationParams, ModelHandle, ModelRegistry};
use crate::error::{Error, Result};

/// Server-side generation constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    pub seed: u64,
    pub steps: u32,
    /// Pause between simulated progress events.
    pub progress_interval: Duration,
}

impl From<&GenerationConfig> for GenerationSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            seed: config.seed,
            steps: config.steps,
            progress_interval: config.progress_interval(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl GenerationSettings {
    /// Build a request with the fixed seed and step count.
    pub fn request(
        &self,
        prompt: impl Into<String>,
        negative_prompt: Option<String>,
    ) -> Result<GenerationRequest> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt is required".to_string()));
        }
        Ok(GenerationRequest {
            prompt,
            negative_prompt: negative_prompt.filter(|n| !n.trim().is_empty()),
            seed: self.seed,
            steps: self.steps,
        })
    }
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub seed: u64,
    pub steps: u32,
}

impl GenerationRequest {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            seed: self.seed,
            steps: self.steps,
        }
    }
}

/// Outcome of a generation: the image and where it was persisted.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub image: Vec<u8>,
    pub artifact: Artifact,
}

impl GenerationResult {
    /// `data:image/png;base64,...`
    pub fn data_url(&self) -> String {
        format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(&self.image))
    }
}

/// Orchestrates engine access and artifact persistence for both delivery modes.
#[derive(Clone)]
pub struct Generator {
    registry: Arc<ModelRegistry>,
    artifacts: Arc<ArtifactStore>,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        artifacts: Arc<ArtifactStore>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            registry,
            artifacts,
            settings,
        }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// One-shot generation.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let handle = self.registry.acquire().await?;
        self.run(&handle, request).await
    }

    /// Inference plus persistence on an already acquired handle.
    async fn run(&self, handle: &ModelHandle, request: &GenerationRequest) -> Result<GenerationResult> {
        let start = Instant::now();
        tracing::info!(
            engine = handle.engine_type(),
            steps = request.steps,
            prompt_len = request.prompt.len(),
            "Generation started"
        );

        let image = handle.generate(&request.params()).await.map_err(|e| {
            tracing::warn!("Generation failed: {}", e);
            e
        })?;
        let artifact = self.artifacts.save(&image).await?;

        tracing::info!(
            id = %artifact.id,
            duration_ms = %start.elapsed().as_millis(),
            "Generation finished"
        );

        Ok(GenerationResult { image, artifact })
    }
}
