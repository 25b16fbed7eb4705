//! Shared application state.

use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::engine::{EngineLoader, ModelRegistry};
use crate::error::Result;
use crate::feature::FeatureGate;
use crate::generation::{GenerationSettings, Generator};

/// Shared application state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub feature_gate: FeatureGate,
    pub generator: Generator,
}

impl AppState {
    pub fn new(config: Config, feature_gate: FeatureGate, generator: Generator) -> Self {
        Self {
            config,
            feature_gate,
            generator,
        }
    }

    /// Wire up the registry, artifact store and generator from `config`.
    pub async fn build(
        config: Config,
        feature_gate: FeatureGate,
        loader: Arc<dyn EngineLoader>,
    ) -> Result<Self> {
        let artifacts =
            ArtifactStore::open(&config.artifacts.dir, &config.artifacts.url_prefix).await?;
        let registry = Arc::new(ModelRegistry::new(loader));
        let generator = Generator::new(
            registry,
            Arc::new(artifacts),
            GenerationSettings::from(&config.generation),
        );
        Ok(Self::new(config, feature_gate, generator))
    }
}
