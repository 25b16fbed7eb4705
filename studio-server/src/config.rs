//! Configuration for the studio server.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the studio server.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. A single `"*"` allows any origin without credentials.
    #[serde(default = "default_cors_origins")]
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

/// Where generated images are persisted and under which URL path they are served.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub dir: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
            url_prefix: default_url_prefix(),
        }
    }
}

/// Fixed generation parameters.
///
/// Clients cannot override these, which keeps identical prompts reproducible.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Pause between simulated progress events on the stream.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            steps: default_steps(),
            progress_interval_ms: default_progress_interval(),
            width: default_dimension(),
            height: default_dimension(),
        }
    }
}

impl GenerationConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// In-process CPU pipeline.
    #[default]
    Procedural,
    /// Remote OpenAI-compatible image generation server.
    Sidecar,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the sidecar, required when `kind = "sidecar"`.
    #[serde(default)]
    pub sidecar_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            model: default_model(),
            sidecar_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Fallback for the `FEATURE2_ENABLED` toggle when it is unset.
    #[serde(default = "default_true")]
    pub image_generation: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            image_generation: default_true(),
        }
    }
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}
fn default_artifacts_dir() -> String {
    "generated_images".to_string()
}
fn default_url_prefix() -> String {
    "/images".to_string()
}
fn default_seed() -> u64 {
    42
}
fn default_steps() -> u32 {
    15
}
fn default_progress_interval() -> u64 {
    100
}
fn default_dimension() -> u32 {
    512
}
fn default_model() -> String {
    "runwayml/stable-diffusion-v1-5".to_string()
}
fn default_timeout() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (STUDIO__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .set_default("api.host", default_host())?
            .set_default("api.port", default_port() as i64)?
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("STUDIO")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.origins"),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the generation pipeline cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let steps = self.generation.steps;
        if !(1..=100).contains(&steps) {
            return Err(ConfigError::Message(format!(
                "generation.steps must be between 1 and 100, got {}",
                steps
            )));
        }
        if self.generation.width == 0 || self.generation.height == 0 {
            return Err(ConfigError::Message(
                "generation.width and generation.height must be > 0".to_string(),
            ));
        }
        if !self.artifacts.url_prefix.starts_with('/') || self.artifacts.url_prefix.len() < 2 {
            return Err(ConfigError::Message(format!(
                "artifacts.url_prefix must be an absolute path like /images, got {:?}",
                self.artifacts.url_prefix
            )));
        }
        if self.engine.kind == EngineKind::Sidecar && self.engine.sidecar_url.is_none() {
            return Err(ConfigError::Message(
                "engine.sidecar_url is required when engine.kind = \"sidecar\"".to_string(),
            ));
        }
        Ok(())
    }
}
