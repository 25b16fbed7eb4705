//! Remote diffusion engine backed by an OpenAI-compatible image server.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{DiffusionEngine, EngineLoader, GenerationParams, Scheduler};
use crate::error::{Error, Result};

// ============================================================================
// Sidecar API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ImageGenerationRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    size: String,
    n: u32,
    response_format: &'static str,
    num_inference_steps: u32,
    seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
}

// ============================================================================
// Loader
// ============================================================================

/// Loader for [`SidecarEngine`]. Loading means probing the sidecar's health.
pub struct SidecarLoader {
    base_url: String,
    model: String,
    width: u32,
    height: u32,
    timeout: Duration,
}

impl SidecarLoader {
    pub fn new(base_url: &str, model: &str, width: u32, height: u32, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            width,
            height,
            timeout,
        }
    }
}

#[async_trait]
impl EngineLoader for SidecarLoader {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<Box<dyn DiffusionEngine>> {
        let http_client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;

        let url = format!("{}/health", self.base_url);
        let response = http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("diffusion sidecar unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Inference(format!(
                "diffusion sidecar returned {} on health check",
                response.status()
            )));
        }

        tracing::debug!("Diffusion sidecar healthy at {}", self.base_url);

        Ok(Box::new(SidecarEngine {
            http_client,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            width: self.width,
            height: self.height,
            scheduler: Scheduler::new(),
        }))
    }
}

// ============================================================================
// DiffusionEngine implementation
// ============================================================================

/// Diffusion engine that delegates each generation to a remote sidecar.
///
/// The scheduler is held locally for step bookkeeping; the sidecar runs its
/// own with the same step count.
pub struct SidecarEngine {
    http_client: Client,
    base_url: String,
    model: String,
    width: u32,
    height: u32,
    scheduler: Scheduler,
}

#[async_trait]
impl DiffusionEngine for SidecarEngine {
    fn engine_type(&self) -> &'static str {
        "sidecar"
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    async fn generate(&mut self, params: &GenerationParams) -> Result<Vec<u8>> {
        let request = ImageGenerationRequest {
            prompt: &params.prompt,
            model: &self.model,
            size: format!("{}x{}", self.width, self.height),
            n: 1,
            response_format: "b64_json",
            num_inference_steps: self.scheduler.num_inference_steps() as u32,
            seed: params.seed,
            negative_prompt: params.negative_prompt.as_deref(),
        };

        let url = format!("{}/v1/images/generations", self.base_url);
        tracing::debug!("Sending generation request to sidecar: {} model={}", url, self.model);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!("{}: {}", status, body.trim())));
        }

        let body: ImageGenerationResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(e.to_string()))?;

        let encoded = body
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| Error::Inference("sidecar returned no image".to_string()))?;

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Inference(format!("invalid base64 image: {}", e)))?;

        match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => Ok(bytes),
            _ => Err(Error::Inference("sidecar image is not a PNG".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn params() -> GenerationParams {
        GenerationParams {
            prompt: "a cat".to_string(),
            negative_prompt: Some("blurry".to_string()),
            seed: 42,
            steps: 15,
        }
    }

    async fn healthy_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    }

    fn loader(server: &MockServer) -> SidecarLoader {
        SidecarLoader::new(
            &format!("{}/", server.uri()),
            "sd-test",
            64,
            64,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_base_url_normalization() {
        let loader = SidecarLoader::new("http://localhost:30000/", "m", 8, 8, Duration::from_secs(1));
        assert_eq!(loader.base_url, "http://localhost:30000");
    }

    #[tokio::test]
    async fn test_load_fails_when_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = loader(&server).load().await.err().unwrap();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[tokio::test]
    async fn test_generate_decodes_png() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_partial_json(json!({
                "prompt": "a cat",
                "negative_prompt": "blurry",
                "seed": 42,
                "num_inference_steps": 15,
                "size": "64x64"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "b64_json": STANDARD.encode(PNG_MAGIC) }]
            })))
            .mount(&server)
            .await;

        let mut engine = loader(&server).load().await.unwrap();
        engine.scheduler_mut().set_timesteps(15);
        let bytes = engine.generate(&params()).await.unwrap();
        assert_eq!(bytes, PNG_MAGIC);
    }

    #[tokio::test]
    async fn test_generate_rejects_non_png() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "b64_json": STANDARD.encode(b"GIF89a-not-a-png") }]
            })))
            .mount(&server)
            .await;

        let mut engine = loader(&server).load().await.unwrap();
        engine.scheduler_mut().set_timesteps(15);
        let err = engine.generate(&params()).await.unwrap_err();
        assert_eq!(err.message(), "sidecar image is not a PNG");
    }

    #[tokio::test]
    async fn test_generate_passes_server_error_through() {
        let server = healthy_server().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory\r\n"))
            .mount(&server)
            .await;

        let mut engine = loader(&server).load().await.unwrap();
        engine.scheduler_mut().set_timesteps(15);
        let err = engine.generate(&params()).await.unwrap_err();
        assert!(err.message().ends_with(": CUDA out of memory"));
    }
}
