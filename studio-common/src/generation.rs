//! Image generation request and response types.

use serde::{Deserialize, Serialize};

/// Prefix of the inline image payload returned to clients.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Body of `POST /api/generate`.
///
/// Seed and step count are deliberately absent: they are fixed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

/// Query string of `GET /api/generate-stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateStreamQuery {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

impl From<GenerateStreamQuery> for GenerateRequest {
    fn from(query: GenerateStreamQuery) -> Self {
        Self {
            prompt: query.prompt,
            negative_prompt: query.negative_prompt,
        }
    }
}

/// Successful response of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Always `"success"`.
    pub status: String,
    pub prompt: String,
    /// `data:image/png;base64,...`
    pub image: String,
    /// Retrieval path, e.g. `/images/<id>.png`.
    pub image_url: String,
}

impl GenerateResponse {
    pub fn success(prompt: String, image: String, image_url: String) -> Self {
        Self {
            status: "success".to_string(),
            prompt,
            image,
            image_url,
        }
    }

    /// Base64 part of the inline image, without the data URL prefix.
    pub fn image_base64(&self) -> Option<&str> {
        self.image.strip_prefix(PNG_DATA_URL_PREFIX)
    }
}

/// Lifecycle of the shared inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Uninitialized,
    Loading,
    Ready,
}

impl ModelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelStatus::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_negative_prompt_optional() {
        let request: GenerateRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        assert_eq!(request.prompt, "a cat");
        assert!(request.negative_prompt.is_none());

        let request: GenerateRequest =
            serde_json::from_str(r#"{"prompt":"a cat","negative_prompt":"blurry"}"#).unwrap();
        assert_eq!(request.negative_prompt.as_deref(), Some("blurry"));
    }

    #[test]
    fn test_request_ignores_seed_field() {
        // Unknown fields are ignored, the server-side seed stays in charge.
        let request: GenerateRequest =
            serde_json::from_str(r#"{"prompt":"a cat","seed":7}"#).unwrap();
        assert_eq!(request.prompt, "a cat");
    }

    #[test]
    fn test_image_base64_strips_prefix() {
        let response = GenerateResponse::success(
            "a cat".to_string(),
            format!("{}AAAA", PNG_DATA_URL_PREFIX),
            "/images/x.png".to_string(),
        );
        assert_eq!(response.status, "success");
        assert_eq!(response.image_base64(), Some("AAAA"));
    }

    #[test]
    fn test_model_status_serialization() {
        let json = serde_json::to_string(&ModelStatus::Uninitialized).unwrap();
        assert_eq!(json, r#""uninitialized""#);
        assert!(ModelStatus::Ready.is_ready());
        assert!(!ModelStatus::Loading.is_ready());
    }
}
