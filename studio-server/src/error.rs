//! Error types for the studio server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error kinds surfaced by request handlers.
///
/// Every error is terminal for its request. The JSON endpoints map them to
/// status codes here; the event stream renders them as a single `error` event.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    FeatureDisabled(String),

    #[error("Image generation failed: {0}")]
    Inference(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The underlying message, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Validation(m)
            | Error::FeatureDisabled(m)
            | Error::Inference(m)
            | Error::Internal(m) => m,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::FeatureDisabled(_) => StatusCode::FORBIDDEN,
            Error::Inference(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::FeatureDisabled(_) => "feature_disabled",
            Error::Inference(_) => "inference_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "detail": self.to_string(),
            "type": self.error_type(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
