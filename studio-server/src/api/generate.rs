//! Image generation endpoints, one-shot JSON and Server-Sent Events.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use gesture_studio_common::{GenerateRequest, GenerateResponse, GenerateStreamQuery, StreamEvent};

use crate::error::{Error, Result};
use crate::state::AppState;

const DISABLED_MESSAGE: &str =
    "Image generation feature is not enabled. Set FEATURE2_ENABLED=true to enable.";
const DISABLED_STREAM_MESSAGE: &str = "Image generation feature is not enabled.";

/// Build the generation router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate_image))
        .route("/generate-stream", get(generate_image_stream))
}

/// POST /api/generate - Generate one image and return it inline and by URL.
///
/// The feature gate is checked before the body is looked at, so a disabled
/// service answers 403 whatever was sent.
async fn generate_image(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response> {
    state.feature_gate.ensure_enabled(DISABLED_MESSAGE)?;
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let request = state
        .generator
        .settings()
        .request(body.prompt, body.negative_prompt)?;

    // Detached so a disconnecting client cannot abort the generation.
    let generator = state.generator.clone();
    let task_request = request.clone();
    let result = tokio::spawn(async move { generator.generate(&task_request).await })
        .await
        .map_err(|e| Error::Internal(format!("generation task failed: {}", e)))??;

    let image = result.data_url();
    Ok(Json(GenerateResponse::success(
        request.prompt,
        image,
        result.artifact.url,
    ))
    .into_response())
}

/// GET /api/generate-stream - Generate one image, reporting progress as SSE.
///
/// The feature gate and input validation fail as plain JSON before the stream
/// starts; later failures arrive as a single `error` event. The gate comes
/// first, ahead of query parsing.
async fn generate_image_stream(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<GenerateStreamQuery>, QueryRejection>,
) -> Result<Response> {
    state.feature_gate.ensure_enabled(DISABLED_STREAM_MESSAGE)?;
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let request: GenerateRequest = query.into();
    let request = state
        .generator
        .settings()
        .request(request.prompt, request.negative_prompt)?;

    Ok(event_stream(state.generator.stream(request)).into_response())
}

fn event_stream(
    events: impl Stream<Item = StreamEvent> + Send + 'static,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>> + Send + 'static> {
    let stream = events.map(|event| {
        Ok::<_, Infallible>(Event::default().event(event.name()).data(event.data()))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
