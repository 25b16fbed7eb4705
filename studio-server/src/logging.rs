use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// How a finished request is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    /// Probes and static assets, logged at DEBUG.
    Quiet,
    /// SSE response; the duration covers the time to first byte only.
    Stream,
    Normal,
}

fn classify(path: &str, response: &Response) -> RequestKind {
    let is_stream = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"));

    if is_stream {
        RequestKind::Stream
    } else if path == "/health" || path == "/favicon.ico" {
        RequestKind::Quiet
    } else {
        RequestKind::Normal
    }
}

/// Middleware that logs each HTTP request once it has a response.
///
/// Server errors go out at WARN, health probes and the favicon at DEBUG,
/// everything else at INFO.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();
    let kind = classify(&path, &response);

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            "HTTP request failed"
        );
        return response;
    }

    match kind {
        RequestKind::Quiet => {
            tracing::debug!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                "HTTP request"
            );
        }
        RequestKind::Stream => {
            tracing::info!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                "Event stream opened"
            );
        }
        RequestKind::Normal if status == StatusCode::FORBIDDEN => {
            tracing::info!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                "HTTP request refused"
            );
        }
        RequestKind::Normal => {
            tracing::info!(
                method = %method,
                path = %path,
                status = status.as_u16(),
                duration_ms = %duration_ms,
                "HTTP request"
            );
        }
    }

    response
}
