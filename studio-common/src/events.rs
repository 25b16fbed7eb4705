//! Named events of the `/api/generate-stream` Server-Sent-Events protocol.
//!
//! A successful stream is three `status` events, one `progress` event per
//! scheduled step, then `complete`, `image` and `image_url`. A failed stream
//! ends with a single `error` event. Nothing follows either terminal group.

/// Announced before the engine is acquired.
pub const STATUS_LOADING: &str = "Loading Stable Diffusion model...";
/// Announced once the engine handle is available.
pub const STATUS_READY: &str = "Model loaded successfully";
/// Announced right before generation begins.
pub const STATUS_STARTING: &str = "Starting image generation...";

const COMPLETE_MESSAGE: &str = "Image generation complete!";

/// One event of the generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Status(String),
    /// Percentage complete, `1..=100`.
    Progress(u8),
    Complete,
    /// `data:image/png;base64,...`
    Image(String),
    ImageUrl(String),
    Error(String),
}

impl StreamEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Status(_) => "status",
            StreamEvent::Progress(_) => "progress",
            StreamEvent::Complete => "complete",
            StreamEvent::Image(_) => "image",
            StreamEvent::ImageUrl(_) => "image_url",
            StreamEvent::Error(_) => "error",
        }
    }

    /// SSE data payload, always a single line.
    pub fn data(&self) -> String {
        match self {
            StreamEvent::Status(message) => single_line(message),
            StreamEvent::Progress(percent) => format!("{}% complete", percent),
            StreamEvent::Complete => COMPLETE_MESSAGE.to_string(),
            StreamEvent::Image(data_url) => data_url.clone(),
            StreamEvent::ImageUrl(url) => single_line(url),
            StreamEvent::Error(message) => format!("Error: {}", single_line(message)),
        }
    }

    /// Whether this event ends the stream. `image_url` closes a successful
    /// stream, `error` closes a failed one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::ImageUrl(_) | StreamEvent::Error(_))
    }

    /// Rebuild an event from its wire form. Returns `None` for unknown names
    /// or malformed payloads.
    pub fn parse(name: &str, data: &str) -> Option<Self> {
        let event = match name {
            "status" => StreamEvent::Status(data.to_string()),
            "progress" => {
                let percent = data.strip_suffix("% complete")?.trim().parse().ok()?;
                StreamEvent::Progress(percent)
            }
            "complete" => StreamEvent::Complete,
            "image" => StreamEvent::Image(data.to_string()),
            "image_url" => StreamEvent::ImageUrl(data.to_string()),
            "error" => {
                StreamEvent::Error(data.strip_prefix("Error: ").unwrap_or(data).to_string())
            }
            _ => return None,
        };
        Some(event)
    }
}

/// Fold line breaks into spaces. SSE data fields cannot carry `\r`, and an
/// `\n` would split one message across several `data:` lines.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Percentage reported after step `index` (zero-based) of `total`.
///
/// `round((index + 1) / total * 100)`, so the last step always reports 100.
pub fn progress_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = ((index + 1) as f64 / total as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_fifteen_steps() {
        let percents: Vec<u8> = (0..15).map(|i| progress_percent(i, 15)).collect();
        assert_eq!(percents[0], 7);
        assert_eq!(percents[1], 13);
        assert_eq!(*percents.last().unwrap(), 100);
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_progress_percent_single_step() {
        assert_eq!(progress_percent(0, 1), 100);
    }

    #[test]
    fn test_event_wire_format() {
        assert_eq!(StreamEvent::Progress(100).data(), "100% complete");
        assert_eq!(StreamEvent::Complete.data(), "Image generation complete!");
        assert_eq!(StreamEvent::Error("boom".into()).data(), "Error: boom");
        assert_eq!(StreamEvent::ImageUrl("/images/a.png".into()).name(), "image_url");
    }

    #[test]
    fn test_error_payload_is_single_line() {
        let event = StreamEvent::Error("500 Internal Server Error: CUDA out of memory\r\n".into());
        assert_eq!(event.data(), "Error: 500 Internal Server Error: CUDA out of memory");

        let event = StreamEvent::Error("upstream said:\r\nline one\nline two\r".into());
        assert_eq!(event.data(), "Error: upstream said: line one line two");

        let event = StreamEvent::Status("Loading\rmodel".into());
        assert_eq!(event.data(), "Loading model");
    }

    #[test]
    fn test_parse_progress_and_error() {
        assert_eq!(
            StreamEvent::parse("progress", "47% complete"),
            Some(StreamEvent::Progress(47))
        );
        assert_eq!(
            StreamEvent::parse("error", "Error: model missing"),
            Some(StreamEvent::Error("model missing".into()))
        );
        assert_eq!(StreamEvent::parse("progress", "soon"), None);
        assert_eq!(StreamEvent::parse("unknown", "x"), None);
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::Error("x".into()).is_terminal());
        assert!(StreamEvent::ImageUrl("/images/a.png".into()).is_terminal());
        assert!(!StreamEvent::Complete.is_terminal());
        assert!(!StreamEvent::Progress(100).is_terminal());
    }
}
