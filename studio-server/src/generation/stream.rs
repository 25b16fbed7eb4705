//! Incremental delivery of a generation as named events.

use gesture_studio_common::{
    progress_percent, StreamEvent, STATUS_LOADING, STATUS_READY, STATUS_STARTING,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{GenerationRequest, Generator};
use crate::error::Result;

/// Events buffered ahead of a slow client.
const EVENT_BUFFER: usize = 32;

/// Sending half of the event stream. Sends after the client has gone are
/// dropped; the generation itself carries on.
struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    async fn send(&self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::debug!("Stream client disconnected, event dropped");
        }
    }
}

impl Generator {
    /// Run a generation on a background task and return its event stream.
    ///
    /// The task is not tied to the stream: if the client disconnects the
    /// generation still runs to completion and its artifact is persisted.
    pub fn stream(&self, request: GenerationRequest) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let generator = self.clone();

        tokio::spawn(async move {
            let sink = EventSink { tx };
            if let Err(e) = generator.drive(&request, &sink).await {
                tracing::warn!("Streaming generation failed: {}", e);
                sink.send(StreamEvent::Error(e.message().to_string())).await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn drive(&self, request: &GenerationRequest, sink: &EventSink) -> Result<()> {
        sink.send(StreamEvent::Status(STATUS_LOADING.to_string())).await;
        let handle = self.registry.acquire().await?;
        sink.send(StreamEvent::Status(STATUS_READY.to_string())).await;

        let timesteps = handle.plan_timesteps(request.steps);
        sink.send(StreamEvent::Status(STATUS_STARTING.to_string())).await;

        // Simulated progress: paced by a fixed delay, not by the engine.
        let interval = self.settings.progress_interval;
        for (i, _timestep) in timesteps.iter().enumerate() {
            sink.send(StreamEvent::Progress(progress_percent(i, timesteps.len())))
                .await;
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }

        let result = self.run(&handle, request).await?;

        sink.send(StreamEvent::Complete).await;
        sink.send(StreamEvent::Image(result.data_url())).await;
        sink.send(StreamEvent::ImageUrl(result.artifact.url)).await;
        Ok(())
    }
}
