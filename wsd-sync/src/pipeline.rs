//! Boundary to the media pipeline
//!
//! The adaptive-bitrate engine (segment fetching, manifest parsing, decode,
//! render) lives outside this crate. The controller only needs to read
//! latency/position and to write rate/position back, and the session needs
//! to hear about manifest, buffer and error events.

use reqwest::Url;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::Result;

/// Why a programmatic `play()` was refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayError {
    /// Host policy requires a user gesture before audio may start
    #[error("Autoplay blocked by host policy")]
    AutoplayBlocked,

    /// Any other rejection of the play request
    #[error("Play request rejected: {0}")]
    Rejected(String),
}

/// Playback surface driven by the latency controller
pub trait MediaPipeline {
    /// Distance from the live edge in seconds, or `None` when the surface
    /// cannot report it (e.g. native playback without pipeline introspection)
    fn current_latency_seconds(&self) -> Option<f64>;

    fn current_position_seconds(&self) -> f64;

    fn set_position_seconds(&mut self, position: f64);

    fn set_playback_rate(&mut self, rate: f64);

    /// Start playback; hosts may refuse without a user gesture
    fn play(&mut self) -> std::result::Result<(), PlayError>;

    /// Release the binding to the stream (stop loading, detach media)
    fn release(&mut self) {}
}

/// Events raised by a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Playlist parsed; playback can begin
    ManifestReady,
    /// Forward buffer changed
    BufferLevelChanged { seconds: f64 },
    /// Playback error; `fatal` errors end this pipeline
    Error { fatal: bool, details: String },
}

impl PipelineEvent {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineEvent::Error { fatal: true, .. })
    }
}

/// A pipeline event tagged with the attach it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineNotice {
    pub generation: u64,
    pub event: PipelineEvent,
}

/// Session-side end of the event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<PipelineNotice>,
}

/// Create the channel pipelines report events on
pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<PipelineNotice>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

impl EventSink {
    /// Handle for one attach; everything it emits carries `generation`
    pub fn for_generation(&self, generation: u64) -> PipelineEvents {
        PipelineEvents {
            generation,
            tx: self.tx.clone(),
        }
    }
}

/// Handle a pipeline uses to report its events (the `on(event, handler)` side)
#[derive(Debug, Clone)]
pub struct PipelineEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<PipelineNotice>,
}

impl PipelineEvents {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: PipelineEvent) {
        // Receiver gone means the session is shutting down
        let _ = self.tx.send(PipelineNotice {
            generation: self.generation,
            event,
        });
    }
}

/// Opens a pipeline for a stream source
pub trait PipelineFactory {
    type Pipeline: MediaPipeline;

    fn open(&mut self, source: &Url, events: PipelineEvents) -> Result<Self::Pipeline>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_carry_generation() {
        let (sink, mut rx) = event_channel();
        let events = sink.for_generation(7);

        events.emit(PipelineEvent::ManifestReady);
        events.emit(PipelineEvent::Error {
            fatal: true,
            details: "networkError".to_string(),
        });

        let first = rx.try_recv().unwrap();
        assert_eq!(first.generation, 7);
        assert_eq!(first.event, PipelineEvent::ManifestReady);

        let second = rx.try_recv().unwrap();
        assert!(second.event.is_fatal());
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = event_channel();
        drop(rx);
        sink.for_generation(1).emit(PipelineEvent::ManifestReady);
    }
}
