//! Playback engine contract
//!
//! The engine owns the playback clock, track selection and the renderers'
//! enabled status. It runs on its own context and reports back through
//! listener channels; it never blocks on a consumer.

#[cfg(feature = "sim")]
pub mod sim;

use crate::{
    error::{DrmReason, EngineResult},
    renderer::{Renderer, RendererId, RendererMessage},
    source::MediaSource,
    types::PlaybackState,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Channel end an engine reports to
pub type EventSink = mpsc::UnboundedSender<EngineEvent>;

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A message for one renderer, delivered on the engine context
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMessage {
    pub target: RendererId,
    pub message: RendererMessage,
}

impl EngineMessage {
    pub fn new(target: RendererId, message: RendererMessage) -> Self {
        Self { target, message }
    }

    /// The same message addressed to each target
    pub fn broadcast(targets: &[RendererId], message: RendererMessage) -> Vec<Self> {
        targets
            .iter()
            .map(|target| Self::new(*target, message.clone()))
            .collect()
    }
}

/// Engine failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Loading or parsing the media source failed
    Source,
    /// A renderer failed
    Renderer,
    /// DRM session failure
    Drm(DrmReason),
    /// Anything else
    Unexpected,
}

/// Failure reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Events raised by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged {
        play_when_ready: bool,
        state: PlaybackState,
    },
    /// The most recently issued seek has been applied
    SeekProcessed,
    LoadingChanged(bool),
    Error {
        failure: EngineFailure,
        /// Playback stopped because of this failure
        fatal: bool,
    },
}

/// Engine driving a fixed list of renderers
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Start loading a media source
    async fn prepare(&self, source: Box<dyn MediaSource>) -> EngineResult<()>;

    async fn set_play_when_ready(&self, play_when_ready: bool) -> EngineResult<()>;

    /// Issue a seek; completion is reported with `EngineEvent::SeekProcessed`
    async fn seek_to(&self, position_ms: i64) -> EngineResult<()>;

    async fn stop(&self) -> EngineResult<()>;

    /// Release renderers and the engine context; idempotent
    async fn release(&self);

    /// Queue messages; returns once they are accepted
    async fn send_messages(&self, messages: Vec<EngineMessage>) -> EngineResult<()>;

    /// Deliver messages and wait until every target renderer has handled them
    async fn blocking_send_messages(&self, messages: Vec<EngineMessage>) -> EngineResult<()>;

    fn add_listener(&self, sink: EventSink) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    fn playback_state(&self) -> PlaybackState;

    fn play_when_ready(&self) -> bool;

    /// Current position; `None` while no timeline exists
    fn position_ms(&self) -> EngineResult<Option<i64>>;

    /// Media duration; `None` while unknown
    fn duration_ms(&self) -> EngineResult<Option<i64>>;

    fn buffered_percentage(&self) -> EngineResult<u8>;
}

/// Creates an engine around an ordered renderer list
pub trait EngineFactory: Send + Sync {
    fn create(&self, renderers: Vec<Box<dyn Renderer>>) -> EngineResult<Arc<dyn PlaybackEngine>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamRoute;

    #[test]
    fn test_broadcast_addresses_each_target() {
        let targets = [RendererId(1), RendererId(4)];
        let messages =
            EngineMessage::broadcast(&targets, RendererMessage::SetStreamRoute(StreamRoute::Music));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].target, RendererId(1));
        assert_eq!(messages[1].target, RendererId(4));
        assert!(EngineMessage::broadcast(&[], RendererMessage::SetVolume(1.0)).is_empty());
    }

    #[test]
    fn test_failure_display() {
        let failure = EngineFailure {
            kind: FailureKind::Drm(DrmReason::NotSupported),
            message: "no widevine".to_string(),
        };
        assert!(failure.to_string().contains("no widevine"));
    }
}
