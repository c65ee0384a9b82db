//! Player events
//!
//! Engine, renderer and surface-provider notifications all arrive on one
//! internal channel (`Dispatch`). The session's dispatcher folds them into
//! session state and republishes the interesting ones as typed
//! `PlayerEvent`s on a broadcast channel.

use crate::{
    engine::EngineEvent,
    error::ErrorReport,
    renderer::RendererEvent,
    surface::{SurfaceId, SurfaceLifecycle},
    types::*,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Events published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Session state changed
    StateChanged {
        from: SessionState,
        to: SessionState,
        play_when_ready: bool,
    },

    /// An error was recorded
    Error { report: ErrorReport },

    /// A seek finished and no newer seek is waiting
    SeekProcessed { position_ms: i64 },

    LoadingChanged { loading: bool },

    VideoSizeChanged { size: VideoSize },

    /// First frame rendered after a surface bind
    RenderedFirstFrame { surface: SurfaceId },

    DecoderInitialized {
        track_type: TrackType,
        decoder_name: String,
        init_duration_ms: u64,
    },

    DroppedFrames { count: u32, elapsed_ms: u64 },

    AudioSessionId { audio_session_id: i32 },

    AudioUnderrun {
        buffer_size: u32,
        buffer_size_ms: u64,
        elapsed_since_last_feed_ms: u64,
    },

    /// Text cues to display now (empty clears)
    Cues { cues: Vec<Cue> },

    Metadata { entries: Vec<MetadataEntry> },
}

/// Published event with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEventRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Session ID
    pub session_id: SessionId,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Sequence number
    pub sequence: u64,
    /// The event
    #[serde(flatten)]
    pub event: PlayerEvent,
}

/// Fan-out of player events to any number of subscribers
#[derive(Debug)]
pub struct EventBus {
    session_id: SessionId,
    sequence: AtomicU64,
    tx: broadcast::Sender<PlayerEventRecord>,
}

impl EventBus {
    pub fn new(session_id: SessionId, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            session_id,
            sequence: AtomicU64::new(0),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEventRecord> {
        self.tx.subscribe()
    }

    /// Publish an event; dropped when nobody listens
    pub fn publish(&self, event: PlayerEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let record = PlayerEventRecord {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            timestamp: Utc::now(),
            sequence,
            event,
        };
        trace!(sequence, event = ?record.event, "Publishing player event");
        let _ = self.tx.send(record);
        sequence
    }

    /// Events published so far
    pub fn published(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

/// Internal envelope carried to the session dispatcher
#[derive(Debug)]
pub(crate) enum Dispatch {
    Engine { generation: u64, event: EngineEvent },
    Renderer { generation: u64, event: RendererEvent },
    Surface { epoch: u64, event: SurfaceLifecycle },
}
