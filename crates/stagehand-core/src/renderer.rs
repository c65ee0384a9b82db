//! Renderer contract
//!
//! A renderer decodes and presents one track type. The engine owns its
//! enabled status; the session only constructs renderers, orders them and
//! sends them messages through the engine.

use crate::{
    error::EngineResult,
    events::Dispatch,
    source::DrmHints,
    surface::{SurfaceHandle, SurfaceId},
    types::*,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Decode/render unit driven by the engine
pub trait Renderer: Send {
    /// Human-readable name ("core-video", "vp9", ...)
    fn name(&self) -> &str;

    /// Track type this renderer serves
    fn track_type(&self) -> TrackType;

    /// Called by the engine when track selection picks this renderer
    fn enable(&mut self) -> EngineResult<()>;

    /// Called by the engine when the renderer is deselected or released
    fn disable(&mut self);

    /// Apply a message delivered through the engine
    fn handle_message(&mut self, message: RendererMessage) -> EngineResult<()>;
}

/// Messages the session addresses to individual renderers
#[derive(Debug, Clone, PartialEq)]
pub enum RendererMessage {
    /// Attach a surface (or detach with `None`)
    SetSurface {
        surface: Option<SurfaceHandle>,
        /// Bind call this message belongs to
        bind_generation: u64,
    },
    /// Output volume (0.0 - 1.0)
    SetVolume(f32),
    /// Audio stream routing
    SetStreamRoute(StreamRoute),
    /// Video scaling
    SetScalingMode(ScalingMode),
    /// Speed / pitch (`None` restores defaults)
    SetPlaybackParams(Option<PlaybackParams>),
}

impl RendererMessage {
    /// Short name used in logs
    pub fn label(&self) -> &'static str {
        match self {
            RendererMessage::SetSurface { .. } => "set_surface",
            RendererMessage::SetVolume(_) => "set_volume",
            RendererMessage::SetStreamRoute(_) => "set_stream_route",
            RendererMessage::SetScalingMode(_) => "set_scaling_mode",
            RendererMessage::SetPlaybackParams(_) => "set_playback_params",
        }
    }
}

/// What a renderer slot holds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RendererKind {
    Video,
    Audio,
    Text,
    Metadata,
    /// Optional pluggable decoder
    Extension { name: String, track_type: TrackType },
}

impl RendererKind {
    pub fn track_type(&self) -> TrackType {
        match self {
            RendererKind::Video => TrackType::Video,
            RendererKind::Audio => TrackType::Audio,
            RendererKind::Text => TrackType::Text,
            RendererKind::Metadata => TrackType::Metadata,
            RendererKind::Extension { track_type, .. } => *track_type,
        }
    }

    pub fn is_extension(&self) -> bool {
        matches!(self, RendererKind::Extension { .. })
    }
}

impl std::fmt::Display for RendererKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RendererKind::Extension { name, track_type } => write!(f, "{} ({})", name, track_type),
            core => write!(f, "core {}", core.track_type()),
        }
    }
}

/// Position of a renderer in a session's ordered set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererDescriptor {
    pub kind: RendererKind,
    /// Index in the ordered set; lower means preferred
    pub priority: usize,
}

impl RendererDescriptor {
    pub fn track_type(&self) -> TrackType {
        self.kind.track_type()
    }

    pub fn id(&self) -> RendererId {
        RendererId(self.priority)
    }
}

/// Index of a renderer within the engine's renderer list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RendererId(pub usize);

impl std::fmt::Display for RendererId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "renderer#{}", self.0)
    }
}

/// Everything a renderer constructor may need
#[derive(Debug, Clone)]
pub struct RendererContext {
    pub content_type: ContentType,
    pub drm: Option<DrmHints>,
    pub events: RendererEventSink,
    pub allowed_video_joining_time_ms: u64,
    pub max_dropped_frames_to_notify: u32,
}

impl RendererContext {
    /// Context whose events go nowhere
    pub fn detached(content_type: ContentType) -> Self {
        Self {
            content_type,
            drm: None,
            events: RendererEventSink::detached(),
            allowed_video_joining_time_ms: 5000,
            max_dropped_frames_to_notify: 50,
        }
    }
}

/// Notifications raised by renderers on the engine context
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    Enabled {
        track_type: TrackType,
        counters: DecoderCounters,
    },
    Disabled {
        track_type: TrackType,
        counters: DecoderCounters,
    },
    DecoderInitialized {
        track_type: TrackType,
        decoder_name: String,
        init_duration_ms: u64,
    },
    InputFormatChanged {
        track_type: TrackType,
        format: MediaFormat,
    },
    VideoSizeChanged(VideoSize),
    RenderedFirstFrame {
        surface: SurfaceId,
        bind_generation: u64,
    },
    DroppedFrames {
        count: u32,
        elapsed_ms: u64,
    },
    AudioSessionId(i32),
    AudioUnderrun {
        buffer_size: u32,
        buffer_size_ms: u64,
        elapsed_since_last_feed_ms: u64,
    },
    Cues(Vec<Cue>),
    Metadata(Vec<MetadataEntry>),
}

/// Channel end renderers use to report events
///
/// Tagged with the session generation that built the renderer so events
/// from a torn-down session are discarded.
#[derive(Debug, Clone)]
pub struct RendererEventSink {
    generation: u64,
    tx: Option<mpsc::UnboundedSender<Dispatch>>,
}

impl RendererEventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Dispatch>) -> Self {
        Self {
            generation,
            tx: Some(tx),
        }
    }

    /// Sink that drops every event
    pub fn detached() -> Self {
        Self {
            generation: 0,
            tx: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event; never blocks
    pub fn emit(&self, event: RendererEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Dispatch::Renderer {
                generation: self.generation,
                event,
            });
        }
    }
}
