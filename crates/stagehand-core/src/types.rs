//! Core types for Stagehand

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved container / streaming protocol classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Dash,
    SmoothStreaming,
    Hls,
    Mp4,
    Mp3,
    TransportStream,
    Aac,
    WebM,
    Unknown,
}

impl ContentType {
    /// Every known (non-`Unknown`) content type
    pub const KNOWN: [ContentType; 8] = [
        ContentType::Dash,
        ContentType::SmoothStreaming,
        ContentType::Hls,
        ContentType::Mp4,
        ContentType::Mp3,
        ContentType::TransportStream,
        ContentType::Aac,
        ContentType::WebM,
    ];

    /// Adaptive streaming protocols (manifest driven)
    pub fn is_adaptive(&self) -> bool {
        matches!(self, ContentType::Dash | ContentType::SmoothStreaming | ContentType::Hls)
    }

    /// Content types whose sources are wired with DRM callbacks
    pub fn may_be_protected(&self) -> bool {
        matches!(self, ContentType::Dash | ContentType::SmoothStreaming)
    }

    /// Parse a user-facing name ("dash", "hls", "mp4", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "dash" | "mpd" => Some(ContentType::Dash),
            "ss" | "smooth" | "smooth_streaming" | "ism" => Some(ContentType::SmoothStreaming),
            "hls" | "m3u8" => Some(ContentType::Hls),
            "mp4" | "m4a" | "f4v" => Some(ContentType::Mp4),
            "mp3" => Some(ContentType::Mp3),
            "ts" | "transport_stream" => Some(ContentType::TransportStream),
            "aac" => Some(ContentType::Aac),
            "webm" => Some(ContentType::WebM),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::Dash => write!(f, "dash"),
            ContentType::SmoothStreaming => write!(f, "smooth_streaming"),
            ContentType::Hls => write!(f, "hls"),
            ContentType::Mp4 => write!(f, "mp4"),
            ContentType::Mp3 => write!(f, "mp3"),
            ContentType::TransportStream => write!(f, "transport_stream"),
            ContentType::Aac => write!(f, "aac"),
            ContentType::WebM => write!(f, "webm"),
            ContentType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Medium a renderer serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Video,
    Audio,
    Text,
    Metadata,
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Video => write!(f, "video"),
            TrackType::Audio => write!(f, "audio"),
            TrackType::Text => write!(f, "text"),
            TrackType::Metadata => write!(f, "metadata"),
        }
    }
}

/// Extension renderer policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionMode {
    /// Core renderers only
    #[default]
    Off,
    /// Extensions are used when no core renderer can handle a track
    On,
    /// Extensions take precedence over core renderers
    Prefer,
}

impl std::str::FromStr for ExtensionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(ExtensionMode::Off),
            "on" => Ok(ExtensionMode::On),
            "prefer" => Ok(ExtensionMode::Prefer),
            other => Err(format!("unknown extension mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for ExtensionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionMode::Off => write!(f, "off"),
            ExtensionMode::On => write!(f, "on"),
            ExtensionMode::Prefer => write!(f, "prefer"),
        }
    }
}

/// State reported by the underlying engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Preparing,
    Buffering,
    Ready,
    Ended,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        SessionState::from(*self).fmt(f)
    }
}

/// Session state as published by the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No content prepared
    Idle,
    /// Engine is preparing the media source
    Preparing,
    /// Waiting for data
    Buffering,
    /// Able to render immediately
    Ready,
    /// Playback reached the end
    Ended,
    /// Construction or playback failed
    Failed,
}

impl SessionState {
    /// Check if transition to target state is expected
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        if target == Failed || target == Idle {
            return true;
        }
        matches!(
            (self, target),
            // From Idle
            (Idle, Preparing) |
            // From Preparing
            (Preparing, Buffering) | (Preparing, Ready) |
            // From Buffering
            (Buffering, Ready) | (Buffering, Ended) |
            // From Ready
            (Ready, Buffering) | (Ready, Ended) |
            // From Ended
            (Ended, Buffering) | (Ended, Ready) |
            // From Failed
            (Failed, Preparing)
        )
    }

    /// States in which the engine has a media timeline
    pub fn has_timeline(&self) -> bool {
        matches!(self, SessionState::Buffering | SessionState::Ready | SessionState::Ended)
    }
}

impl From<PlaybackState> for SessionState {
    fn from(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Idle => SessionState::Idle,
            PlaybackState::Preparing => SessionState::Preparing,
            PlaybackState::Buffering => SessionState::Buffering,
            PlaybackState::Ready => SessionState::Ready,
            PlaybackState::Ended => SessionState::Ended,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Preparing => write!(f, "preparing"),
            SessionState::Buffering => write!(f, "buffering"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Ended => write!(f, "ended"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Audio output stream routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRoute {
    #[default]
    Default,
    Music,
    Voice,
    Alarm,
    Notification,
    Ring,
    System,
}

impl std::str::FromStr for StreamRoute {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(StreamRoute::Default),
            "music" => Ok(StreamRoute::Music),
            "voice" => Ok(StreamRoute::Voice),
            "alarm" => Ok(StreamRoute::Alarm),
            "notification" => Ok(StreamRoute::Notification),
            "ring" => Ok(StreamRoute::Ring),
            "system" => Ok(StreamRoute::System),
            other => Err(format!("unknown stream route '{}'", other)),
        }
    }
}

/// Video scaling applied by video renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    #[default]
    Fit,
    FitWithCropping,
}

/// Audio playback parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackParams {
    /// Playback speed factor
    pub speed: f32,
    /// Pitch factor
    pub pitch: f32,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        Self { speed: 1.0, pitch: 1.0 }
    }
}

/// Format of the media a renderer is consuming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    pub sample_mime_type: Option<String>,
    pub codecs: Option<String>,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f32>,
    pub channel_count: Option<u8>,
    pub sample_rate: Option<u32>,
    pub language: Option<String>,
}

impl MediaFormat {
    /// Video format with dimensions
    pub fn video(mime: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            sample_mime_type: Some(mime.into()),
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    /// Audio format with channel layout
    pub fn audio(mime: impl Into<String>, channel_count: u8, sample_rate: u32) -> Self {
        Self {
            sample_mime_type: Some(mime.into()),
            channel_count: Some(channel_count),
            sample_rate: Some(sample_rate),
            ..Default::default()
        }
    }
}

/// Decoder statistics reported by a renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderCounters {
    pub decoder_inits: u32,
    pub decoder_releases: u32,
    pub rendered_output_buffers: u64,
    pub skipped_output_buffers: u64,
    pub dropped_output_buffers: u64,
    pub max_consecutive_dropped: u32,
}

/// Video frame geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
    pub unapplied_rotation_degrees: i32,
    pub pixel_aspect_ratio: f32,
}

impl std::fmt::Display for VideoSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A timed text cue produced by a text renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// A timed metadata entry (e.g. an ID3 TXXX frame)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub id: String,
    pub description: Option<String>,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_transitions() {
        assert!(SessionState::Idle.can_transition_to(SessionState::Preparing));
        assert!(SessionState::Preparing.can_transition_to(SessionState::Ready));
        assert!(SessionState::Ready.can_transition_to(SessionState::Ended));
        assert!(SessionState::Buffering.can_transition_to(SessionState::Failed));
        assert!(SessionState::Ended.can_transition_to(SessionState::Idle));

        assert!(!SessionState::Idle.can_transition_to(SessionState::Ready));
        assert!(!SessionState::Failed.can_transition_to(SessionState::Ready));
    }

    #[test]
    fn test_playback_state_maps_to_session_state() {
        assert_eq!(SessionState::from(PlaybackState::Ready), SessionState::Ready);
        assert_eq!(PlaybackState::Buffering.to_string(), "buffering");
    }

    #[test]
    fn test_extension_mode_parse() {
        assert_eq!("Prefer".parse::<ExtensionMode>(), Ok(ExtensionMode::Prefer));
        assert_eq!("off".parse::<ExtensionMode>(), Ok(ExtensionMode::Off));
        assert!("sometimes".parse::<ExtensionMode>().is_err());
    }

    #[test]
    fn test_content_type_names() {
        assert_eq!(ContentType::from_name("HLS"), Some(ContentType::Hls));
        assert_eq!(ContentType::from_name("ism"), Some(ContentType::SmoothStreaming));
        assert_eq!(ContentType::from_name("flv"), None);
        assert!(ContentType::Dash.may_be_protected());
        assert!(!ContentType::Mp3.is_adaptive());
    }
}
