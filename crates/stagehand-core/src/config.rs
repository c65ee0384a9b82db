//! Session configuration

use crate::{
    types::{ExtensionMode, ScalingMode, StreamRoute},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Playback session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Extension renderer policy applied at the next prepare
    pub extension_mode: ExtensionMode,
    /// Maximum wait for construction on the engine context (milliseconds)
    pub construction_timeout_ms: u64,
    /// Start playback as soon as the engine is ready
    pub auto_play: bool,
    /// Volume applied to audio renderers at prepare (0.0 - 1.0)
    pub initial_volume: f32,
    /// Audio stream routing
    pub stream_route: StreamRoute,
    /// Video scaling mode
    pub scaling_mode: ScalingMode,
    /// User agent handed to media sources
    pub user_agent: String,
    /// Capacity of the external event channel
    pub event_capacity: usize,
    /// Time a video renderer may spend joining after enable (milliseconds)
    pub allowed_video_joining_time_ms: u64,
    /// Dropped frame count that triggers a dropped frames event
    pub max_dropped_frames_to_notify: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            extension_mode: ExtensionMode::Off,
            construction_timeout_ms: 5000,
            auto_play: true,
            initial_volume: 1.0,
            stream_route: StreamRoute::Default,
            scaling_mode: ScalingMode::Fit,
            user_agent: format!("stagehand/{}", crate::VERSION),
            event_capacity: 256,
            allowed_video_joining_time_ms: 5000,
            max_dropped_frames_to_notify: 50,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.construction_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "construction_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::InvalidConfig(format!(
                "initial_volume must be within [0, 1], got {}",
                self.initial_volume
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_dropped_frames_to_notify == 0 {
            return Err(Error::InvalidConfig(
                "max_dropped_frames_to_notify must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
