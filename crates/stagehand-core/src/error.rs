//! Error types for Stagehand Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reason attached to DRM failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrmReason {
    /// The platform has no DRM support at all
    NotSupported,
    /// The content's protection scheme is not supported
    UnsupportedScheme,
    /// Anything else
    Unknown,
}

impl DrmReason {
    /// Stable identifier used in error reports
    pub fn as_str(&self) -> &'static str {
        match self {
            DrmReason::NotSupported => "drm_error_not_supported",
            DrmReason::UnsupportedScheme => "drm_error_unsupported_scheme",
            DrmReason::Unknown => "drm_error_unknown",
        }
    }
}

impl std::fmt::Display for DrmReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator error types
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors
    #[error("Cannot resolve content type for locator: {locator}")]
    Resolution { locator: String },

    // Construction errors
    #[error("Session construction failed: {0}")]
    Construction(String),

    #[error("Extension renderer '{name}' failed to load: {reason}")]
    ExtensionLoad { name: String, reason: String },

    #[error("Session construction did not complete within {waited_ms}ms")]
    ConstructionTimeout { waited_ms: u64 },

    // Engine errors
    #[error("Engine rejected command: {0}")]
    EngineState(String),

    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    // DRM errors
    #[error("DRM error ({reason}): {message}")]
    Drm { reason: DrmReason, message: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a construction error
    pub fn construction(msg: impl Into<String>) -> Self {
        Error::Construction(msg.into())
    }

    /// Returns true if the session survives this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::EngineState(_) | Error::InvalidSessionState(_) | Error::Drm { .. }
        )
    }

    /// Returns true for failures that abort a prepare attempt
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            Error::Construction(_) | Error::ExtensionLoad { .. } | Error::ConstructionTimeout { .. }
        )
    }

    /// Returns the error code for reports
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Resolution { .. } => "RESOLUTION",
            Error::Construction(_) => "CONSTRUCTION",
            Error::ExtensionLoad { .. } => "EXTENSION_LOAD",
            Error::ConstructionTimeout { .. } => "CONSTRUCTION_TIMEOUT",
            Error::EngineState(_) => "ENGINE_STATE",
            Error::InvalidSessionState(_) => "INVALID_SESSION_STATE",
            Error::Playback(_) => "PLAYBACK",
            Error::Drm { .. } => "DRM",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
            Error::Json(_) => "JSON",
        }
    }

    /// Snapshot of this error suitable for `last_error()` and event fan-out
    pub fn report(&self, fatal: bool) -> ErrorReport {
        ErrorReport {
            code: self.error_code().to_string(),
            message: self.to_string(),
            drm_reason: match self {
                Error::Drm { reason, .. } => Some(*reason),
                _ => None,
            },
            fatal,
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::IllegalState(msg) => Error::EngineState(msg),
            EngineError::Released => Error::EngineState("engine released".to_string()),
            EngineError::Failed(msg) => Error::Playback(msg),
        }
    }
}

/// Errors raised by a playback engine while executing a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Command is incompatible with the engine's current internal state
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The engine has been released
    #[error("engine released")]
    Released,

    /// Any other engine failure
    #[error("{0}")]
    Failed(String),
}

impl EngineError {
    /// State-class rejections are benign races with asynchronous transitions
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, EngineError::IllegalState(_) | EngineError::Released)
    }
}

/// Result type for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Clonable error snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// DRM reason, for DRM failures
    pub drm_reason: Option<DrmReason>,
    /// Whether the session was failed by this error
    pub fatal: bool,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_conversion() {
        let err: Error = EngineError::IllegalState("not prepared".into()).into();
        assert!(matches!(err, Error::EngineState(_)));
        assert!(err.is_recoverable());

        let err: Error = EngineError::Failed("decoder died".into()).into();
        assert_eq!(err.error_code(), "PLAYBACK");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_drm_report_carries_reason() {
        let err = Error::Drm {
            reason: DrmReason::UnsupportedScheme,
            message: "cbcs".into(),
        };
        let report = err.report(false);
        assert_eq!(report.code, "DRM");
        assert_eq!(report.drm_reason, Some(DrmReason::UnsupportedScheme));
        assert!(!report.fatal);
        assert!(report.message.contains("drm_error_unsupported_scheme"));
    }

    #[test]
    fn test_construction_classification() {
        assert!(Error::ConstructionTimeout { waited_ms: 10 }.is_construction_failure());
        assert!(Error::ExtensionLoad {
            name: "vp9".into(),
            reason: "bad packaging".into()
        }
        .is_construction_failure());
        assert!(!Error::Resolution { locator: "x".into() }.is_construction_failure());
    }
}
