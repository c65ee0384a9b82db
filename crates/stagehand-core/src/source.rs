//! Media source construction strategy
//!
//! One source kind per content type. Manifest based kinds (DASH, Smooth
//! Streaming) receive DRM hints; HLS and progressive kinds do not.

use crate::{types::ContentType, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// License lookup hints derived from the locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmHints {
    /// License content id (a proxy URL prefix, possibly with a video id)
    pub content_id: String,
    /// License provider
    pub provider: Option<String>,
}

impl DrmHints {
    /// Full license request URL
    pub fn license_url(&self) -> String {
        match &self.provider {
            Some(provider) => format!("{}&provider={}", self.content_id, provider),
            None => self.content_id.clone(),
        }
    }
}

/// Source construction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Dash,
    SmoothStreaming,
    Hls,
    /// Single-file container read front to back
    Progressive(ContentType),
}

impl SourceKind {
    /// Strategy for a content type
    pub fn for_content_type(content_type: ContentType) -> Option<Self> {
        match content_type {
            ContentType::Dash => Some(SourceKind::Dash),
            ContentType::SmoothStreaming => Some(SourceKind::SmoothStreaming),
            ContentType::Hls => Some(SourceKind::Hls),
            ContentType::Unknown => None,
            other => Some(SourceKind::Progressive(other)),
        }
    }

    pub fn uses_drm(&self) -> bool {
        matches!(self, SourceKind::Dash | SourceKind::SmoothStreaming)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Dash => write!(f, "dash"),
            SourceKind::SmoothStreaming => write!(f, "smooth_streaming"),
            SourceKind::Hls => write!(f, "hls"),
            SourceKind::Progressive(ct) => write!(f, "progressive({})", ct),
        }
    }
}

/// Inputs for building a media source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub locator: String,
    pub content_type: ContentType,
    pub drm: Option<DrmHints>,
    pub user_agent: String,
}

/// A media source handed to the engine's `prepare`
pub trait MediaSource: Send + Sync + Debug {
    /// Construction strategy used
    fn kind(&self) -> SourceKind;

    /// Locator being played
    fn locator(&self) -> &str;

    /// DRM hints wired into the source, if any
    fn drm(&self) -> Option<&DrmHints> {
        None
    }
}

/// Builds media sources from requests
pub trait MediaSourceFactory: Send + Sync {
    fn create(&self, request: &SourceRequest) -> Result<Box<dyn MediaSource>>;
}

/// Descriptor source produced by `DefaultMediaSourceFactory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribedSource {
    pub kind: SourceKind,
    pub locator: String,
    pub user_agent: String,
    pub drm: Option<DrmHints>,
}

impl MediaSource for DescribedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn locator(&self) -> &str {
        &self.locator
    }

    fn drm(&self) -> Option<&DrmHints> {
        self.drm.as_ref()
    }
}

/// Factory keyed purely by content type
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMediaSourceFactory;

impl MediaSourceFactory for DefaultMediaSourceFactory {
    fn create(&self, request: &SourceRequest) -> Result<Box<dyn MediaSource>> {
        let kind = SourceKind::for_content_type(request.content_type).ok_or_else(|| {
            Error::construction(format!("no media source for locator {}", request.locator))
        })?;
        let drm = if kind.uses_drm() {
            request.drm.clone()
        } else {
            None
        };
        Ok(Box::new(DescribedSource {
            kind,
            locator: request.locator.clone(),
            user_agent: request.user_agent.clone(),
            drm,
        }))
    }
}
