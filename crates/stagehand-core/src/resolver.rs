//! Content type resolution
//!
//! Maps an opaque locator (URL or bare path) to:
//! - a `ContentType` (path extension, then vendor heuristics, then scheme)
//! - best-effort DRM hints (content id and provider)
//!
//! Resolution is pure and never touches the network.

use crate::{source::DrmHints, types::ContentType, Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// License proxy used when nothing more specific is known
pub const DEFAULT_LICENSE_BASE: &str = "https://proxy.uat.widevine.com/proxy?video_id=";

const YOUTUBE_MANIFEST_PREFIX: &str = "://www.youtube.com/api/manifest/dash/id/";
const WIDEVINE_TEST_PREFIX: &str = "://storage.googleapis.com/wvmedia/cenc/";
const UNIFIED_STREAMING_PREFIX: &str = "://demo.unified-streaming.com/video/widevine/";
const UNIFIED_STREAMING_PROXY: &str = "http://wv-ref-eme-player.appspot.com/proxy";

const PROVIDER_YOUTUBE: &str = "YouTube";
const PROVIDER_WIDEVINE_TEST: &str = "widevine_test";

/// Extension table, checked in order
const EXTENSIONS: &[(&str, ContentType)] = &[
    (".mpd", ContentType::Dash),
    (".ism", ContentType::SmoothStreaming),
    (".m3u8", ContentType::Hls),
    (".m4a", ContentType::Mp4),
    (".mp4", ContentType::Mp4),
    (".f4v", ContentType::Mp4),
    (".mp3", ContentType::Mp3),
    (".ts", ContentType::TransportStream),
    (".aac", ContentType::Aac),
    (".webm", ContentType::WebM),
];

/// Result of resolving a locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedContent {
    /// Original locator
    pub locator: String,
    /// Resolved content type (may be `Unknown`)
    pub content_type: ContentType,
    /// License content id hint
    pub content_id_hint: String,
    /// License provider hint
    pub provider_hint: Option<String>,
}

impl ResolvedContent {
    /// Fail with `Error::Resolution` when the type could not be determined
    pub fn require_known(self) -> Result<Self> {
        if self.content_type == ContentType::Unknown {
            return Err(Error::Resolution {
                locator: self.locator,
            });
        }
        Ok(self)
    }

    /// DRM hints for sources of protected content types
    pub fn drm_hints(&self) -> Option<DrmHints> {
        if !self.content_type.may_be_protected() {
            return None;
        }
        Some(DrmHints {
            content_id: self.content_id_hint.clone(),
            provider: self.provider_hint.clone(),
        })
    }
}

/// Locator to content type resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTypeResolver;

impl ContentTypeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a locator; never fails, may yield `ContentType::Unknown`
    pub fn resolve(&self, locator: &str) -> ResolvedContent {
        let (content_id_hint, provider_hint) = drm_hints_for(locator);
        ResolvedContent {
            locator: locator.to_string(),
            content_type: content_type_for(locator),
            content_id_hint,
            provider_hint,
        }
    }
}

fn content_type_for(locator: &str) -> ContentType {
    let (path, scheme) = split_locator(locator);
    let lower = path.to_ascii_lowercase();

    if let Some((_, content_type)) = EXTENSIONS.iter().find(|(ext, _)| lower.ends_with(ext)) {
        return *content_type;
    }

    // Vendor manifest conventions
    if path.contains("anifest(format=m3u8")
        || locator.contains("nbcsn_liveextra_ios")
        || locator.contains("formats=m3u,mpeg4&redirect=true")
    {
        return ContentType::Hls;
    }

    match scheme.as_deref() {
        Some("http") | Some("https") => ContentType::Dash,
        _ => ContentType::Unknown,
    }
}

/// Path component and scheme of a locator
fn split_locator(locator: &str) -> (String, Option<String>) {
    match Url::parse(locator) {
        // Single letter schemes are drive letters, not URLs
        Ok(url) if url.scheme().len() > 1 => (url.path().to_string(), Some(url.scheme().to_string())),
        _ => {
            let end = locator.find(|c| c == '?' || c == '#').unwrap_or(locator.len());
            (locator[..end].to_string(), None)
        }
    }
}

fn drm_hints_for(locator: &str) -> (String, Option<String>) {
    if let Some(idx) = locator.find(YOUTUBE_MANIFEST_PREFIX) {
        let rest = &locator[idx + YOUTUBE_MANIFEST_PREFIX.len()..];
        let id = rest.split('/').next().unwrap_or_default();
        return (
            format!("{}{}", DEFAULT_LICENSE_BASE, id),
            Some(PROVIDER_YOUTUBE.to_string()),
        );
    }
    if locator.contains(WIDEVINE_TEST_PREFIX) {
        return (
            DEFAULT_LICENSE_BASE.to_string(),
            Some(PROVIDER_WIDEVINE_TEST.to_string()),
        );
    }
    if locator.contains(UNIFIED_STREAMING_PREFIX) {
        return (UNIFIED_STREAMING_PROXY.to_string(), None);
    }
    (
        DEFAULT_LICENSE_BASE.to_string(),
        Some(PROVIDER_WIDEVINE_TEST.to_string()),
    )
}
