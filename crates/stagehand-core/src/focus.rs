//! Audio focus
//!
//! An exclusive, process-wide audio output claim. Requested at prepare and
//! abandoned at stop/release; a failed request is logged, not fatal.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Outcome of a focus request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequest {
    Granted,
    Failed,
}

/// Audio focus provider
pub trait AudioFocus: Send + Sync {
    fn request(&self) -> FocusRequest;

    fn abandon(&self);
}

/// Focus provider for environments without audio focus
#[derive(Debug, Default)]
pub struct NoopAudioFocus;

impl AudioFocus for NoopAudioFocus {
    fn request(&self) -> FocusRequest {
        FocusRequest::Granted
    }

    fn abandon(&self) {}
}

/// In-process focus holder that tracks requests and abandons
#[derive(Debug)]
pub struct TrackingAudioFocus {
    granted: AtomicBool,
    available: AtomicBool,
    requests: AtomicU32,
    abandons: AtomicU32,
}

impl TrackingAudioFocus {
    pub fn new() -> Self {
        Self {
            granted: AtomicBool::new(false),
            available: AtomicBool::new(true),
            requests: AtomicU32::new(0),
            abandons: AtomicU32::new(0),
        }
    }

    /// Make subsequent requests fail (another app holds focus)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_held(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn abandons(&self) -> u32 {
        self.abandons.load(Ordering::SeqCst)
    }
}

impl Default for TrackingAudioFocus {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFocus for TrackingAudioFocus {
    fn request(&self) -> FocusRequest {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            self.granted.store(true, Ordering::SeqCst);
            FocusRequest::Granted
        } else {
            FocusRequest::Failed
        }
    }

    fn abandon(&self) {
        self.abandons.fetch_add(1, Ordering::SeqCst);
        self.granted.store(false, Ordering::SeqCst);
    }
}
