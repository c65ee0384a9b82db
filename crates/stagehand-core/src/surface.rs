//! Output surface binding
//!
//! A session holds at most one output surface at a time. Binding:
//! - detaches any attached surface provider
//! - sends one `SetSurface` message per video renderer
//! - uses blocking delivery when a different surface replaces an active one,
//!   then releases the old surface if the session owned it
//! - starts a new bind generation, so every bind (including a rebind of the
//!   same surface) yields exactly one first-frame notification

use crate::{
    engine::{EngineMessage, PlaybackEngine},
    events::Dispatch,
    renderer::{RendererId, RendererMessage},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique surface identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    fn next() -> Self {
        Self(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A platform output surface
pub trait OutputSurface: Send + Sync {
    /// Free the underlying buffer queue
    fn release(&self);
}

/// Clonable handle to an output surface; identity is the `SurfaceId`
#[derive(Clone)]
pub struct SurfaceHandle {
    id: SurfaceId,
    inner: Arc<dyn OutputSurface>,
}

impl SurfaceHandle {
    pub fn new(surface: impl OutputSurface + 'static) -> Self {
        Self::from_arc(Arc::new(surface))
    }

    pub fn from_arc(inner: Arc<dyn OutputSurface>) -> Self {
        Self {
            id: SurfaceId::next(),
            inner,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn release(&self) {
        self.inner.release();
    }
}

impl PartialEq for SurfaceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SurfaceHandle {}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SurfaceHandle").field(&self.id.0).finish()
    }
}

/// Lifecycle notifications pushed by a surface provider
#[derive(Debug, Clone)]
pub enum SurfaceLifecycle {
    /// A (new) surface is ready for rendering
    Available(SurfaceHandle),
    /// The provider's surface is gone
    Destroyed,
}

/// Channel end handed to an attached provider
#[derive(Debug, Clone)]
pub struct SurfaceEventSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<Dispatch>,
}

impl SurfaceEventSink {
    pub fn emit(&self, event: SurfaceLifecycle) {
        let _ = self.tx.send(Dispatch::Surface {
            epoch: self.epoch,
            event,
        });
    }
}

/// A windowing source that owns surface lifecycle (view, texture, holder)
pub trait SurfaceProvider: Send + Sync {
    /// Surface currently available, if any
    fn current(&self) -> Option<SurfaceHandle>;

    /// Whether surfaces from this provider are released by the session
    fn owns_surfaces(&self) -> bool;

    /// Start delivering lifecycle events
    fn attach(&self, sink: SurfaceEventSink);

    /// Stop delivering lifecycle events
    fn detach(&self);
}

/// The session's single surface slot
#[derive(Debug, Clone, Default)]
pub struct SurfaceSlot {
    pub surface: Option<SurfaceHandle>,
    pub owns_surface: bool,
}

/// Video renderers a bind addresses, and the engine that delivers to them
#[derive(Clone, Copy)]
pub struct VideoTargets<'a> {
    pub engine: &'a dyn PlaybackEngine,
    pub renderers: &'a [RendererId],
}

/// Owner of the surface slot and the hand-off protocol
pub struct SurfaceBinder {
    slot: SurfaceSlot,
    provider: Option<Arc<dyn SurfaceProvider>>,
    provider_epoch: u64,
    bind_generation: u64,
    first_frame_reported: bool,
    dispatch: mpsc::UnboundedSender<Dispatch>,
}

impl SurfaceBinder {
    pub(crate) fn new(dispatch: mpsc::UnboundedSender<Dispatch>) -> Self {
        Self {
            slot: SurfaceSlot::default(),
            provider: None,
            provider_epoch: 0,
            bind_generation: 0,
            first_frame_reported: false,
            dispatch,
        }
    }

    pub fn slot(&self) -> &SurfaceSlot {
        &self.slot
    }

    pub fn current(&self) -> Option<&SurfaceHandle> {
        self.slot.surface.as_ref()
    }

    pub fn bind_generation(&self) -> u64 {
        self.bind_generation
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Bind a surface (or none) chosen by the caller
    pub async fn bind(
        &mut self,
        targets: Option<VideoTargets<'_>>,
        surface: Option<SurfaceHandle>,
        owns: bool,
    ) -> Result<()> {
        self.detach_provider();
        self.apply(targets, surface, owns).await
    }

    /// Detach every renderer from the current surface
    pub async fn unbind(&mut self, targets: Option<VideoTargets<'_>>) -> Result<()> {
        self.bind(targets, None, false).await
    }

    /// Follow a provider's surface until the next `bind` or `attach_provider`
    pub async fn attach_provider(
        &mut self,
        targets: Option<VideoTargets<'_>>,
        provider: Arc<dyn SurfaceProvider>,
    ) -> Result<()> {
        self.detach_provider();
        self.provider_epoch += 1;
        provider.attach(SurfaceEventSink {
            epoch: self.provider_epoch,
            tx: self.dispatch.clone(),
        });
        let current = provider.current();
        let owns = provider.owns_surfaces();
        self.provider = Some(provider);
        info!(epoch = self.provider_epoch, has_surface = current.is_some(), "Surface provider attached");
        self.apply(targets, current, owns).await
    }

    /// Apply a provider lifecycle event; stale epochs are ignored
    pub(crate) async fn on_provider_event(
        &mut self,
        targets: Option<VideoTargets<'_>>,
        epoch: u64,
        event: SurfaceLifecycle,
    ) -> Result<()> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };
        if epoch != self.provider_epoch {
            debug!(epoch, current = self.provider_epoch, "Dropping stale surface event");
            return Ok(());
        }
        let owns = provider.owns_surfaces();
        match event {
            SurfaceLifecycle::Available(surface) => self.apply(targets, Some(surface), owns).await,
            SurfaceLifecycle::Destroyed => self.apply(targets, None, false).await,
        }
    }

    /// Deliver the slot's surface to a freshly built renderer set
    pub async fn rebind_current(&mut self, targets: VideoTargets<'_>) -> Result<()> {
        if self.slot.surface.is_none() {
            return Ok(());
        }
        let surface = self.slot.surface.clone();
        let owns = self.slot.owns_surface;
        self.apply(Some(targets), surface, owns).await
    }

    /// Record a renderer's first-frame report; true once per bind
    pub fn on_rendered_first_frame(&mut self, surface: SurfaceId, bind_generation: u64) -> bool {
        if bind_generation != self.bind_generation || self.first_frame_reported {
            return false;
        }
        if self.slot.surface.as_ref().map(SurfaceHandle::id) != Some(surface) {
            return false;
        }
        self.first_frame_reported = true;
        true
    }

    /// Release an owned surface and optionally keep an unowned one
    pub fn teardown(&mut self, keep_unowned: bool) {
        if self.slot.owns_surface {
            if let Some(surface) = self.slot.surface.take() {
                debug!(surface = %surface.id(), "Releasing owned surface");
                surface.release();
            }
            self.slot.owns_surface = false;
        } else if !keep_unowned {
            self.slot.surface = None;
        }
        if !keep_unowned {
            self.detach_provider();
        }
    }

    fn detach_provider(&mut self) {
        if let Some(provider) = self.provider.take() {
            provider.detach();
            debug!(epoch = self.provider_epoch, "Surface provider detached");
        }
    }

    async fn apply(
        &mut self,
        targets: Option<VideoTargets<'_>>,
        surface: Option<SurfaceHandle>,
        owns: bool,
    ) -> Result<()> {
        let previous = self.slot.surface.clone();
        let replacing = match (&previous, &surface) {
            (Some(old), new) => new.as_ref() != Some(old),
            (None, _) => false,
        };

        self.bind_generation += 1;
        self.first_frame_reported = false;

        let mut outcome = Ok(());
        if let Some(targets) = targets {
            let messages = EngineMessage::broadcast(
                targets.renderers,
                RendererMessage::SetSurface {
                    surface: surface.clone(),
                    bind_generation: self.bind_generation,
                },
            );
            let sent = if replacing {
                targets.engine.blocking_send_messages(messages).await
            } else {
                targets.engine.send_messages(messages).await
            };
            if let Err(e) = sent {
                if e.is_illegal_state() {
                    warn!(error = %e, "Engine rejected surface messages");
                } else {
                    outcome = Err(Error::from(e));
                }
            }
        }

        if replacing && self.slot.owns_surface {
            if let Some(old) = &previous {
                debug!(surface = %old.id(), "Releasing replaced surface");
                old.release();
            }
        }

        info!(
            surface = ?surface.as_ref().map(SurfaceHandle::id),
            owns,
            blocking = replacing,
            generation = self.bind_generation,
            "Surface bound"
        );
        self.slot = SurfaceSlot {
            surface,
            owns_surface: owns,
        };
        outcome
    }
}

impl std::fmt::Debug for SurfaceBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceBinder")
            .field("slot", &self.slot)
            .field("provider_attached", &self.provider.is_some())
            .field("bind_generation", &self.bind_generation)
            .finish()
    }
}
