//! Stagehand Core - Playback Session Coordinator
//!
//! This crate sits between independent decode/render units and a UI surface:
//! - Content type resolution from URLs and paths, with DRM hints
//! - Ordered renderer assembly with pluggable extension renderers
//! - Exclusive output surface binding with blocking hand-off
//! - Seek coalescing against an asynchronous engine
//! - Serialized session commands with typed event fan-out
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Stagehand Core                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Content    │  │   Renderer   │  │    Media     │           │
//! │  │   Resolver   │  │   Registry   │  │   Sources    │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │  (affinity ctx) │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐                              │
//! │                    │  Playback   │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │   Surface    │  │   Engine    │  │     Seek     │            │
//! │  │   Binder     │  │ + Event Bus │  │ Coordinator  │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod resolver;
pub mod source;
pub mod renderer;
pub mod registry;
pub mod engine;
pub mod surface;
pub mod seek;
pub mod affinity;
pub mod focus;
pub mod events;
pub mod session;

pub use error::{DrmReason, EngineError, Error, ErrorReport, Result};
pub use types::*;
pub use config::SessionConfig;
pub use resolver::{ContentTypeResolver, ResolvedContent};
pub use source::{DefaultMediaSourceFactory, DrmHints, MediaSource, MediaSourceFactory, SourceKind, SourceRequest};
pub use renderer::{Renderer, RendererDescriptor, RendererEvent, RendererKind, RendererMessage};
pub use registry::{ExtensionError, ExtensionTable, RendererRegistry};
pub use engine::{EngineEvent, EngineFactory, EngineMessage, PlaybackEngine};
pub use surface::{OutputSurface, SurfaceHandle, SurfaceId, SurfaceProvider};
pub use seek::{SeekCoordinator, SeekState};
pub use focus::{AudioFocus, NoopAudioFocus};
pub use events::{PlayerEvent, PlayerEventRecord};
pub use session::{PlaybackSession, SessionBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Stagehand Core initialized");
}
