//! Simulated engine
//!
//! Deterministic in-process stand-ins for the engine, renderers, output
//! surfaces and surface providers. Renderers live on a tokio task owned by
//! the engine; the playback clock only moves when `SimEngine::advance` is
//! called.

use crate::{
    engine::{
        EngineEvent, EngineFactory, EngineFailure, EngineMessage, EventSink, ListenerId,
        PlaybackEngine,
    },
    error::{EngineError, EngineResult},
    registry::{family_track_type, CoreConstructor, ExtensionTable, RendererRegistry},
    renderer::{Renderer, RendererContext, RendererEvent, RendererEventSink, RendererMessage},
    source::{MediaSource, SourceKind},
    surface::{OutputSurface, SurfaceEventSink, SurfaceHandle, SurfaceLifecycle, SurfaceProvider},
    types::*,
    Error, Result,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Behaviour of simulated engines
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Media duration reported once ready
    pub duration_ms: i64,
    /// Go from buffering to ready immediately after prepare
    pub auto_ready: bool,
    /// Report every seek processed as soon as it is issued
    pub auto_complete_seeks: bool,
    /// Time engine construction blocks the affinity context
    pub create_delay_ms: u64,
    /// Make engine construction fail
    pub fail_create: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_ms: 60_000,
            auto_ready: true,
            auto_complete_seeks: true,
            create_delay_ms: 0,
            fail_create: false,
        }
    }
}

/// A message as seen by a simulated renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RendererLogEntry {
    pub renderer: String,
    pub track_type: TrackType,
    pub message: RendererMessage,
}

/// One `send_messages` / `blocking_send_messages` call
#[derive(Debug, Clone, PartialEq)]
pub struct MessageBatch {
    pub blocking: bool,
    pub messages: Vec<EngineMessage>,
}

#[derive(Default)]
struct BackendInner {
    config: Mutex<SimConfig>,
    engines: Mutex<Vec<Arc<SimEngine>>>,
    sinks: Mutex<Vec<RendererEventSink>>,
    renderer_log: Arc<Mutex<Vec<RendererLogEntry>>>,
}

/// Factory side of the simulation plus the hooks tests drive it with
#[derive(Clone, Default)]
pub struct SimBackend {
    inner: Arc<BackendInner>,
}

impl SimBackend {
    pub fn new(config: SimConfig) -> Self {
        let backend = Self::default();
        *lock(&backend.inner.config) = config;
        backend
    }

    /// Change the behaviour of engines created from now on
    pub fn configure(&self, update: impl FnOnce(&mut SimConfig)) {
        update(&mut lock(&self.inner.config));
    }

    /// Registry of simulated core renderers plus the named extension families
    pub fn registry(&self, extensions: &[&str]) -> Result<RendererRegistry> {
        let backend = self.clone();
        let core: CoreConstructor = Arc::new(move |track_type: TrackType, ctx: &RendererContext| {
            backend.track_sink(&ctx.events);
            Ok(Box::new(SimRenderer::with_log(
                format!("core-{}", track_type),
                track_type,
                ctx,
                backend.inner.renderer_log.clone(),
            )) as Box<dyn Renderer>)
        });

        let mut table = ExtensionTable::new();
        for name in extensions {
            let track_type = family_track_type(name)
                .ok_or_else(|| Error::InvalidConfig(format!("unknown extension family '{}'", name)))?;
            let log = self.inner.renderer_log.clone();
            let renderer_name = name.to_string();
            table.register(name, move |ctx| {
                Ok(Box::new(SimRenderer::with_log(
                    renderer_name.clone(),
                    track_type,
                    ctx,
                    log.clone(),
                )) as Box<dyn Renderer>)
            })?;
        }
        Ok(RendererRegistry::new(core, table))
    }

    pub fn engine_factory(&self) -> Arc<dyn EngineFactory> {
        Arc::new(SimEngineFactory {
            backend: self.clone(),
        })
    }

    /// Most recently created engine
    pub fn engine(&self) -> Option<Arc<SimEngine>> {
        lock(&self.inner.engines).last().cloned()
    }

    pub fn engines_created(&self) -> usize {
        lock(&self.inner.engines).len()
    }

    /// Event sink handed to the most recent renderer set
    pub fn renderer_sink(&self) -> Option<RendererEventSink> {
        lock(&self.inner.sinks).last().cloned()
    }

    /// Every message simulated renderers have handled
    pub fn renderer_log(&self) -> Vec<RendererLogEntry> {
        lock(&self.inner.renderer_log).clone()
    }

    pub fn clear_renderer_log(&self) {
        lock(&self.inner.renderer_log).clear();
    }

    fn track_sink(&self, sink: &RendererEventSink) {
        let mut sinks = lock(&self.inner.sinks);
        if sinks.last().map(RendererEventSink::generation) != Some(sink.generation()) {
            sinks.push(sink.clone());
        }
    }
}

impl std::fmt::Debug for SimBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimBackend")
            .field("config", &*lock(&self.inner.config))
            .field("engines_created", &self.engines_created())
            .finish()
    }
}

struct SimEngineFactory {
    backend: SimBackend,
}

impl EngineFactory for SimEngineFactory {
    fn create(&self, renderers: Vec<Box<dyn Renderer>>) -> EngineResult<Arc<dyn PlaybackEngine>> {
        let config = lock(&self.backend.inner.config).clone();
        if config.create_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(config.create_delay_ms));
        }
        if config.fail_create {
            return Err(EngineError::Failed(
                "simulated engine construction failure".to_string(),
            ));
        }
        let engine = SimEngine::spawn(renderers, config)?;
        lock(&self.backend.inner.engines).push(engine.clone());
        Ok(engine)
    }
}

enum Command {
    Enable,
    Disable,
    Deliver {
        messages: Vec<EngineMessage>,
        ack: Option<oneshot::Sender<EngineResult<()>>>,
    },
    Release {
        ack: oneshot::Sender<()>,
    },
}

struct EngineShared {
    state: PlaybackState,
    play_when_ready: bool,
    prepared: bool,
    released: bool,
    position_ms: i64,
    duration_known: bool,
    source: Option<SourceKind>,
    listeners: Vec<(ListenerId, EventSink)>,
    next_listener: u64,
    seeks: Vec<i64>,
    unprocessed_seeks: u32,
    batches: Vec<MessageBatch>,
    reject_next: Option<EngineError>,
}

impl EngineShared {
    fn emit(&mut self, event: EngineEvent) {
        self.listeners
            .retain(|(_, sink)| sink.send(event.clone()).is_ok());
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Simulated engine state");
            self.state = state;
            let event = EngineEvent::StateChanged {
                play_when_ready: self.play_when_ready,
                state,
            };
            self.emit(event);
        }
    }

    fn check(&mut self) -> EngineResult<()> {
        if self.released {
            return Err(EngineError::Released);
        }
        match self.reject_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-process engine
pub struct SimEngine {
    config: SimConfig,
    commands: mpsc::UnboundedSender<Command>,
    shared: Mutex<EngineShared>,
}

impl SimEngine {
    /// Start the renderer task; requires a tokio runtime
    pub fn spawn(renderers: Vec<Box<dyn Renderer>>, config: SimConfig) -> EngineResult<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| EngineError::Failed(format!("no runtime for engine: {}", e)))?;
        let (commands, rx) = mpsc::unbounded_channel();
        info!(renderers = renderers.len(), "Simulated engine created");
        runtime.spawn(drive(renderers, rx));

        Ok(Arc::new(Self {
            config,
            commands,
            shared: Mutex::new(EngineShared {
                state: PlaybackState::Idle,
                play_when_ready: false,
                prepared: false,
                released: false,
                position_ms: 0,
                duration_known: false,
                source: None,
                listeners: Vec::new(),
                next_listener: 0,
                seeks: Vec::new(),
                unprocessed_seeks: 0,
                batches: Vec::new(),
                reject_next: None,
            }),
        }))
    }

    fn shared(&self) -> MutexGuard<'_, EngineShared> {
        lock(&self.shared)
    }

    fn command(&self, command: Command) -> EngineResult<()> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Released)
    }

    /// Every seek issued to this engine, in order
    pub fn seeks(&self) -> Vec<i64> {
        self.shared().seeks.clone()
    }

    /// Every message batch sent to this engine, in order
    pub fn batches(&self) -> Vec<MessageBatch> {
        self.shared().batches.clone()
    }

    pub fn source(&self) -> Option<SourceKind> {
        self.shared().source
    }

    pub fn listener_count(&self) -> usize {
        self.shared().listeners.len()
    }

    pub fn is_released(&self) -> bool {
        self.shared().released
    }

    /// Make the next command fail with `err`
    pub fn reject_next(&self, err: EngineError) {
        self.shared().reject_next = Some(err);
    }

    /// Report the oldest unprocessed seek as processed
    pub fn complete_seek(&self) -> bool {
        let mut shared = self.shared();
        if shared.unprocessed_seeks == 0 {
            return false;
        }
        shared.unprocessed_seeks -= 1;
        shared.emit(EngineEvent::SeekProcessed);
        true
    }

    /// Buffering -> Ready
    pub fn finish_buffering(&self) {
        let mut shared = self.shared();
        if shared.prepared && shared.state == PlaybackState::Buffering {
            shared.duration_known = true;
            shared.emit(EngineEvent::LoadingChanged(false));
            shared.set_state(PlaybackState::Ready);
        }
    }

    /// Ready -> Buffering (rebuffer)
    pub fn start_buffering(&self) {
        let mut shared = self.shared();
        if shared.prepared && shared.state == PlaybackState::Ready {
            shared.emit(EngineEvent::LoadingChanged(true));
            shared.set_state(PlaybackState::Buffering);
        }
    }

    /// Move the playback clock while playing; returns the new position
    pub fn advance(&self, ms: i64) -> i64 {
        let mut shared = self.shared();
        if shared.prepared && shared.play_when_ready && shared.state == PlaybackState::Ready {
            shared.position_ms = (shared.position_ms + ms).min(self.config.duration_ms);
            if shared.position_ms >= self.config.duration_ms {
                shared.set_state(PlaybackState::Ended);
            }
        }
        shared.position_ms
    }

    /// Report a failure; fatal failures stop playback
    pub fn fail(&self, failure: EngineFailure, fatal: bool) {
        let mut shared = self.shared();
        warn!(failure = %failure, fatal, "Simulated engine failure");
        shared.emit(EngineEvent::Error { failure, fatal });
        if fatal {
            shared.prepared = false;
            shared.state = PlaybackState::Idle;
            drop(shared);
            let _ = self.command(Command::Disable);
        }
    }
}

impl std::fmt::Debug for SimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared();
        f.debug_struct("SimEngine")
            .field("state", &shared.state)
            .field("position_ms", &shared.position_ms)
            .field("released", &shared.released)
            .finish()
    }
}

#[async_trait]
impl PlaybackEngine for SimEngine {
    async fn prepare(&self, source: Box<dyn MediaSource>) -> EngineResult<()> {
        let mut shared = self.shared();
        shared.check()?;
        info!(kind = %source.kind(), locator = source.locator(), "Simulated engine preparing");
        shared.source = Some(source.kind());
        shared.prepared = true;
        shared.position_ms = 0;
        shared.duration_known = false;
        shared.set_state(PlaybackState::Preparing);
        shared.emit(EngineEvent::LoadingChanged(true));
        shared.set_state(PlaybackState::Buffering);
        self.command(Command::Enable)?;
        if self.config.auto_ready {
            shared.duration_known = true;
            shared.emit(EngineEvent::LoadingChanged(false));
            shared.set_state(PlaybackState::Ready);
        }
        Ok(())
    }

    async fn set_play_when_ready(&self, play_when_ready: bool) -> EngineResult<()> {
        let mut shared = self.shared();
        shared.check()?;
        if shared.play_when_ready != play_when_ready {
            shared.play_when_ready = play_when_ready;
            let state = shared.state;
            shared.emit(EngineEvent::StateChanged {
                play_when_ready,
                state,
            });
        }
        Ok(())
    }

    async fn seek_to(&self, position_ms: i64) -> EngineResult<()> {
        let mut shared = self.shared();
        shared.check()?;
        if !shared.prepared {
            return Err(EngineError::IllegalState("seek while not prepared".to_string()));
        }
        shared.seeks.push(position_ms);
        let duration = self.config.duration_ms;
        shared.position_ms = position_ms.clamp(0, duration);
        if position_ms >= duration {
            shared.set_state(PlaybackState::Ended);
        } else if shared.state == PlaybackState::Ended {
            shared.set_state(PlaybackState::Ready);
        }
        if self.config.auto_complete_seeks {
            shared.emit(EngineEvent::SeekProcessed);
        } else {
            shared.unprocessed_seeks += 1;
        }
        Ok(())
    }

    async fn stop(&self) -> EngineResult<()> {
        let mut shared = self.shared();
        shared.check()?;
        shared.prepared = false;
        shared.position_ms = 0;
        shared.duration_known = false;
        shared.unprocessed_seeks = 0;
        shared.set_state(PlaybackState::Idle);
        self.command(Command::Disable)
    }

    async fn release(&self) {
        {
            let mut shared = self.shared();
            if shared.released {
                return;
            }
            shared.released = true;
            shared.prepared = false;
            shared.state = PlaybackState::Idle;
            shared.listeners.clear();
        }
        let (ack, done) = oneshot::channel();
        if self.command(Command::Release { ack }).is_ok() {
            let _ = done.await;
        }
        info!("Simulated engine released");
    }

    async fn send_messages(&self, messages: Vec<EngineMessage>) -> EngineResult<()> {
        let mut shared = self.shared();
        shared.check()?;
        shared.batches.push(MessageBatch {
            blocking: false,
            messages: messages.clone(),
        });
        self.command(Command::Deliver {
            messages,
            ack: None,
        })
    }

    async fn blocking_send_messages(&self, messages: Vec<EngineMessage>) -> EngineResult<()> {
        let (ack, done) = oneshot::channel();
        {
            let mut shared = self.shared();
            shared.check()?;
            shared.batches.push(MessageBatch {
                blocking: true,
                messages: messages.clone(),
            });
            self.command(Command::Deliver {
                messages,
                ack: Some(ack),
            })?;
        }
        done.await.map_err(|_| EngineError::Released)?
    }

    fn add_listener(&self, sink: EventSink) -> ListenerId {
        let mut shared = self.shared();
        shared.next_listener += 1;
        let id = ListenerId(shared.next_listener);
        shared.listeners.push((id, sink));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.shared().listeners.retain(|(listener, _)| *listener != id);
    }

    fn playback_state(&self) -> PlaybackState {
        self.shared().state
    }

    fn play_when_ready(&self) -> bool {
        self.shared().play_when_ready
    }

    fn position_ms(&self) -> EngineResult<Option<i64>> {
        let shared = self.shared();
        if shared.released {
            return Err(EngineError::Released);
        }
        Ok(shared.prepared.then_some(shared.position_ms))
    }

    fn duration_ms(&self) -> EngineResult<Option<i64>> {
        let shared = self.shared();
        if shared.released {
            return Err(EngineError::Released);
        }
        Ok((shared.prepared && shared.duration_known).then_some(self.config.duration_ms))
    }

    fn buffered_percentage(&self) -> EngineResult<u8> {
        let shared = self.shared();
        if shared.released {
            return Err(EngineError::Released);
        }
        Ok(if shared.prepared && shared.duration_known { 100 } else { 0 })
    }
}

async fn drive(mut renderers: Vec<Box<dyn Renderer>>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut enabled = vec![false; renderers.len()];

    while let Some(command) = commands.recv().await {
        match command {
            Command::Enable => select_tracks(&mut renderers, &mut enabled),
            Command::Disable => disable_all(&mut renderers, &mut enabled),
            Command::Deliver { messages, ack } => {
                let result = deliver(&mut renderers, messages);
                match ack {
                    Some(ack) => {
                        let _ = ack.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            warn!(error = %e, "Message delivery failed");
                        }
                    }
                }
            }
            Command::Release { ack } => {
                disable_all(&mut renderers, &mut enabled);
                let _ = ack.send(());
                break;
            }
        }
    }
    debug!("Simulated engine task finished");
}

/// Enable the first renderer of each track type that accepts
fn select_tracks(renderers: &mut [Box<dyn Renderer>], enabled: &mut [bool]) {
    for track_type in [TrackType::Video, TrackType::Audio, TrackType::Text, TrackType::Metadata] {
        if renderers
            .iter()
            .zip(enabled.iter())
            .any(|(r, on)| *on && r.track_type() == track_type)
        {
            continue;
        }
        for (index, renderer) in renderers.iter_mut().enumerate() {
            if renderer.track_type() != track_type {
                continue;
            }
            match renderer.enable() {
                Ok(()) => {
                    debug!(renderer = renderer.name(), "Renderer enabled");
                    enabled[index] = true;
                    break;
                }
                Err(e) => debug!(renderer = renderer.name(), error = %e, "Renderer declined track"),
            }
        }
    }
}

fn disable_all(renderers: &mut [Box<dyn Renderer>], enabled: &mut [bool]) {
    for (renderer, on) in renderers.iter_mut().zip(enabled.iter_mut()) {
        if *on {
            renderer.disable();
            *on = false;
        }
    }
}

fn deliver(renderers: &mut [Box<dyn Renderer>], messages: Vec<EngineMessage>) -> EngineResult<()> {
    let mut outcome = Ok(());
    for EngineMessage { target, message } in messages {
        let result = match renderers.get_mut(target.0) {
            Some(renderer) => renderer.handle_message(message),
            None => Err(EngineError::Failed(format!("no {}", target))),
        };
        if outcome.is_ok() {
            outcome = result;
        }
    }
    outcome
}

/// Renderer that logs messages and emits plausible events
pub struct SimRenderer {
    name: String,
    track_type: TrackType,
    enabled: bool,
    surface: Option<SurfaceHandle>,
    bind_generation: u64,
    first_frame_generation: Option<u64>,
    counters: DecoderCounters,
    events: RendererEventSink,
    log: Arc<Mutex<Vec<RendererLogEntry>>>,
}

impl SimRenderer {
    pub fn new(name: impl Into<String>, track_type: TrackType, ctx: &RendererContext) -> Self {
        Self::with_log(name, track_type, ctx, Arc::default())
    }

    pub fn with_log(
        name: impl Into<String>,
        track_type: TrackType,
        ctx: &RendererContext,
        log: Arc<Mutex<Vec<RendererLogEntry>>>,
    ) -> Self {
        Self {
            name: name.into(),
            track_type,
            enabled: false,
            surface: None,
            bind_generation: 0,
            first_frame_generation: None,
            counters: DecoderCounters::default(),
            events: ctx.events.clone(),
            log,
        }
    }

    fn input_format(&self) -> MediaFormat {
        match self.track_type {
            TrackType::Video => MediaFormat::video("video/avc", 1280, 720),
            TrackType::Audio => MediaFormat::audio("audio/mp4a-latm", 2, 48_000),
            TrackType::Text => MediaFormat {
                sample_mime_type: Some("text/vtt".to_string()),
                ..Default::default()
            },
            TrackType::Metadata => MediaFormat {
                sample_mime_type: Some("application/id3".to_string()),
                ..Default::default()
            },
        }
    }

    fn maybe_render_first_frame(&mut self) {
        if !self.enabled || self.track_type != TrackType::Video {
            return;
        }
        let Some(surface) = &self.surface else {
            return;
        };
        if self.first_frame_generation == Some(self.bind_generation) {
            return;
        }
        self.first_frame_generation = Some(self.bind_generation);
        self.counters.rendered_output_buffers += 1;
        self.events.emit(RendererEvent::RenderedFirstFrame {
            surface: surface.id(),
            bind_generation: self.bind_generation,
        });
    }
}

impl Renderer for SimRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn track_type(&self) -> TrackType {
        self.track_type
    }

    fn enable(&mut self) -> EngineResult<()> {
        self.enabled = true;
        self.counters.decoder_inits += 1;
        self.events.emit(RendererEvent::Enabled {
            track_type: self.track_type,
            counters: self.counters,
        });
        self.events.emit(RendererEvent::DecoderInitialized {
            track_type: self.track_type,
            decoder_name: self.name.clone(),
            init_duration_ms: 12,
        });
        self.events.emit(RendererEvent::InputFormatChanged {
            track_type: self.track_type,
            format: self.input_format(),
        });
        match self.track_type {
            TrackType::Video => {
                self.events.emit(RendererEvent::VideoSizeChanged(VideoSize {
                    width: 1280,
                    height: 720,
                    unapplied_rotation_degrees: 0,
                    pixel_aspect_ratio: 1.0,
                }));
                self.maybe_render_first_frame();
            }
            TrackType::Audio => self.events.emit(RendererEvent::AudioSessionId(1)),
            _ => {}
        }
        Ok(())
    }

    fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.counters.decoder_releases += 1;
        self.events.emit(RendererEvent::Disabled {
            track_type: self.track_type,
            counters: self.counters,
        });
    }

    fn handle_message(&mut self, message: RendererMessage) -> EngineResult<()> {
        lock(&self.log).push(RendererLogEntry {
            renderer: self.name.clone(),
            track_type: self.track_type,
            message: message.clone(),
        });
        if let RendererMessage::SetSurface {
            surface,
            bind_generation,
        } = message
        {
            self.surface = surface;
            self.bind_generation = bind_generation;
            self.maybe_render_first_frame();
        }
        Ok(())
    }
}

/// Output surface that counts releases
#[derive(Debug, Default)]
pub struct RecordingSurface {
    releases: AtomicUsize,
}

impl RecordingSurface {
    /// A fresh surface and a handle to it
    pub fn create() -> (SurfaceHandle, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        (SurfaceHandle::from_arc(surface.clone()), surface)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl OutputSurface for RecordingSurface {
    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Surface provider driven by hand
#[derive(Debug)]
pub struct SimSurfaceProvider {
    owns: bool,
    current: Mutex<Option<SurfaceHandle>>,
    sink: Mutex<Option<SurfaceEventSink>>,
}

impl SimSurfaceProvider {
    pub fn new(owns: bool) -> Self {
        Self {
            owns,
            current: Mutex::new(None),
            sink: Mutex::new(None),
        }
    }

    /// Create a surface and announce it to the attached session
    pub fn create_surface(&self) -> (SurfaceHandle, Arc<RecordingSurface>) {
        let (handle, surface) = RecordingSurface::create();
        *lock(&self.current) = Some(handle.clone());
        if let Some(sink) = lock(&self.sink).as_ref() {
            sink.emit(SurfaceLifecycle::Available(handle.clone()));
        }
        (handle, surface)
    }

    /// Drop the current surface and announce it
    pub fn destroy_surface(&self) {
        *lock(&self.current) = None;
        if let Some(sink) = lock(&self.sink).as_ref() {
            sink.emit(SurfaceLifecycle::Destroyed);
        }
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.sink).is_some()
    }
}

impl SurfaceProvider for SimSurfaceProvider {
    fn current(&self) -> Option<SurfaceHandle> {
        lock(&self.current).clone()
    }

    fn owns_surfaces(&self) -> bool {
        self.owns
    }

    fn attach(&self, sink: SurfaceEventSink) {
        *lock(&self.sink) = Some(sink);
    }

    fn detach(&self) {
        *lock(&self.sink) = None;
    }
}
