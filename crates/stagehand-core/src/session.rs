//! Playback Session - per-session facade
//!
//! Coordinates:
//! - Content resolution and renderer/source/engine construction
//! - Surface binding and hand-off
//! - Seek coalescing
//! - Audio settings fan-out to renderers
//! - Event dispatch and state publication
//!
//! Every command and accessor runs under one async mutex. Engine, renderer
//! and surface-provider events are folded in by a single dispatcher task.

use crate::{
    affinity::AffinityContext,
    config::SessionConfig,
    engine::{EngineEvent, EngineFactory, EngineMessage, FailureKind, ListenerId, PlaybackEngine},
    error::{EngineError, ErrorReport},
    events::{Dispatch, EventBus, PlayerEvent, PlayerEventRecord},
    focus::{AudioFocus, FocusRequest, NoopAudioFocus},
    registry::{renderer_ids, RendererRegistry},
    renderer::{RendererContext, RendererDescriptor, RendererEvent, RendererEventSink, RendererId, RendererMessage},
    resolver::{ContentTypeResolver, ResolvedContent},
    seek::{SeekCoordinator, SeekDecision, SeekTarget},
    source::{DefaultMediaSourceFactory, MediaSource, MediaSourceFactory, SourceRequest},
    surface::{SurfaceBinder, SurfaceHandle, SurfaceProvider, VideoTargets},
    types::*,
    Error, Result,
};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Builder for `PlaybackSession`
pub struct SessionBuilder {
    config: SessionConfig,
    registry: RendererRegistry,
    engine_factory: Arc<dyn EngineFactory>,
    source_factory: Arc<dyn MediaSourceFactory>,
    audio_focus: Arc<dyn AudioFocus>,
    affinity: Option<AffinityContext>,
}

impl SessionBuilder {
    pub fn new(registry: RendererRegistry, engine_factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            config: SessionConfig::default(),
            registry,
            engine_factory,
            source_factory: Arc::new(DefaultMediaSourceFactory),
            audio_focus: Arc::new(NoopAudioFocus),
            affinity: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn source_factory(mut self, factory: Arc<dyn MediaSourceFactory>) -> Self {
        self.source_factory = factory;
        self
    }

    pub fn audio_focus(mut self, focus: Arc<dyn AudioFocus>) -> Self {
        self.audio_focus = focus;
        self
    }

    /// Share an existing engine context instead of starting one
    pub fn affinity_context(mut self, context: AffinityContext) -> Self {
        self.affinity = Some(context);
        self
    }

    /// Validate the configuration and start the session's dispatcher
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<PlaybackSession> {
        self.config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::InvalidConfig(format!("session requires a tokio runtime: {}", e)))?;
        let affinity = match self.affinity {
            Some(context) => context,
            None => AffinityContext::spawn("stagehand-engine")?,
        };

        let id = SessionId::new();
        let events = Arc::new(EventBus::new(id, self.config.event_capacity));
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let inner = SessionInner {
            id,
            volume: self.config.initial_volume,
            stream_route: self.config.stream_route,
            scaling_mode: self.config.scaling_mode,
            extension_mode: self.config.extension_mode,
            config: self.config,
            registry: self.registry,
            engine_factory: self.engine_factory,
            source_factory: self.source_factory,
            audio_focus: self.audio_focus,
            focus_held: false,
            affinity,
            resolver: ContentTypeResolver::new(),
            events: events.clone(),
            state_tx,
            state: SessionState::Idle,
            play_when_ready: false,
            binder: SurfaceBinder::new(dispatch_tx.clone()),
            dispatch_tx,
            generation: 0,
            active: None,
            seeks: SeekCoordinator::new(),
            playback_params: None,
            last_error: None,
            finished: false,
            failed: false,
            media: MediaInfo::default(),
        };
        let inner = Arc::new(Mutex::new(inner));
        let dispatcher = runtime.spawn(run_dispatcher(Arc::downgrade(&inner), dispatch_rx));

        info!(session = %id, "Playback session created");
        Ok(PlaybackSession {
            id,
            inner,
            events,
            dispatcher,
        })
    }
}

/// Playback session facade
///
/// Call `release()` before dropping; dropping only stops event dispatch.
pub struct PlaybackSession {
    id: SessionId,
    inner: Arc<Mutex<SessionInner>>,
    events: Arc<EventBus>,
    dispatcher: JoinHandle<()>,
}

impl PlaybackSession {
    pub fn builder(registry: RendererRegistry, engine_factory: Arc<dyn EngineFactory>) -> SessionBuilder {
        SessionBuilder::new(registry, engine_factory)
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Subscribe to player events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEventRecord> {
        self.events.subscribe()
    }

    /// Subscribe to state changes
    pub async fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.lock().await.state_tx.subscribe()
    }

    /// Resolve, construct and start preparing `locator`
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn prepare(&self, locator: &str) -> Result<()> {
        self.inner.lock().await.prepare(locator).await
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn play(&self) -> Result<()> {
        self.inner.lock().await.set_play_when_ready(true).await
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn pause(&self) -> Result<()> {
        self.inner.lock().await.set_play_when_ready(false).await
    }

    /// Pause if playing, play otherwise; returns the new play-when-ready flag
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn toggle_playing(&self) -> Result<bool> {
        let inner = self.inner.lock().await;
        let playing = inner.is_playing();
        inner.set_play_when_ready(!playing).await?;
        Ok(inner
            .active
            .as_ref()
            .map(|active| active.engine.play_when_ready())
            .unwrap_or(false))
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn stop(&self) -> Result<()> {
        self.inner.lock().await.stop().await;
        Ok(())
    }

    /// Stop and also drop the surface and any surface provider
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn release(&self) -> Result<()> {
        self.inner.lock().await.release().await;
        Ok(())
    }

    /// Seek to an absolute position (milliseconds)
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn seek(&self, position_ms: i64) -> Result<()> {
        self.inner.lock().await.seek(|_| position_ms).await
    }

    /// Seek relative to the most recently requested or current position
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn seek_by(&self, delta_ms: i64) -> Result<()> {
        self.inner
            .lock()
            .await
            .seek(|base| base.saturating_add(delta_ms))
            .await
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn set_surface(&self, surface: SurfaceHandle, owns: bool) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let targets = inner.active.as_ref().map(ActiveSession::video_targets);
        inner.binder.bind(targets, Some(surface), owns).await
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn clear_surface(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let targets = inner.active.as_ref().map(ActiveSession::video_targets);
        inner.binder.unbind(targets).await
    }

    /// Follow a surface provider's lifecycle
    #[instrument(skip(self, provider), fields(session = %self.id))]
    pub async fn attach_surface_provider(&self, provider: Arc<dyn SurfaceProvider>) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let targets = inner.active.as_ref().map(ActiveSession::video_targets);
        inner.binder.attach_provider(targets, provider).await
    }

    /// Set output volume, clamped to [0, 1]
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        inner.volume = volume;
        inner
            .send_to(TrackType::Audio, RendererMessage::SetVolume(volume), false)
            .await
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn set_stream_route(&self, route: StreamRoute) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let changed = inner.stream_route != route;
        inner.stream_route = route;
        inner
            .send_to(TrackType::Audio, RendererMessage::SetStreamRoute(route), changed)
            .await
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn set_video_scaling_mode(&self, mode: ScalingMode) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.scaling_mode = mode;
        inner
            .send_to(TrackType::Video, RendererMessage::SetScalingMode(mode), false)
            .await
    }

    /// Set speed/pitch; `None` restores defaults
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn set_playback_params(&self, params: Option<PlaybackParams>) -> Result<()> {
        if let Some(p) = params {
            if !(p.speed > 0.0 && p.pitch > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "playback speed and pitch must be positive, got {} / {}",
                    p.speed, p.pitch
                )));
            }
        }
        let mut inner = self.inner.lock().await;
        inner.playback_params = params;
        inner
            .send_to(TrackType::Audio, RendererMessage::SetPlaybackParams(params), false)
            .await
    }

    /// Takes effect at the next `prepare`
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn set_extension_mode(&self, mode: ExtensionMode) {
        let mut inner = self.inner.lock().await;
        info!(from = %inner.extension_mode, to = %mode, "Extension mode changed");
        inner.extension_mode = mode;
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Current position; 0 when unknown
    pub async fn position(&self) -> i64 {
        let inner = self.inner.lock().await;
        inner
            .query(|engine| engine.position_ms())
            .flatten()
            .unwrap_or(0)
    }

    /// Media duration, when known
    pub async fn duration(&self) -> Option<i64> {
        let inner = self.inner.lock().await;
        inner.query(|engine| engine.duration_ms()).flatten()
    }

    pub async fn buffered_percentage(&self) -> u8 {
        let inner = self.inner.lock().await;
        inner
            .query(|engine| engine.buffered_percentage())
            .unwrap_or(0)
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.lock().await.is_playing()
    }

    pub async fn last_error(&self) -> Option<ErrorReport> {
        self.inner.lock().await.last_error.clone()
    }

    /// Playback ended, was stopped, or failed
    pub async fn is_playback_finished(&self) -> bool {
        self.inner.lock().await.finished
    }

    pub async fn had_playback_error(&self) -> bool {
        self.inner.lock().await.failed
    }

    pub async fn volume(&self) -> f32 {
        self.inner.lock().await.volume
    }

    pub async fn stream_route(&self) -> StreamRoute {
        self.inner.lock().await.stream_route
    }

    pub async fn video_scaling_mode(&self) -> ScalingMode {
        self.inner.lock().await.scaling_mode
    }

    pub async fn playback_params(&self) -> Option<PlaybackParams> {
        self.inner.lock().await.playback_params
    }

    pub async fn extension_mode(&self) -> ExtensionMode {
        self.inner.lock().await.extension_mode
    }

    /// Ordered renderer set of the current session
    pub async fn renderers(&self) -> Vec<RendererDescriptor> {
        self.inner
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.descriptors.clone())
            .unwrap_or_default()
    }

    /// Resolution of the current locator
    pub async fn content(&self) -> Option<ResolvedContent> {
        self.inner
            .lock()
            .await
            .active
            .as_ref()
            .map(|active| active.content.clone())
    }

    pub async fn current_surface(&self) -> Option<SurfaceHandle> {
        self.inner.lock().await.binder.current().cloned()
    }

    pub async fn video_format(&self) -> Option<MediaFormat> {
        self.inner.lock().await.media.video_format.clone()
    }

    pub async fn audio_format(&self) -> Option<MediaFormat> {
        self.inner.lock().await.media.audio_format.clone()
    }

    pub async fn video_decoder_counters(&self) -> Option<DecoderCounters> {
        self.inner.lock().await.media.video_counters
    }

    pub async fn audio_decoder_counters(&self) -> Option<DecoderCounters> {
        self.inner.lock().await.media.audio_counters
    }

    pub async fn audio_session_id(&self) -> Option<i32> {
        self.inner.lock().await.media.audio_session_id
    }

    pub async fn video_size(&self) -> Option<VideoSize> {
        self.inner.lock().await.media.video_size
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession").field("id", &self.id).finish()
    }
}

/// Media facts reported by renderers
#[derive(Debug, Default)]
struct MediaInfo {
    video_format: Option<MediaFormat>,
    audio_format: Option<MediaFormat>,
    video_counters: Option<DecoderCounters>,
    audio_counters: Option<DecoderCounters>,
    audio_session_id: Option<i32>,
    video_size: Option<VideoSize>,
}

/// Engine plus renderer layout of one prepared locator
struct ActiveSession {
    engine: Arc<dyn PlaybackEngine>,
    listener: ListenerId,
    forwarder: JoinHandle<()>,
    descriptors: Vec<RendererDescriptor>,
    video: Vec<RendererId>,
    audio: Vec<RendererId>,
    content: ResolvedContent,
}

impl ActiveSession {
    fn video_targets(&self) -> VideoTargets<'_> {
        VideoTargets {
            engine: self.engine.as_ref(),
            renderers: &self.video,
        }
    }

    fn targets(&self, track_type: TrackType) -> &[RendererId] {
        match track_type {
            TrackType::Video => &self.video,
            TrackType::Audio => &self.audio,
            TrackType::Text | TrackType::Metadata => &[],
        }
    }
}

/// Result of the construction job
struct Constructed {
    engine: Arc<dyn PlaybackEngine>,
    source: Box<dyn MediaSource>,
    descriptors: Vec<RendererDescriptor>,
}

struct SessionInner {
    id: SessionId,
    config: SessionConfig,
    registry: RendererRegistry,
    engine_factory: Arc<dyn EngineFactory>,
    source_factory: Arc<dyn MediaSourceFactory>,
    audio_focus: Arc<dyn AudioFocus>,
    focus_held: bool,
    affinity: AffinityContext,
    resolver: ContentTypeResolver,
    events: Arc<EventBus>,
    state_tx: watch::Sender<SessionState>,
    state: SessionState,
    play_when_ready: bool,
    dispatch_tx: mpsc::UnboundedSender<Dispatch>,
    /// Bumped on every prepare and teardown; events carry the generation
    /// that produced them
    generation: u64,
    active: Option<ActiveSession>,
    binder: SurfaceBinder,
    seeks: SeekCoordinator,
    volume: f32,
    stream_route: StreamRoute,
    scaling_mode: ScalingMode,
    playback_params: Option<PlaybackParams>,
    extension_mode: ExtensionMode,
    last_error: Option<ErrorReport>,
    finished: bool,
    failed: bool,
    media: MediaInfo,
}

impl SessionInner {
    async fn prepare(&mut self, locator: &str) -> Result<()> {
        let content = match self.resolver.resolve(locator).require_known() {
            Ok(content) => content,
            Err(e) => {
                warn!(locator, "Cannot determine content type");
                self.record_error(&e, false);
                return Err(e);
            }
        };
        info!(session = %self.id, locator, content_type = %content.content_type, "Preparing");

        self.teardown_engine().await;
        self.failed = false;
        self.finished = false;
        self.last_error = None;
        // Engine state events are ignored while Failed
        self.set_state(SessionState::Idle);

        match self.audio_focus.request() {
            FocusRequest::Granted => self.focus_held = true,
            FocusRequest::Failed => warn!("Audio focus request failed"),
        }

        self.generation += 1;
        let generation = self.generation;

        let drm = content.drm_hints();
        let ctx = RendererContext {
            content_type: content.content_type,
            drm: drm.clone(),
            events: RendererEventSink::new(generation, self.dispatch_tx.clone()),
            allowed_video_joining_time_ms: self.config.allowed_video_joining_time_ms,
            max_dropped_frames_to_notify: self.config.max_dropped_frames_to_notify,
        };
        let request = SourceRequest {
            locator: locator.to_string(),
            content_type: content.content_type,
            drm,
            user_agent: self.config.user_agent.clone(),
        };
        let mode = self.extension_mode;
        let registry = self.registry.clone();
        let engine_factory = self.engine_factory.clone();
        let source_factory = self.source_factory.clone();

        let wait = Duration::from_millis(self.config.construction_timeout_ms);
        let constructed = self
            .affinity
            .run(wait, move || -> Result<Constructed> {
                let set = registry.build(&ctx, mode)?;
                let source = source_factory.create(&request)?;
                let engine = engine_factory
                    .create(set.renderers)
                    .map_err(|e| Error::construction(format!("engine: {}", e)))?;
                Ok(Constructed {
                    engine,
                    source,
                    descriptors: set.descriptors,
                })
            })
            .await
            .and_then(|constructed| constructed);

        let Constructed {
            engine,
            source,
            descriptors,
        } = match constructed {
            Ok(constructed) => constructed,
            Err(e) => return Err(self.fail_prepare(e).await),
        };

        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let listener = engine.add_listener(engine_tx);
        let forwarder = tokio::spawn(forward_engine_events(
            generation,
            engine_rx,
            self.dispatch_tx.clone(),
        ));
        debug!(renderers = descriptors.len(), "Session constructed");

        self.active = Some(ActiveSession {
            engine: engine.clone(),
            listener,
            forwarder,
            video: renderer_ids(&descriptors, TrackType::Video),
            audio: renderer_ids(&descriptors, TrackType::Audio),
            descriptors,
            content,
        });

        if let Err(e) = self.start(engine, source).await {
            return Err(self.fail_prepare(e).await);
        }
        Ok(())
    }

    /// Prepare the engine and deliver the session's settings to it
    async fn start(&mut self, engine: Arc<dyn PlaybackEngine>, source: Box<dyn MediaSource>) -> Result<()> {
        engine.prepare(source).await?;

        if let Some(active) = &self.active {
            self.binder.rebind_current(active.video_targets()).await?;

            let mut messages = EngineMessage::broadcast(
                &active.audio,
                RendererMessage::SetVolume(self.volume),
            );
            messages.extend(EngineMessage::broadcast(
                &active.audio,
                RendererMessage::SetStreamRoute(self.stream_route),
            ));
            if self.playback_params.is_some() {
                messages.extend(EngineMessage::broadcast(
                    &active.audio,
                    RendererMessage::SetPlaybackParams(self.playback_params),
                ));
            }
            messages.extend(EngineMessage::broadcast(
                &active.video,
                RendererMessage::SetScalingMode(self.scaling_mode),
            ));
            engine.send_messages(messages).await?;
        }

        engine.set_play_when_ready(self.config.auto_play).await?;
        Ok(())
    }

    async fn fail_prepare(&mut self, err: Error) -> Error {
        error!(error = %err, code = err.error_code(), "Prepare failed");
        self.teardown_engine().await;
        self.binder.teardown(true);
        self.record_error(&err, true);
        self.failed = true;
        self.finished = true;
        self.set_state(SessionState::Failed);
        err
    }

    /// Release the engine and audio focus; the surface slot is untouched
    async fn teardown_engine(&mut self) -> bool {
        let had_session = match self.active.take() {
            Some(active) => {
                active.engine.remove_listener(active.listener);
                active.engine.release().await;
                active.forwarder.abort();
                self.generation += 1;
                true
            }
            None => false,
        };
        self.seeks.reset();
        self.media = MediaInfo::default();
        if self.focus_held {
            self.audio_focus.abandon();
            self.focus_held = false;
        }
        had_session
    }

    async fn stop(&mut self) {
        let had_session = self.teardown_engine().await;
        self.binder.teardown(true);
        if had_session || self.state != SessionState::Idle {
            info!("Playback stopped");
            self.failed = false;
            self.finished = true;
            self.play_when_ready = false;
            self.set_state(SessionState::Idle);
        }
    }

    async fn release(&mut self) {
        self.stop().await;
        self.binder.teardown(false);
    }

    async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()> {
        let Some(active) = &self.active else {
            debug!(play_when_ready, "No session, ignoring");
            return Ok(());
        };
        recover(active.engine.set_play_when_ready(play_when_ready).await, "set_play_when_ready")
    }

    fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|active| {
            active.engine.play_when_ready() && active.engine.playback_state() == PlaybackState::Ready
        })
    }

    /// Run a getter; `None` without a session or on a state-class rejection
    fn query<T>(&self, getter: impl FnOnce(&dyn PlaybackEngine) -> std::result::Result<T, EngineError>) -> Option<T> {
        let active = self.active.as_ref()?;
        match getter(active.engine.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Engine getter rejected");
                None
            }
        }
    }

    async fn seek(&mut self, target: impl FnOnce(i64) -> i64) -> Result<()> {
        let Some(active) = &self.active else {
            return Err(Error::InvalidSessionState("seek without a prepared session".to_string()));
        };
        let engine = active.engine.clone();

        let timeline = engine
            .position_ms()
            .and_then(|position| engine.duration_ms().map(|duration| (position, duration)));
        let (position, duration) = match timeline {
            Ok((Some(position), Some(duration))) => (position, duration),
            Ok(_) => {
                return Err(Error::InvalidSessionState(
                    "seek before position and duration are known".to_string(),
                ))
            }
            Err(e) if e.is_illegal_state() => {
                warn!(error = %e, "Seek ignored");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let base = self.seeks.last_requested().unwrap_or(position);
        let target = SeekTarget::clamp(target(base), duration);

        match self.seeks.request(target.position_ms) {
            SeekDecision::Issue(position_ms) => {
                info!(position_ms, "Seeking");
                if let Err(e) = engine.seek_to(position_ms).await {
                    self.seeks.reset();
                    recover(Err(e), "seek_to")?;
                }
            }
            SeekDecision::Coalesced { superseded } => {
                debug!(position_ms = target.position_ms, ?superseded, "Seek coalesced");
            }
        }

        if target.reached_end {
            info!(duration_ms = duration, "Seek reached end, pausing");
            recover(engine.set_play_when_ready(false).await, "set_play_when_ready")?;
        }
        Ok(())
    }

    /// Deliver one message to every renderer of a track type
    async fn send_to(&self, track_type: TrackType, message: RendererMessage, blocking: bool) -> Result<()> {
        let Some(active) = &self.active else {
            return Ok(());
        };
        let label = message.label();
        let messages = EngineMessage::broadcast(active.targets(track_type), message);
        debug!(message = label, count = messages.len(), blocking, "Dispatching renderer messages");
        let sent = if blocking {
            active.engine.blocking_send_messages(messages).await
        } else {
            active.engine.send_messages(messages).await
        };
        recover(sent, label)
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        let from = self.state;
        if !from.can_transition_to(state) {
            warn!(from = %from, to = %state, "Unexpected state transition");
        }
        self.state = state;
        self.state_tx.send_replace(state);
        info!(from = %from, to = %state, "State transition");
        self.events.publish(PlayerEvent::StateChanged {
            from,
            to: state,
            play_when_ready: self.play_when_ready,
        });
    }

    fn record_error(&mut self, err: &Error, fatal: bool) {
        let report = err.report(fatal);
        self.last_error = Some(report.clone());
        self.events.publish(PlayerEvent::Error { report });
    }

    async fn handle_dispatch(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Engine { generation, event } => {
                if generation != self.generation || self.active.is_none() {
                    debug!(generation, current = self.generation, "Dropping stale engine event");
                    return;
                }
                self.on_engine_event(event).await;
            }
            Dispatch::Renderer { generation, event } => {
                if generation != self.generation || self.active.is_none() {
                    debug!(generation, current = self.generation, "Dropping stale renderer event");
                    return;
                }
                self.on_renderer_event(event);
            }
            Dispatch::Surface { epoch, event } => {
                let targets = self.active.as_ref().map(ActiveSession::video_targets);
                if let Err(e) = self.binder.on_provider_event(targets, epoch, event).await {
                    warn!(error = %e, "Surface provider event failed");
                }
            }
        }
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged {
                play_when_ready,
                state,
            } => {
                if self.state == SessionState::Failed {
                    debug!(state = %state, "Ignoring engine state while failed");
                    return;
                }
                let pwr_changed = self.play_when_ready != play_when_ready;
                self.play_when_ready = play_when_ready;
                let state = SessionState::from(state);
                if state == SessionState::Ended {
                    self.finished = true;
                }
                if state != self.state {
                    self.set_state(state);
                } else if pwr_changed {
                    self.events.publish(PlayerEvent::StateChanged {
                        from: state,
                        to: state,
                        play_when_ready,
                    });
                }
            }
            EngineEvent::SeekProcessed => {
                let Some(engine) = self.active.as_ref().map(|active| active.engine.clone()) else {
                    return;
                };
                match self.seeks.on_seek_processed() {
                    Some(next) => {
                        debug!(position_ms = next, "Issuing pending seek");
                        if let Err(e) = engine.seek_to(next).await {
                            warn!(error = %e, "Pending seek rejected");
                            self.seeks.reset();
                        }
                    }
                    None => {
                        let position_ms = engine.position_ms().ok().flatten().unwrap_or(0);
                        self.events.publish(PlayerEvent::SeekProcessed { position_ms });
                    }
                }
            }
            EngineEvent::LoadingChanged(loading) => {
                self.events.publish(PlayerEvent::LoadingChanged { loading });
            }
            EngineEvent::Error { failure, fatal } => {
                let err = match failure.kind {
                    FailureKind::Drm(reason) => Error::Drm {
                        reason,
                        message: failure.message,
                    },
                    _ => Error::Playback(failure.message),
                };
                if fatal {
                    error!(error = %err, "Playback failed");
                    self.record_error(&err, true);
                    self.failed = true;
                    self.finished = true;
                    self.set_state(SessionState::Failed);
                } else {
                    warn!(error = %err, "Recoverable playback error");
                    self.record_error(&err, false);
                }
            }
        }
    }

    fn on_renderer_event(&mut self, event: RendererEvent) {
        match event {
            RendererEvent::Enabled {
                track_type,
                counters,
            } => match track_type {
                TrackType::Video => self.media.video_counters = Some(counters),
                TrackType::Audio => self.media.audio_counters = Some(counters),
                _ => {}
            },
            RendererEvent::Disabled { track_type, .. } => match track_type {
                TrackType::Video => {
                    self.media.video_counters = None;
                    self.media.video_format = None;
                    self.media.video_size = None;
                }
                TrackType::Audio => {
                    self.media.audio_counters = None;
                    self.media.audio_format = None;
                    self.media.audio_session_id = None;
                }
                _ => {}
            },
            RendererEvent::DecoderInitialized {
                track_type,
                decoder_name,
                init_duration_ms,
            } => {
                debug!(track = %track_type, decoder = %decoder_name, "Decoder initialized");
                self.events.publish(PlayerEvent::DecoderInitialized {
                    track_type,
                    decoder_name,
                    init_duration_ms,
                });
            }
            RendererEvent::InputFormatChanged { track_type, format } => match track_type {
                TrackType::Video => self.media.video_format = Some(format),
                TrackType::Audio => self.media.audio_format = Some(format),
                _ => {}
            },
            RendererEvent::VideoSizeChanged(size) => {
                self.media.video_size = Some(size);
                self.events.publish(PlayerEvent::VideoSizeChanged { size });
            }
            RendererEvent::RenderedFirstFrame {
                surface,
                bind_generation,
            } => {
                if self.binder.on_rendered_first_frame(surface, bind_generation) {
                    info!(surface = %surface, "Rendered first frame");
                    self.events.publish(PlayerEvent::RenderedFirstFrame { surface });
                }
            }
            RendererEvent::DroppedFrames { count, elapsed_ms } => {
                if let Some(counters) = self.media.video_counters.as_mut() {
                    counters.dropped_output_buffers += u64::from(count);
                }
                self.events
                    .publish(PlayerEvent::DroppedFrames { count, elapsed_ms });
            }
            RendererEvent::AudioSessionId(audio_session_id) => {
                self.media.audio_session_id = Some(audio_session_id);
                self.events
                    .publish(PlayerEvent::AudioSessionId { audio_session_id });
            }
            RendererEvent::AudioUnderrun {
                buffer_size,
                buffer_size_ms,
                elapsed_since_last_feed_ms,
            } => {
                warn!(buffer_size, elapsed_since_last_feed_ms, "Audio underrun");
                self.events.publish(PlayerEvent::AudioUnderrun {
                    buffer_size,
                    buffer_size_ms,
                    elapsed_since_last_feed_ms,
                });
            }
            RendererEvent::Cues(cues) => {
                self.events.publish(PlayerEvent::Cues { cues });
            }
            RendererEvent::Metadata(entries) => {
                self.events.publish(PlayerEvent::Metadata { entries });
            }
        }
    }
}

/// Log and swallow state-class engine rejections
fn recover(result: std::result::Result<(), EngineError>, command: &str) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_illegal_state() => {
            warn!(command, error = %e, "Engine rejected command");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn forward_engine_events(
    generation: u64,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    dispatch: mpsc::UnboundedSender<Dispatch>,
) {
    while let Some(event) = events.recv().await {
        if dispatch.send(Dispatch::Engine { generation, event }).is_err() {
            break;
        }
    }
}

async fn run_dispatcher(inner: Weak<Mutex<SessionInner>>, mut dispatch: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(item) = dispatch.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let mut inner = inner.lock().await;
        inner.handle_dispatch(item).await;
    }
    debug!("Session dispatcher stopped");
}
