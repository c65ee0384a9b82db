//! Integration tests for Stagehand Core

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use stagehand_core::engine::sim::{
    RecordingSurface, SimBackend, SimConfig, SimRenderer, SimSurfaceProvider,
};
use stagehand_core::engine::{EngineFailure, FailureKind};
use stagehand_core::focus::TrackingAudioFocus;
use stagehand_core::renderer::RendererContext;
use stagehand_core::registry::{CoreConstructor, ExtensionError};
use stagehand_core::{
    ContentType, ContentTypeResolver, DrmReason, EngineError, Error, ExtensionMode, ExtensionTable,
    PlaybackEngine, PlaybackSession, PlayerEvent, PlayerEventRecord, Renderer, RendererKind, RendererMessage,
    RendererRegistry, SessionBuilder, SessionConfig, SessionState, StreamRoute, TrackType,
};
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

// =============================================================================
// Helpers
// =============================================================================

fn session_with(backend: &SimBackend, extensions: &[&str], config: SessionConfig) -> PlaybackSession {
    SessionBuilder::new(backend.registry(extensions).unwrap(), backend.engine_factory())
        .config(config)
        .build()
        .unwrap()
}

fn session(backend: &SimBackend) -> PlaybackSession {
    session_with(backend, &[], SessionConfig::default())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

async fn wait_for_state(session: &PlaybackSession, state: SessionState) {
    let mut rx = session.watch_state().await;
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| *s == state))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

fn drain(rx: &mut broadcast::Receiver<PlayerEventRecord>) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    while let Ok(record) = rx.try_recv() {
        events.push(record.event);
    }
    events
}

const MOVIE: &str = "https://cdn.example.com/vod/movie.mp4?token=abc";

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_every_extension_resolves_regardless_of_query() {
    let resolver = ContentTypeResolver::new();
    let table = [
        ("mpd", ContentType::Dash),
        ("ism", ContentType::SmoothStreaming),
        ("m3u8", ContentType::Hls),
        ("m4a", ContentType::Mp4),
        ("mp4", ContentType::Mp4),
        ("f4v", ContentType::Mp4),
        ("mp3", ContentType::Mp3),
        ("ts", ContentType::TransportStream),
        ("aac", ContentType::Aac),
        ("webm", ContentType::WebM),
    ];
    for (ext, expected) in table {
        for suffix in ["", "?q=1", "#frag", "?a=b.mp3#x"] {
            let locator = format!("https://media.example.org/path/file.{}{}", ext, suffix);
            assert_eq!(resolver.resolve(&locator).content_type, expected, "{}", locator);
        }
    }
}

#[tokio::test]
async fn test_unknown_content_type_never_reaches_engine() {
    let backend = SimBackend::default();
    let session = session(&backend);

    let err = assert_err!(session.prepare("/storage/clip.mkv").await);
    assert!(matches!(err, Error::Resolution { .. }));
    assert_eq!(backend.engines_created(), 0);
    assert_eq!(session.state().await, SessionState::Idle);
}

// =============================================================================
// Renderer Registry Tests
// =============================================================================

#[test]
fn test_plan_extension_modes() {
    let vp9: BTreeSet<String> = ["vp9".to_string()].into_iter().collect();

    let prefer = RendererRegistry::plan(ContentType::Hls, ExtensionMode::Prefer, &vp9);
    let on = RendererRegistry::plan(ContentType::Hls, ExtensionMode::On, &vp9);
    let off = RendererRegistry::plan(ContentType::Hls, ExtensionMode::Off, &vp9);

    let position = |plan: &[stagehand_core::RendererDescriptor], kind: &RendererKind| {
        plan.iter().position(|d| &d.kind == kind)
    };
    let ext = RendererKind::Extension {
        name: "vp9".to_string(),
        track_type: TrackType::Video,
    };

    assert!(position(&prefer, &ext) < position(&prefer, &RendererKind::Video));
    assert!(position(&on, &ext) > position(&on, &RendererKind::Video));
    assert_eq!(position(&off, &ext), None);
}

#[tokio::test]
async fn test_prefer_mode_selects_extension_first() {
    let backend = SimBackend::default();
    let config = SessionConfig {
        extension_mode: ExtensionMode::Prefer,
        ..Default::default()
    };
    let session = session_with(&backend, &["vp9", "opus"], config);
    let mut events = session.subscribe();

    session.prepare(MOVIE).await.unwrap();
    settle().await;

    let kinds: Vec<String> = session
        .renderers()
        .await
        .iter()
        .map(|d| d.kind.to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "vp9 (video)",
            "core video",
            "opus (audio)",
            "core audio",
            "core text",
            "core metadata"
        ]
    );

    let decoders: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            PlayerEvent::DecoderInitialized { decoder_name, .. } => Some(decoder_name),
            _ => None,
        })
        .collect();
    assert!(decoders.contains(&"vp9".to_string()));
    assert!(decoders.contains(&"opus".to_string()));
    assert!(!decoders.contains(&"core-video".to_string()));
}

#[tokio::test]
async fn test_extension_mode_applies_at_next_prepare() {
    let backend = SimBackend::default();
    let session = session_with(&backend, &["flac"], SessionConfig::default());

    session.prepare(MOVIE).await.unwrap();
    assert_eq!(session.renderers().await.len(), 4);

    session.set_extension_mode(ExtensionMode::On).await;
    assert_eq!(session.renderers().await.len(), 4);
    assert_eq!(session.extension_mode().await, ExtensionMode::On);

    session.prepare(MOVIE).await.unwrap();
    let renderers = session.renderers().await;
    assert_eq!(renderers.len(), 5);
    assert_eq!(renderers[1].kind, RendererKind::Audio);
    assert!(renderers[2].kind.is_extension());
}

#[tokio::test]
async fn test_broken_extension_fails_prepare() {
    let core: CoreConstructor = Arc::new(|track_type: TrackType, ctx: &RendererContext| {
        Ok(Box::new(SimRenderer::new("core", track_type, ctx)) as Box<dyn Renderer>)
    });
    let mut table = ExtensionTable::new();
    table
        .register("ffmpeg", |_ctx| {
            Err(ExtensionError::Failed(anyhow::anyhow!("incompatible build")))
        })
        .unwrap();
    let backend = SimBackend::default();
    let session = SessionBuilder::new(RendererRegistry::new(core, table), backend.engine_factory())
        .config(SessionConfig {
            extension_mode: ExtensionMode::On,
            ..Default::default()
        })
        .build()
        .unwrap();

    let err = assert_err!(session.prepare(MOVIE).await);
    assert!(matches!(err, Error::ExtensionLoad { .. }));
    assert_eq!(session.state().await, SessionState::Failed);
    assert_eq!(backend.engines_created(), 0);
    assert_eq!(session.last_error().await.unwrap().code, "EXTENSION_LOAD");
}

// =============================================================================
// Seek Tests
// =============================================================================

#[tokio::test]
async fn test_seeks_coalesce_to_first_and_last() {
    let backend = SimBackend::new(SimConfig {
        auto_complete_seeks: false,
        ..Default::default()
    });
    let session = session(&backend);
    let mut events = session.subscribe();
    session.prepare(MOVIE).await.unwrap();
    let engine = backend.engine().unwrap();

    session.seek(10_000).await.unwrap();
    session.seek(20_000).await.unwrap();
    session.seek(30_000).await.unwrap();
    assert_eq!(engine.seeks(), vec![10_000]);

    assert!(engine.complete_seek());
    settle().await;
    assert_eq!(engine.seeks(), vec![10_000, 30_000]);

    assert!(engine.complete_seek());
    settle().await;
    assert_eq!(engine.seeks(), vec![10_000, 30_000]);

    let processed: Vec<i64> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            PlayerEvent::SeekProcessed { position_ms } => Some(position_ms),
            _ => None,
        })
        .collect();
    assert_eq!(processed, vec![30_000]);
}

#[tokio::test]
async fn test_seek_past_end_clamps_and_pauses() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;
    assert!(session.is_playing().await);

    session.seek(60_000 + 1000).await.unwrap();
    let engine = backend.engine().unwrap();
    assert_eq!(engine.seeks(), vec![60_000]);

    wait_for_state(&session, SessionState::Ended).await;
    assert!(!session.is_playing().await);
    assert!(session.is_playback_finished().await);
    assert_eq!(session.position().await, 60_000);
}

#[tokio::test]
async fn test_negative_seek_clamps_to_zero() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    session.seek(-2500).await.unwrap();
    assert_eq!(backend.engine().unwrap().seeks(), vec![0]);
}

#[tokio::test]
async fn test_seek_by_uses_latest_request() {
    let backend = SimBackend::new(SimConfig {
        auto_complete_seeks: false,
        ..Default::default()
    });
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    let engine = backend.engine().unwrap();

    session.seek(10_000).await.unwrap();
    session.seek_by(5_000).await.unwrap();
    session.seek_by(5_000).await.unwrap();
    engine.complete_seek();
    settle().await;
    assert_eq!(engine.seeks(), vec![10_000, 20_000]);
}

#[tokio::test]
async fn test_seek_requires_known_timeline() {
    let backend = SimBackend::new(SimConfig {
        auto_ready: false,
        ..Default::default()
    });
    let session = session(&backend);

    let err = assert_err!(session.seek(1000).await);
    assert!(matches!(err, Error::InvalidSessionState(_)));

    session.prepare(MOVIE).await.unwrap();
    let err = assert_err!(session.seek(1000).await);
    assert!(matches!(err, Error::InvalidSessionState(_)));

    backend.engine().unwrap().finish_buffering();
    assert_ok!(session.seek(1000).await);
}

// =============================================================================
// Surface Tests
// =============================================================================

#[tokio::test]
async fn test_surface_replacement_is_blocking_and_releases_old() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    let engine = backend.engine().unwrap();

    let (a, a_surface) = RecordingSurface::create();
    let (b, b_surface) = RecordingSurface::create();

    session.set_surface(a.clone(), true).await.unwrap();
    session.set_surface(b.clone(), true).await.unwrap();

    // B was handled by the video renderer before set_surface returned
    let delivered_b = backend.renderer_log().into_iter().any(|entry| {
        matches!(entry.message, RendererMessage::SetSurface { surface: Some(ref s), .. } if *s == b)
    });
    assert!(delivered_b);

    let surface_batches: Vec<bool> = engine
        .batches()
        .into_iter()
        .filter(|batch| {
            batch
                .messages
                .iter()
                .any(|m| matches!(m.message, RendererMessage::SetSurface { .. }))
        })
        .map(|batch| batch.blocking)
        .collect();
    assert_eq!(surface_batches, vec![false, true]);

    assert_eq!(a_surface.releases(), 1);
    assert_eq!(b_surface.releases(), 0);
    assert_eq!(session.current_surface().await, Some(b));
}

#[tokio::test]
async fn test_first_frame_once_per_bind() {
    let backend = SimBackend::default();
    let session = session(&backend);
    let mut events = session.subscribe();
    session.prepare(MOVIE).await.unwrap();

    let (a, _) = RecordingSurface::create();
    session.set_surface(a.clone(), false).await.unwrap();
    settle().await;
    session.set_surface(a.clone(), false).await.unwrap();
    settle().await;

    let first_frames = drain(&mut events)
        .into_iter()
        .filter(|event| matches!(event, PlayerEvent::RenderedFirstFrame { surface } if *surface == a.id()))
        .count();
    assert_eq!(first_frames, 2);
}

#[tokio::test]
async fn test_surface_survives_prepare_and_is_rebound() {
    let backend = SimBackend::default();
    let session = session(&backend);
    let mut events = session.subscribe();

    let (a, a_surface) = RecordingSurface::create();
    session.set_surface(a.clone(), true).await.unwrap();
    session.prepare(MOVIE).await.unwrap();
    settle().await;

    assert_eq!(a_surface.releases(), 0);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, PlayerEvent::RenderedFirstFrame { .. })));

    session.stop().await.unwrap();
    assert_eq!(a_surface.releases(), 1);
    assert_eq!(session.current_surface().await, None);
}

#[tokio::test]
async fn test_unowned_surface_kept_across_stop() {
    let backend = SimBackend::default();
    let session = session(&backend);
    let (a, a_surface) = RecordingSurface::create();
    session.set_surface(a.clone(), false).await.unwrap();

    session.prepare(MOVIE).await.unwrap();
    session.stop().await.unwrap();
    assert_eq!(session.current_surface().await, Some(a));

    session.release().await.unwrap();
    assert_eq!(session.current_surface().await, None);
    assert_eq!(a_surface.releases(), 0);
}

#[tokio::test]
async fn test_surface_provider_lifecycle() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();

    let provider = Arc::new(SimSurfaceProvider::new(true));
    let (first, first_surface) = provider.create_surface();
    session.attach_surface_provider(provider.clone()).await.unwrap();
    assert_eq!(session.current_surface().await, Some(first));
    assert!(provider.is_attached());

    let (second, _) = provider.create_surface();
    settle().await;
    assert_eq!(session.current_surface().await, Some(second));
    assert_eq!(first_surface.releases(), 1);

    provider.destroy_surface();
    settle().await;
    assert_eq!(session.current_surface().await, None);

    let (manual, _) = RecordingSurface::create();
    session.set_surface(manual.clone(), false).await.unwrap();
    assert!(!provider.is_attached());
    assert_eq!(session.current_surface().await, Some(manual));
}

// =============================================================================
// Audio Settings Tests
// =============================================================================

#[tokio::test]
async fn test_repeated_volume_dispatches_each_call() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    let engine = backend.engine().unwrap();
    let before = engine.batches().len();

    session.set_volume(0.5).await.unwrap();
    session.set_volume(0.5).await.unwrap();

    let batches = engine.batches();
    assert_eq!(batches.len(), before + 2);
    for batch in &batches[before..] {
        assert!(!batch.blocking);
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].message, RendererMessage::SetVolume(0.5));
    }
    assert_eq!(session.volume().await, 0.5);

    session.set_volume(4.0).await.unwrap();
    assert_eq!(session.volume().await, 1.0);
}

#[tokio::test]
async fn test_stream_route_blocking_only_on_change() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    let engine = backend.engine().unwrap();
    let before = engine.batches().len();

    session.set_stream_route(StreamRoute::Music).await.unwrap();
    session.set_stream_route(StreamRoute::Music).await.unwrap();

    let blocking: Vec<bool> = engine.batches()[before..].iter().map(|b| b.blocking).collect();
    assert_eq!(blocking, vec![true, false]);
    assert_eq!(session.stream_route().await, StreamRoute::Music);
}

#[tokio::test]
async fn test_settings_replayed_on_prepare() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.set_volume(0.25).await.unwrap();
    session.prepare(MOVIE).await.unwrap();
    settle().await;

    assert!(backend
        .renderer_log()
        .iter()
        .any(|entry| entry.message == RendererMessage::SetVolume(0.25)));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_stop_twice_is_noop() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    settle().await;
    let mut events = session.subscribe();

    assert_ok!(session.stop().await);
    settle().await;
    assert!(!drain(&mut events).is_empty());
    assert!(backend.engine().unwrap().is_released());

    assert_ok!(session.stop().await);
    settle().await;
    assert!(drain(&mut events).is_empty());
    assert_eq!(session.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_stale_generation_events_dropped() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    let old_sink = backend.renderer_sink().unwrap();
    let old_engine = backend.engine().unwrap();

    session.prepare("https://cdn.example.com/live/master.m3u8").await.unwrap();
    settle().await;
    assert!(old_engine.is_released());
    assert_eq!(backend.engines_created(), 2);

    old_sink.emit(stagehand_core::RendererEvent::AudioSessionId(99));
    settle().await;
    assert_eq!(session.audio_session_id().await, Some(1));

    backend
        .renderer_sink()
        .unwrap()
        .emit(stagehand_core::RendererEvent::AudioSessionId(7));
    settle().await;
    assert_eq!(session.audio_session_id().await, Some(7));
}

#[tokio::test]
async fn test_construction_timeout_fails_session() {
    let backend = SimBackend::new(SimConfig {
        create_delay_ms: 400,
        ..Default::default()
    });
    let session = session_with(
        &backend,
        &[],
        SessionConfig {
            construction_timeout_ms: 50,
            ..Default::default()
        },
    );

    let err = assert_err!(session.prepare(MOVIE).await);
    assert!(matches!(err, Error::ConstructionTimeout { waited_ms: 50 }));
    assert_eq!(session.state().await, SessionState::Failed);
    assert!(session.had_playback_error().await);
}

#[tokio::test]
async fn test_fatal_engine_error_fails_session() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;

    backend.engine().unwrap().fail(
        EngineFailure {
            kind: FailureKind::Source,
            message: "404 on segment".to_string(),
        },
        true,
    );
    wait_for_state(&session, SessionState::Failed).await;
    assert!(session.had_playback_error().await);
    let report = session.last_error().await.unwrap();
    assert!(report.fatal);
    assert_eq!(report.code, "PLAYBACK");

    session.stop().await.unwrap();
    assert_eq!(session.state().await, SessionState::Idle);
    assert!(!session.had_playback_error().await);
}

#[tokio::test]
async fn test_prepare_after_construction_failure_recovers() {
    let backend = SimBackend::new(SimConfig {
        fail_create: true,
        ..Default::default()
    });
    let session = session(&backend);
    assert_err!(session.prepare(MOVIE).await);
    assert_eq!(session.state().await, SessionState::Failed);

    backend.configure(|config| config.fail_create = false);
    assert_ok!(session.prepare(MOVIE).await);
    wait_for_state(&session, SessionState::Ready).await;
    assert!(session.is_playing().await);
    assert!(!session.had_playback_error().await);
    assert!(session.last_error().await.is_none());
}

#[tokio::test]
async fn test_prepare_after_fatal_engine_error_recovers() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;

    backend.engine().unwrap().fail(
        EngineFailure {
            kind: FailureKind::Renderer,
            message: "decoder reset".to_string(),
        },
        true,
    );
    wait_for_state(&session, SessionState::Failed).await;

    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;
    assert_eq!(backend.engines_created(), 2);
    assert!(session.is_playing().await);
    assert!(!session.is_playback_finished().await);
}

#[tokio::test]
async fn test_prepare_over_ready_session_passes_through_idle() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;
    let mut events = session.subscribe();

    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;

    let transitions: Vec<(SessionState, SessionState)> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            PlayerEvent::StateChanged { from, to, .. } if from != to => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(transitions.first(), Some(&(SessionState::Ready, SessionState::Idle)));
    assert!(transitions.iter().all(|(from, to)| from.can_transition_to(*to)));
}

#[tokio::test]
async fn test_denied_audio_focus_is_not_abandoned() {
    let backend = SimBackend::default();
    let focus = Arc::new(TrackingAudioFocus::new());
    focus.set_available(false);
    let session = SessionBuilder::new(backend.registry(&[]).unwrap(), backend.engine_factory())
        .audio_focus(focus.clone())
        .build()
        .unwrap();

    assert_ok!(session.prepare(MOVIE).await);
    session.stop().await.unwrap();
    assert_eq!(focus.requests(), 1);
    assert_eq!(focus.abandons(), 0);
}

#[tokio::test]
async fn test_drm_error_is_reported_not_fatal() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session
        .prepare("https://storage.googleapis.com/wvmedia/cenc/h264/tears/tears.mpd")
        .await
        .unwrap();
    wait_for_state(&session, SessionState::Ready).await;
    let mut events = session.subscribe();

    backend.engine().unwrap().fail(
        EngineFailure {
            kind: FailureKind::Drm(DrmReason::UnsupportedScheme),
            message: "cbcs not supported".to_string(),
        },
        false,
    );
    settle().await;

    let report = session.last_error().await.unwrap();
    assert_eq!(report.drm_reason, Some(DrmReason::UnsupportedScheme));
    assert!(!report.fatal);
    assert_eq!(session.state().await, SessionState::Ready);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, PlayerEvent::Error { .. })));

    let content = session.content().await.unwrap();
    assert_eq!(content.provider_hint.as_deref(), Some("widevine_test"));
}

#[tokio::test]
async fn test_engine_state_rejection_is_recovered() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();

    backend
        .engine()
        .unwrap()
        .reject_next(EngineError::IllegalState("transitioning".to_string()));
    assert_ok!(session.pause().await);
    assert_ok!(session.pause().await);
    assert!(!backend.engine().unwrap().play_when_ready());
}

#[tokio::test]
async fn test_toggle_playing() {
    let backend = SimBackend::default();
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;

    assert!(!session.toggle_playing().await.unwrap());
    assert!(session.toggle_playing().await.unwrap());
}

#[tokio::test]
async fn test_playback_advances_to_end() {
    let backend = SimBackend::new(SimConfig {
        duration_ms: 5_000,
        ..Default::default()
    });
    let session = session(&backend);
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;

    let engine = backend.engine().unwrap();
    engine.advance(2_000);
    assert_eq!(session.position().await, 2_000);
    engine.advance(10_000);
    wait_for_state(&session, SessionState::Ended).await;
    assert!(session.is_playback_finished().await);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_seeks_issue_one_engine_seek() {
    let backend = SimBackend::new(SimConfig {
        auto_complete_seeks: false,
        ..Default::default()
    });
    let session = Arc::new(session(&backend));
    session.prepare(MOVIE).await.unwrap();
    wait_for_state(&session, SessionState::Ready).await;
    let engine = backend.engine().unwrap();

    let targets: Vec<i64> = (1..=8).map(|i| i * 1_000).collect();
    let mut tasks = tokio::task::JoinSet::new();
    for target in targets.clone() {
        let session = session.clone();
        tasks.spawn(async move { session.seek(target).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_ok!(result.unwrap());
    }

    let issued = engine.seeks();
    assert_eq!(issued.len(), 1);
    assert!(targets.contains(&issued[0]));

    assert!(engine.complete_seek());
    settle().await;
    let issued = engine.seeks();
    assert_eq!(issued.len(), 2);
    assert!(targets.contains(&issued[1]));

    assert!(engine.complete_seek());
    settle().await;
    assert_eq!(engine.seeks().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_surface_binds_release_each_replaced_once() {
    let backend = SimBackend::default();
    let session = Arc::new(session(&backend));
    session.prepare(MOVIE).await.unwrap();

    let surfaces: Vec<_> = (0..8).map(|_| RecordingSurface::create()).collect();
    let mut tasks = tokio::task::JoinSet::new();
    for (handle, _) in &surfaces {
        let session = session.clone();
        let handle = handle.clone();
        tasks.spawn(async move { session.set_surface(handle, true).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_ok!(result.unwrap());
    }

    let current = session.current_surface().await.unwrap();
    for (handle, recording) in &surfaces {
        let expected = if *handle == current { 0 } else { 1 };
        assert_eq!(recording.releases(), expected);
    }
    let released: usize = surfaces.iter().map(|(_, r)| r.releases()).sum();
    assert_eq!(released, surfaces.len() - 1);
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_json_overrides() {
    let config = SessionConfig::from_json_str(
        r#"{"extension_mode":"on","stream_route":"music","initial_volume":0.4}"#,
    )
    .unwrap();
    assert_eq!(config.extension_mode, ExtensionMode::On);
    assert_eq!(config.stream_route, StreamRoute::Music);
    assert_eq!(config.initial_volume, 0.4);
    assert_eq!(config.event_capacity, 256);
}

#[tokio::test]
async fn test_invalid_config_rejected_at_build() {
    let backend = SimBackend::default();
    let result = SessionBuilder::new(backend.registry(&[]).unwrap(), backend.engine_factory())
        .config(SessionConfig {
            event_capacity: 0,
            ..Default::default()
        })
        .build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
