//! CLI command implementations

use crate::output::{self, print_rows, print_value, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use stagehand_core::engine::sim::{RecordingSurface, SimBackend, SimConfig};
use stagehand_core::{
    ContentType, ContentTypeResolver, ErrorReport, ExtensionMode, PlayerEvent, PlayerEventRecord,
    RendererRegistry, SessionBuilder, SessionConfig, SessionState, StreamRoute,
};
use std::collections::BTreeSet;
use std::time::Duration;
use tabled::Tabled;
use tracing::{info, warn};

#[derive(Serialize, Tabled)]
struct ResolveRow {
    locator: String,
    content_type: String,
    adaptive: bool,
    license_url: String,
    provider: String,
}

/// Resolve content types for a list of locators
pub fn resolve(locators: &[String], format: &str) -> anyhow::Result<()> {
    let resolver = ContentTypeResolver::new();
    let rows: Vec<ResolveRow> = locators
        .iter()
        .map(|locator| {
            let content = resolver.resolve(locator);
            let drm = content.drm_hints();
            ResolveRow {
                locator: locator.clone(),
                content_type: content.content_type.to_string(),
                adaptive: content.content_type.is_adaptive(),
                license_url: drm.as_ref().map(|d| d.license_url()).unwrap_or_else(|| "-".to_string()),
                provider: drm
                    .and_then(|d| d.provider)
                    .unwrap_or_else(|| "-".to_string()),
            }
        })
        .collect();

    print_rows(rows, format, |row| {
        let kind = if row.content_type == ContentType::Unknown.to_string() {
            output::fail(&row.content_type)
        } else {
            output::ok(&row.content_type)
        };
        if row.license_url == "-" {
            format!("{}  {}", kind, row.locator)
        } else {
            format!("{}  {}\n    license: {}", kind, row.locator, row.license_url)
        }
    })
}

#[derive(Serialize, Tabled)]
struct RendererRow {
    priority: usize,
    renderer: String,
    track: String,
    extension: bool,
}

/// Show the planned renderer order
pub fn renderers(
    content_type: &str,
    mode: ExtensionMode,
    extensions: &[String],
    format: &str,
) -> anyhow::Result<()> {
    let content_type = ContentType::from_name(content_type)
        .ok_or_else(|| anyhow::anyhow!("unknown content type '{}'", content_type))?;
    let available: BTreeSet<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

    let rows: Vec<RendererRow> = RendererRegistry::plan(content_type, mode, &available)
        .into_iter()
        .map(|descriptor| RendererRow {
            priority: descriptor.priority,
            track: descriptor.track_type().to_string(),
            extension: descriptor.kind.is_extension(),
            renderer: descriptor.kind.to_string(),
        })
        .collect();

    if OutputFormat::from(format) == OutputFormat::Text {
        println!("{}", output::heading(&format!("Renderers for {} (extensions {})", content_type, mode)));
    }
    print_rows(rows, format, |row| format!("  {}. {}", row.priority, row.renderer))
}

/// Inputs for a scripted playback session
#[derive(Debug, Clone)]
pub struct PlayScript {
    pub extensions: Vec<String>,
    pub mode: Option<ExtensionMode>,
    pub seeks: Vec<i64>,
    pub seek_by: Option<i64>,
    pub volume: Option<f32>,
    pub route: Option<StreamRoute>,
    pub surfaces: usize,
    pub duration_ms: i64,
    pub play_for_ms: i64,
}

#[derive(Serialize)]
struct PlaySummary {
    session_id: String,
    locator: String,
    content_type: Option<String>,
    renderers: Vec<String>,
    engine_seeks: Vec<i64>,
    surfaces_bound: usize,
    surface_releases: usize,
    final_state: SessionState,
    position_ms: i64,
    events: usize,
    last_error: Option<ErrorReport>,
}

/// Drive a session against the simulated engine
pub async fn play(
    locator: &str,
    script: PlayScript,
    mut config: SessionConfig,
    format: &str,
) -> anyhow::Result<()> {
    let text = OutputFormat::from(format) != OutputFormat::Json;
    if let Some(mode) = script.mode {
        config.extension_mode = mode;
    }
    info!(locator, extensions = ?script.extensions, mode = %config.extension_mode, "Starting scripted session");

    let backend = SimBackend::new(SimConfig {
        duration_ms: script.duration_ms,
        ..Default::default()
    });
    let extensions: Vec<&str> = script.extensions.iter().map(String::as_str).collect();
    let session = SessionBuilder::new(backend.registry(&extensions)?, backend.engine_factory())
        .config(config)
        .build()?;

    let mut rx = session.subscribe();
    let collector = tokio::spawn(async move {
        let mut records: Vec<PlayerEventRecord> = Vec::new();
        while let Ok(record) = rx.recv().await {
            if text {
                print_event(&record);
            }
            records.push(record);
        }
        records
    });

    if text {
        println!("{}", output::heading(&format!("Session {}", session.id())));
    }
    if let Err(e) = session.prepare(locator).await {
        warn!(error = %e, code = e.error_code(), "Prepare failed");
        if text {
            println!("{} {}", output::fail("prepare failed:"), e);
        }
    }

    let mut recordings = Vec::with_capacity(script.surfaces);
    for _ in 0..script.surfaces {
        let (surface, recording) = RecordingSurface::create();
        session.set_surface(surface, true).await?;
        recordings.push(recording);
    }

    if let Some(volume) = script.volume {
        session.set_volume(volume).await?;
    }
    if let Some(route) = script.route {
        session.set_stream_route(route).await?;
    }
    for &target in &script.seeks {
        if let Err(e) = session.seek(target).await {
            if text {
                println!("{} {}", output::warn("seek skipped:"), e);
            }
        }
    }
    if let Some(delta) = script.seek_by {
        if let Err(e) = session.seek_by(delta).await {
            if text {
                println!("{} {}", output::warn("seek skipped:"), e);
            }
        }
    }

    if let Some(engine) = backend.engine() {
        let limit = if script.play_for_ms > 0 {
            script.play_for_ms
        } else {
            script.duration_ms
        };
        let progress = if text {
            let bar = ProgressBar::new(script.duration_ms.max(0) as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{bar:40.cyan/blue}] {pos}/{len} ms {msg}")?
                    .progress_chars("=> "),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let step = (script.duration_ms / 50).max(1);
        let mut played = 0;
        while played < limit && session.is_playing().await {
            let position = engine.advance(step.min(limit - played));
            played += step;
            progress.set_position(position.max(0) as u64);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        progress.finish_with_message(session.state().await.to_string());
    }

    let position_ms = session.position().await;
    let content_type = session.content().await.map(|c| c.content_type.to_string());
    let renderers = session
        .renderers()
        .await
        .iter()
        .map(|d| d.kind.to_string())
        .collect();
    let engine_seeks = backend.engine().map(|e| e.seeks()).unwrap_or_default();

    session.stop().await?;
    session.release().await?;
    let final_state = session.state().await;
    let last_error = session.last_error().await;
    let session_id = session.id().to_string();

    // The event channel closes once the session is gone
    drop(session);
    let events = match tokio::time::timeout(Duration::from_secs(1), collector).await {
        Ok(Ok(records)) => records.len(),
        _ => 0,
    };
    info!(session = %session_id, events, state = %final_state, "Scripted session finished");

    let summary = PlaySummary {
        session_id,
        locator: locator.to_string(),
        content_type,
        renderers,
        engine_seeks,
        surfaces_bound: script.surfaces,
        surface_releases: recordings.iter().map(|r| r.releases()).sum(),
        final_state,
        position_ms,
        events,
        last_error,
    };

    if text {
        println!("\n{}", output::heading("Summary"));
        println!("  content type:     {}", summary.content_type.as_deref().unwrap_or("-"));
        println!("  renderers:        {}", summary.renderers.join(", "));
        println!("  engine seeks:     {:?}", summary.engine_seeks);
        println!(
            "  surfaces:         {} bound, {} released",
            summary.surfaces_bound, summary.surface_releases
        );
        println!("  position at stop: {} ms", summary.position_ms);
        println!("  final state:      {}", summary.final_state);
        if let Some(report) = &summary.last_error {
            println!("  last error:       {}", output::fail(&report.to_string()));
        }
        Ok(())
    } else {
        print_value(&summary, format)
    }
}

fn print_event(record: &PlayerEventRecord) {
    let line = match &record.event {
        PlayerEvent::StateChanged { from, to, play_when_ready } => {
            format!("state {} -> {} (play when ready: {})", from, to, play_when_ready)
        }
        PlayerEvent::Error { report } if report.fatal => output::fail(&report.to_string()),
        PlayerEvent::Error { report } => output::warn(&report.to_string()),
        PlayerEvent::SeekProcessed { position_ms } => format!("seek processed at {} ms", position_ms),
        PlayerEvent::RenderedFirstFrame { surface } => output::ok(&format!("first frame on {}", surface)),
        PlayerEvent::VideoSizeChanged { size } => format!("video size {}", size),
        PlayerEvent::DecoderInitialized { track_type, decoder_name, .. } => {
            format!("{} decoder {} initialized", track_type, decoder_name)
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    println!("  [{:>3}] {}", record.sequence, line);
}

/// Print the effective configuration
pub fn show_config(config: &SessionConfig, format: &str) -> anyhow::Result<()> {
    config.validate()?;
    print_value(config, format)
}
