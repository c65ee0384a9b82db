//! Basic playback example
//!
//! Drives a session against the simulated engine: prepare, bind a surface,
//! scrub, hand the surface over and stop.
//!
//! Run with: cargo run -p stagehand-core --example basic_playback

use std::time::Duration;

use stagehand_core::engine::sim::{RecordingSurface, SimBackend, SimConfig};
use stagehand_core::{ExtensionMode, PlayerEvent, SessionBuilder, SessionConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("Stagehand Core - Basic Playback Example");
    println!("=======================================\n");

    let backend = SimBackend::new(SimConfig {
        duration_ms: 90_000,
        auto_complete_seeks: false,
        ..Default::default()
    });
    let config = SessionConfig {
        extension_mode: ExtensionMode::Prefer,
        ..Default::default()
    };
    let session = SessionBuilder::new(backend.registry(&["vp9", "opus"])?, backend.engine_factory())
        .config(config)
        .build()?;

    let mut events = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(record) = events.recv().await {
            match &record.event {
                PlayerEvent::StateChanged { from, to, .. } => {
                    println!("  [{:>3}] state {} -> {}", record.sequence, from, to)
                }
                PlayerEvent::RenderedFirstFrame { surface } => {
                    println!("  [{:>3}] first frame on {}", record.sequence, surface)
                }
                PlayerEvent::SeekProcessed { position_ms } => {
                    println!("  [{:>3}] seek processed at {} ms", record.sequence, position_ms)
                }
                other => println!("  [{:>3}] {}", record.sequence, serde_json::to_string(other).unwrap_or_default()),
            }
        }
    });

    let locator = "https://cdn.example.com/vod/big_buck_bunny.mp4";
    println!("1. Preparing {}", locator);
    session.prepare(locator).await?;
    let content = session.content().await;
    if let Some(content) = content {
        println!("   content type: {}", content.content_type);
    }
    for descriptor in session.renderers().await {
        println!("   renderer #{}: {}", descriptor.priority, descriptor.kind);
    }

    println!("\n2. Binding surface A");
    let (surface_a, recording_a) = RecordingSurface::create();
    session.set_surface(surface_a, true).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    println!("\n3. Scrubbing (three seeks before the engine catches up)");
    for target in [10_000, 20_000, 30_000] {
        session.seek(target).await?;
    }
    let engine = backend.engine().ok_or_else(|| anyhow::anyhow!("no engine"))?;
    println!("   engine seeks so far: {:?}", engine.seeks());
    engine.complete_seek();
    tokio::time::sleep(Duration::from_millis(20)).await;
    engine.complete_seek();
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("   engine seeks after completion: {:?}", engine.seeks());

    println!("\n4. Handing over to surface B");
    let (surface_b, _recording_b) = RecordingSurface::create();
    session.set_surface(surface_b, true).await?;
    println!("   surface A releases: {}", recording_a.releases());

    println!("\n5. Stopping");
    session.stop().await?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("   state: {}", session.state().await);

    session.release().await?;
    drop(session);
    printer.abort();
    Ok(())
}
