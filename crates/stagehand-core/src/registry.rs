//! Renderer registry
//!
//! Builds the ordered renderer set for a session:
//! - core video, then the video extension family (`vp9`)
//! - core audio, then the audio extension families (`opus`, `flac`, `ffmpeg`)
//! - core text, then core metadata
//!
//! With `ExtensionMode::Prefer` the extensions of a track type sit directly
//! before that track's core renderer, with `On` directly after it, and with
//! `Off` they are left out. Track selection downstream picks the first
//! capable renderer, so the order is the preference.

use crate::{
    renderer::{Renderer, RendererContext, RendererDescriptor, RendererId, RendererKind},
    types::{ContentType, ExtensionMode, TrackType},
    Error, Result,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

/// Extension families in declared order
pub const EXTENSION_FAMILIES: [(&str, TrackType); 4] = [
    ("vp9", TrackType::Video),
    ("opus", TrackType::Audio),
    ("flac", TrackType::Audio),
    ("ffmpeg", TrackType::Audio),
];

/// Track type served by an extension family
pub fn family_track_type(name: &str) -> Option<TrackType> {
    EXTENSION_FAMILIES
        .iter()
        .find(|(family, _)| *family == name)
        .map(|(_, track_type)| *track_type)
}

const CORE_TRACKS: [(RendererKind, TrackType); 4] = [
    (RendererKind::Video, TrackType::Video),
    (RendererKind::Audio, TrackType::Audio),
    (RendererKind::Text, TrackType::Text),
    (RendererKind::Metadata, TrackType::Metadata),
];

/// Failure reported by an extension constructor
#[derive(ThisError, Debug)]
pub enum ExtensionError {
    /// The extension is linked but its backing library is missing
    #[error("extension not present")]
    NotPresent,

    /// The extension is present but broken
    #[error("{0:#}")]
    Failed(anyhow::Error),
}

/// Builds an extension renderer
pub type ExtensionConstructor = Arc<
    dyn Fn(&RendererContext) -> std::result::Result<Box<dyn Renderer>, ExtensionError> + Send + Sync,
>;

/// Builds a core renderer for a track type
pub type CoreConstructor =
    Arc<dyn Fn(TrackType, &RendererContext) -> anyhow::Result<Box<dyn Renderer>> + Send + Sync>;

/// Extension renderers linked into this process, keyed by family name
#[derive(Clone, Default)]
pub struct ExtensionTable {
    entries: HashMap<&'static str, ExtensionConstructor>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for one of the known families
    pub fn register<F>(&mut self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(&RendererContext) -> std::result::Result<Box<dyn Renderer>, ExtensionError>
            + Send
            + Sync
            + 'static,
    {
        let (family, _) = EXTENSION_FAMILIES
            .iter()
            .find(|(family, _)| *family == name)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown extension family '{}'", name)))?;
        self.entries.insert(*family, Arc::new(constructor));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered family names
    pub fn names(&self) -> BTreeSet<String> {
        self.entries.keys().map(|name| name.to_string()).collect()
    }

    fn get(&self, name: &str) -> Option<&ExtensionConstructor> {
        self.entries.get(name)
    }
}

impl std::fmt::Debug for ExtensionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionTable")
            .field("entries", &self.names())
            .finish()
    }
}

/// Constructed renderers with their descriptors, index aligned
pub struct RendererSet {
    pub descriptors: Vec<RendererDescriptor>,
    pub renderers: Vec<Box<dyn Renderer>>,
}

impl RendererSet {
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl std::fmt::Debug for RendererSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSet")
            .field("descriptors", &self.descriptors)
            .finish()
    }
}

/// Ids of every renderer of a track type, in order
pub fn renderer_ids(descriptors: &[RendererDescriptor], track_type: TrackType) -> Vec<RendererId> {
    descriptors
        .iter()
        .filter(|d| d.track_type() == track_type)
        .map(RendererDescriptor::id)
        .collect()
}

/// Renderer assembly
#[derive(Clone)]
pub struct RendererRegistry {
    core: CoreConstructor,
    extensions: ExtensionTable,
}

impl RendererRegistry {
    pub fn new(core: CoreConstructor, extensions: ExtensionTable) -> Self {
        Self { core, extensions }
    }

    pub fn extensions(&self) -> &ExtensionTable {
        &self.extensions
    }

    /// Ordered descriptors for a content type; pure
    pub fn plan(
        content_type: ContentType,
        mode: ExtensionMode,
        available: &BTreeSet<String>,
    ) -> Vec<RendererDescriptor> {
        let mut kinds = Vec::with_capacity(CORE_TRACKS.len() + EXTENSION_FAMILIES.len());
        for (core, track_type) in CORE_TRACKS {
            let extensions = if mode == ExtensionMode::Off {
                Vec::new()
            } else {
                EXTENSION_FAMILIES
                    .iter()
                    .filter(|(name, family_track)| {
                        *family_track == track_type && available.contains(*name)
                    })
                    .map(|(name, _)| RendererKind::Extension {
                        name: name.to_string(),
                        track_type,
                    })
                    .collect()
            };
            arrange(mode, core, extensions, &mut kinds);
        }

        debug!(content_type = %content_type, mode = %mode, count = kinds.len(), "Planned renderers");
        describe(kinds)
    }

    /// Construct the renderer set for a session
    pub fn build(&self, ctx: &RendererContext, mode: ExtensionMode) -> Result<RendererSet> {
        let mut entries: Vec<(RendererKind, Box<dyn Renderer>)> = Vec::new();

        for (core, track_type) in CORE_TRACKS {
            let renderer = (self.core)(track_type, ctx).map_err(|e| {
                Error::construction(format!("core {} renderer: {:#}", track_type, e))
            })?;

            let mut extensions = Vec::new();
            if mode != ExtensionMode::Off {
                for (name, family_track) in EXTENSION_FAMILIES {
                    if family_track != track_type {
                        continue;
                    }
                    let Some(constructor) = self.extensions.get(name) else {
                        continue;
                    };
                    match constructor(ctx) {
                        Ok(renderer) => {
                            info!(extension = name, track = %track_type, "Loaded extension renderer");
                            extensions.push((
                                RendererKind::Extension {
                                    name: name.to_string(),
                                    track_type,
                                },
                                renderer,
                            ));
                        }
                        Err(ExtensionError::NotPresent) => {
                            debug!(extension = name, "Extension not present, skipping");
                        }
                        Err(ExtensionError::Failed(e)) => {
                            warn!(extension = name, error = %e, "Extension failed to load");
                            return Err(Error::ExtensionLoad {
                                name: name.to_string(),
                                reason: format!("{:#}", e),
                            });
                        }
                    }
                }
            }

            arrange(mode, (core, renderer), extensions, &mut entries);
        }

        let (kinds, renderers): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
        let descriptors = describe(kinds);
        info!(
            content_type = %ctx.content_type,
            mode = %mode,
            renderers = descriptors.len(),
            "Built renderer set"
        );
        Ok(RendererSet {
            descriptors,
            renderers,
        })
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("extensions", &self.extensions)
            .finish()
    }
}

fn arrange<T>(mode: ExtensionMode, core: T, extensions: Vec<T>, out: &mut Vec<T>) {
    match mode {
        ExtensionMode::Off => out.push(core),
        ExtensionMode::Prefer => {
            out.extend(extensions);
            out.push(core);
        }
        ExtensionMode::On => {
            out.push(core);
            out.extend(extensions);
        }
    }
}

fn describe(kinds: Vec<RendererKind>) -> Vec<RendererDescriptor> {
    kinds
        .into_iter()
        .enumerate()
        .map(|(priority, kind)| RendererDescriptor { kind, priority })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineResult;
    use crate::renderer::RendererMessage;

    struct NullRenderer(&'static str, TrackType);

    impl Renderer for NullRenderer {
        fn name(&self) -> &str {
            self.0
        }
        fn track_type(&self) -> TrackType {
            self.1
        }
        fn enable(&mut self) -> EngineResult<()> {
            Ok(())
        }
        fn disable(&mut self) {}
        fn handle_message(&mut self, _message: RendererMessage) -> EngineResult<()> {
            Ok(())
        }
    }

    fn core() -> CoreConstructor {
        Arc::new(|track_type: TrackType, _ctx: &RendererContext| {
            Ok(Box::new(NullRenderer("core", track_type)) as Box<dyn Renderer>)
        })
    }

    fn names(set: &RendererSet) -> Vec<String> {
        set.descriptors.iter().map(|d| d.kind.to_string()).collect()
    }

    fn available(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_plan_vp9_placement() {
        let vp9 = available(&["vp9"]);

        let prefer = RendererRegistry::plan(ContentType::Hls, ExtensionMode::Prefer, &vp9);
        assert!(prefer[0].kind.is_extension());
        assert_eq!(prefer[1].kind, RendererKind::Video);

        let on = RendererRegistry::plan(ContentType::Hls, ExtensionMode::On, &vp9);
        assert_eq!(on[0].kind, RendererKind::Video);
        assert!(on[1].kind.is_extension());

        let off = RendererRegistry::plan(ContentType::Hls, ExtensionMode::Off, &vp9);
        assert_eq!(off.len(), 4);
        assert!(off.iter().all(|d| !d.kind.is_extension()));
    }

    #[test]
    fn test_plan_audio_declared_order() {
        let all = available(&["ffmpeg", "flac", "opus"]);
        let plan = RendererRegistry::plan(ContentType::Mp4, ExtensionMode::Prefer, &all);
        let kinds: Vec<String> = plan.iter().map(|d| d.kind.to_string()).collect();
        assert_eq!(
            kinds,
            vec![
                "core video",
                "opus (audio)",
                "flac (audio)",
                "ffmpeg (audio)",
                "core audio",
                "core text",
                "core metadata",
            ]
        );
        for (i, d) in plan.iter().enumerate() {
            assert_eq!(d.priority, i);
        }
    }

    #[test]
    fn test_plan_ignores_unknown_names() {
        let plan =
            RendererRegistry::plan(ContentType::Dash, ExtensionMode::On, &available(&["av1"]));
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_register_unknown_family() {
        let mut table = ExtensionTable::new();
        let result = table.register("av1", |_ctx| Err(ExtensionError::NotPresent));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_build_matches_plan() {
        let mut table = ExtensionTable::new();
        table
            .register("vp9", |_ctx| Ok(Box::new(NullRenderer("vp9", TrackType::Video)) as Box<dyn Renderer>))
            .unwrap();
        table
            .register("flac", |_ctx| Ok(Box::new(NullRenderer("flac", TrackType::Audio)) as Box<dyn Renderer>))
            .unwrap();
        let registry = RendererRegistry::new(core(), table);
        let ctx = RendererContext::detached(ContentType::Dash);

        for mode in [ExtensionMode::Off, ExtensionMode::On, ExtensionMode::Prefer] {
            let set = registry.build(&ctx, mode).unwrap();
            let planned =
                RendererRegistry::plan(ContentType::Dash, mode, &registry.extensions().names());
            assert_eq!(set.descriptors, planned);
            assert_eq!(set.len(), planned.len());
            for (renderer, descriptor) in set.renderers.iter().zip(&set.descriptors) {
                assert_eq!(renderer.track_type(), descriptor.track_type());
            }
        }
    }

    #[test]
    fn test_build_skips_not_present() {
        let mut table = ExtensionTable::new();
        table.register("opus", |_ctx| Err(ExtensionError::NotPresent)).unwrap();
        let registry = RendererRegistry::new(core(), table);
        let set = registry
            .build(&RendererContext::detached(ContentType::Mp3), ExtensionMode::Prefer)
            .unwrap();
        assert_eq!(
            names(&set),
            vec!["core video", "core audio", "core text", "core metadata"]
        );
    }

    #[test]
    fn test_build_extension_failure_is_fatal() {
        let mut table = ExtensionTable::new();
        table
            .register("ffmpeg", |_ctx| {
                Err(ExtensionError::Failed(anyhow::anyhow!("symbol lookup failed")))
            })
            .unwrap();
        let registry = RendererRegistry::new(core(), table);
        let err = registry
            .build(&RendererContext::detached(ContentType::Mp4), ExtensionMode::On)
            .unwrap_err();
        assert!(matches!(err, Error::ExtensionLoad { ref name, .. } if name == "ffmpeg"));
        assert!(err.is_construction_failure());

        // Off never touches extension constructors
        assert!(registry
            .build(&RendererContext::detached(ContentType::Mp4), ExtensionMode::Off)
            .is_ok());
    }

    #[test]
    fn test_core_failure_is_fatal() {
        let failing: CoreConstructor = Arc::new(|track_type: TrackType, _ctx: &RendererContext| {
            if track_type == TrackType::Text {
                anyhow::bail!("no text pipeline");
            }
            Ok(Box::new(NullRenderer("core", track_type)) as Box<dyn Renderer>)
        });
        let registry = RendererRegistry::new(failing, ExtensionTable::new());
        let err = registry
            .build(&RendererContext::detached(ContentType::Hls), ExtensionMode::Off)
            .unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn test_renderer_ids_by_track() {
        let plan = RendererRegistry::plan(
            ContentType::Dash,
            ExtensionMode::On,
            &available(&["opus", "flac"]),
        );
        assert_eq!(
            renderer_ids(&plan, TrackType::Audio),
            vec![RendererId(1), RendererId(2), RendererId(3)]
        );
        assert_eq!(renderer_ids(&plan, TrackType::Video), vec![RendererId(0)]);
    }
}
