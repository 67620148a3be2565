//! Asset resolution: scene refs to local clips.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use reel_media::{MediaEngine, ResolvedSceneClip};
use reel_models::keys::{extension_of, is_video_key, scene_clip_prefix};
use reel_models::{AssemblyJobSpec, ProjectManifest};
use reel_storage::{ObjectInfo, ObjectStore};

use crate::arena::Arena;
use crate::error::{AssemblyError, PipelineResult};

/// Clips in timeline order plus the refs that were left out.
#[derive(Debug, Clone, Default)]
pub struct ResolvedScenes {
    pub clips: Vec<ResolvedSceneClip>,
    pub skipped: Vec<String>,
}

/// Locates, downloads and measures scene clips for one job.
pub struct AssetResolver<'a> {
    store: &'a dyn ObjectStore,
    engine: &'a dyn MediaEngine,
    arena: &'a Arena,
    parallelism: usize,
}

impl<'a> AssetResolver<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        engine: &'a dyn MediaEngine,
        arena: &'a Arena,
        parallelism: usize,
    ) -> Self {
        Self {
            store,
            engine,
            arena,
            parallelism: parallelism.max(1),
        }
    }

    /// Resolve every scene ref of `spec`, in order.
    ///
    /// Scenes without a rendered clip are skipped. Zero resolved clips is
    /// [`AssemblyError::NoValidClips`]; storage failures are fatal.
    pub async fn resolve(
        &self,
        spec: &AssemblyJobSpec,
        manifest: &ProjectManifest,
    ) -> PipelineResult<ResolvedScenes> {
        let outcomes: Vec<(String, PipelineResult<ResolvedSceneClip>)> =
            stream::iter(spec.scene_refs.iter().cloned().enumerate())
                .map(|(index, scene_id)| async move {
                    let outcome = self.resolve_scene(index, &scene_id, spec, manifest).await;
                    (scene_id, outcome)
                })
                .buffered(self.parallelism)
                .collect()
                .await;

        let mut resolved = ResolvedScenes::default();
        for (scene_id, outcome) in outcomes {
            match outcome {
                Ok(clip) => resolved.clips.push(clip),
                Err(AssemblyError::AssetMissing { .. }) => {
                    warn!(scene_id = %scene_id, "Skipping scene without a usable clip");
                    resolved.skipped.push(scene_id);
                }
                Err(e) => return Err(e),
            }
        }

        if resolved.clips.is_empty() {
            return Err(AssemblyError::NoValidClips {
                requested: spec.scene_refs.len(),
            });
        }

        Ok(resolved)
    }

    async fn resolve_scene(
        &self,
        index: usize,
        scene_id: &str,
        spec: &AssemblyJobSpec,
        manifest: &ProjectManifest,
    ) -> PipelineResult<ResolvedSceneClip> {
        let prefix = scene_clip_prefix(&spec.project_id, scene_id);
        let objects = self
            .store
            .list(&prefix)
            .await
            .map_err(|e| AssemblyError::internal(format!("failed to list {prefix}: {e}")))?;

        let object = latest_clip(objects).ok_or_else(|| AssemblyError::asset_missing(scene_id))?;
        let extension = extension_of(&object.key).unwrap_or("mp4");
        let path = self.arena.clip_path(index, scene_id, extension);

        match self.store.download_to(&object.key, &path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Err(AssemblyError::asset_missing(scene_id)),
            Err(e) => {
                return Err(AssemblyError::internal(format!(
                    "failed to download {}: {e}",
                    object.key
                )))
            }
        }
        debug!(scene_id, key = %object.key, "Downloaded scene clip");

        let record = manifest.scene(scene_id);
        let duration = match record.and_then(|r| r.usable_duration()) {
            Some(duration) => duration,
            None => match self.engine.probe_duration(&path).await {
                Ok(duration) => {
                    debug!(scene_id, duration, "Scene duration taken from the clip");
                    duration
                }
                Err(e) => {
                    warn!(scene_id, error = %e, "Scene clip has no usable duration");
                    return Err(AssemblyError::asset_missing(scene_id));
                }
            },
        };

        let outgoing = spec.transition_after(index).or_else(|| {
            if index + 1 < spec.scene_refs.len() {
                record.and_then(|r| r.transition_preference)
            } else {
                None
            }
        });

        Ok(ResolvedSceneClip::new(scene_id, path, duration).with_outgoing(outgoing))
    }
}

/// Most recently modified video object; ties broken by key.
fn latest_clip(objects: Vec<ObjectInfo>) -> Option<ObjectInfo> {
    objects
        .into_iter()
        .filter(|o| is_video_key(&o.key))
        .max_by(|a, b| {
            a.modified_at
                .cmp(&b.modified_at)
                .then_with(|| a.key.cmp(&b.key))
        })
}
