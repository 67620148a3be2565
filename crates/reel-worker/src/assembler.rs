//! Assembly orchestrator.
//!
//! Drives one job through `starting → downloading → assembling → mixing →
//! reviewing → uploading → completed`. Any stage can end the run in
//! `failed`; the error is converted into the job result exactly once, here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn, Instrument};
use validator::Validate;

use reel_media::{resolve_volume, AudioMixer, AudioRole, AudioTrack, MediaEngine, TransitionGraph};
use reel_models::keys::{exports_prefix, extension_of};
use reel_models::{
    AssemblyJobSpec, AssemblyResult, EncodingConfig, JobId, ProjectManifest, Stage,
};
use reel_storage::ObjectStore;

use crate::arena::Arena;
use crate::catalog::SceneCatalog;
use crate::config::WorkerConfig;
use crate::error::{AssemblyError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::poll::{poll_until, PollPolicy};
use crate::progress::ProgressSender;
use crate::resolver::AssetResolver;
use crate::review::review;

/// Collaborators shared by every job on a worker.
pub struct Assembler {
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn SceneCatalog>,
    engine: Arc<dyn MediaEngine>,
    config: WorkerConfig,
}

/// Run one assembly job and return its terminal result.
pub async fn run_assembly(
    assembler: &Assembler,
    job_id: &JobId,
    spec: &AssemblyJobSpec,
    progress: ProgressSender,
) -> AssemblyResult {
    assembler.run(job_id, spec, progress).await
}

impl Assembler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn SceneCatalog>,
        engine: Arc<dyn MediaEngine>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one job. Never fails: errors become a `success: false` result.
    pub async fn run(
        &self,
        job_id: &JobId,
        spec: &AssemblyJobSpec,
        mut progress: ProgressSender,
    ) -> AssemblyResult {
        let logger = JobLogger::new(job_id, &spec.project_id);
        let span = logger.span();

        async move {
            logger.started(spec.scene_refs.len());
            let mut clock = StageClock::new(logger.clone());
            clock.enter(&mut progress, Stage::Starting, "Preparing working directory");

            let arena = match Arena::create(&self.config.work_dir).await {
                Ok(arena) => arena,
                Err(e) => {
                    let err = AssemblyError::internal(format!("failed to create arena: {e}"));
                    return self.fail(&logger, &mut progress, err, Vec::new());
                }
            };

            let mut skipped = Vec::new();
            let outcome = self
                .execute(spec, &arena, &mut progress, &mut clock, &mut skipped)
                .await;
            clock.finish();

            let result = match outcome {
                Ok(result) => {
                    metrics::record_job_completed();
                    if let Some(duration) = result.output_duration_seconds {
                        metrics::record_output_duration(duration);
                    }
                    progress.completed("Assembly complete");
                    logger.completed(&result);
                    result
                }
                Err(err) => self.fail(&logger, &mut progress, err, skipped),
            };

            if let Err(e) = arena.close().await {
                warn!(error = %e, "Failed to remove working directory");
            }

            result
        }
        .instrument(span)
        .await
    }

    fn fail(
        &self,
        logger: &JobLogger,
        progress: &mut ProgressSender,
        err: AssemblyError,
        skipped: Vec<String>,
    ) -> AssemblyResult {
        let kind = err.kind();
        let message = err.to_string();
        logger.failed(kind, &message);
        metrics::record_job_failed(kind.as_str());
        progress.failed(message.clone());
        AssemblyResult::failure(kind, message).with_skipped(skipped)
    }

    async fn execute(
        &self,
        spec: &AssemblyJobSpec,
        arena: &Arena,
        progress: &mut ProgressSender,
        clock: &mut StageClock,
        skipped: &mut Vec<String>,
    ) -> PipelineResult<AssemblyResult> {
        spec.validate()
            .map_err(|e| AssemblyError::InvalidSpec(e.to_string()))?;

        let manifest = self
            .catalog
            .project(&spec.project_id)
            .await?
            .unwrap_or_else(|| ProjectManifest {
                project_id: spec.project_id.clone(),
                ..Default::default()
            });

        clock.enter(
            progress,
            Stage::Downloading,
            format!("Resolving {} scene(s)", spec.scene_refs.len()),
        );
        let resolved = AssetResolver::new(
            self.store.as_ref(),
            self.engine.as_ref(),
            arena,
            self.config.max_download_parallel,
        )
        .resolve(spec, &manifest)
        .await?;
        *skipped = resolved.skipped.clone();
        metrics::record_scenes_skipped(skipped.len());

        let tracks = self.resolve_audio(spec, &manifest, arena).await?;

        clock.enter(
            progress,
            Stage::Assembling,
            format!("Joining {} clip(s)", resolved.clips.len()),
        );
        let container = spec.output.container_format;
        let mut encoding = EncodingConfig::for_container(container);
        encoding.frame_rate = self.config.frame_rate;

        let graph = TransitionGraph::build(
            &resolved.clips,
            spec.output.resolution,
            self.config.frame_rate,
        )
        .map_err(AssemblyError::transcode)?;
        let timeline = arena.file(&format!("timeline.{}", container.extension()));
        self.engine
            .render_timeline(&graph, &encoding, &timeline)
            .await
            .map_err(AssemblyError::transcode)?;
        let duration = graph.output_duration();

        clock.enter(
            progress,
            Stage::Mixing,
            format!("Mixing {} audio track(s)", tracks.len()),
        );
        let has_audio = !tracks.is_empty();
        let final_path = AudioMixer::new(self.engine.as_ref(), self.config.mix)
            .mix(
                &timeline,
                tracks,
                duration,
                &encoding,
                &arena.file(&format!("final.{}", container.extension())),
            )
            .await
            .map_err(AssemblyError::audio_mix)?;

        clock.enter(progress, Stage::Reviewing, "Reviewing output");
        let review = review(duration, resolved.clips.len(), has_audio);
        info!(
            score = review.score,
            engagement = %review.predicted_engagement,
            "Quality review"
        );

        clock.enter(progress, Stage::Uploading, "Publishing artifact");
        let file_size = tokio::fs::metadata(&final_path)
            .await
            .map_err(|e| AssemblyError::Publish(format!("output is unreadable: {e}")))?
            .len();
        let stored = self
            .store
            .put_file(
                &final_path,
                &exports_prefix(&spec.project_id),
                container.content_type(),
            )
            .await
            .map_err(AssemblyError::publish)?;

        Ok(AssemblyResult {
            success: true,
            output_asset_key: Some(stored.key),
            output_url: Some(stored.url),
            output_duration_seconds: Some(duration),
            file_size_bytes: Some(file_size),
            review: Some(review),
            skipped_scenes: resolved.skipped,
            error: None,
            error_kind: None,
        })
    }

    /// Wait for and download the job's audio assets, with resolved volumes.
    async fn resolve_audio(
        &self,
        spec: &AssemblyJobSpec,
        manifest: &ProjectManifest,
        arena: &Arena,
    ) -> PipelineResult<Vec<AudioTrack>> {
        let defaults = manifest.audio_defaults;
        let builtin = self.config.mix;
        let mut tracks = Vec::new();

        if let Some(key) = &spec.audio.narration_ref {
            let path = self.fetch_audio(key, AudioRole::Narration, arena).await?;
            tracks.push(AudioTrack::new(
                path,
                AudioRole::Narration,
                resolve_volume(
                    spec.audio.narration_volume,
                    defaults.narration_volume,
                    builtin.narration_volume,
                ),
            ));
        }

        if let Some(key) = &spec.audio.music_ref {
            let path = self.fetch_audio(key, AudioRole::Music, arena).await?;
            tracks.push(AudioTrack::new(
                path,
                AudioRole::Music,
                resolve_volume(
                    spec.audio.music_volume,
                    defaults.music_volume,
                    builtin.music_volume,
                ),
            ));
        }

        Ok(tracks)
    }

    async fn fetch_audio(
        &self,
        key: &str,
        role: AudioRole,
        arena: &Arena,
    ) -> PipelineResult<PathBuf> {
        let store = self.store.as_ref();
        let policy = PollPolicy::new(
            self.config.audio_poll_attempts,
            self.config.audio_poll_interval,
        );

        poll_until(policy, &format!("{} asset {key}", role.as_str()), move || async move {
            store
                .exists(key)
                .await
                .map(|exists| exists.then_some(()))
                .map_err(|e| AssemblyError::internal(format!("failed to check {key}: {e}")))
        })
        .await?;

        let path = arena.audio_path(role.as_str(), extension_of(key).unwrap_or("audio"));
        store.download_to(key, &path).await.map_err(|e| {
            AssemblyError::AudioMix(format!("failed to fetch {} {key}: {e}", role.as_str()))
        })?;
        Ok(path)
    }
}

/// Emits stage events and records how long each stage took.
struct StageClock {
    logger: JobLogger,
    current: Option<(Stage, Instant)>,
}

impl StageClock {
    fn new(logger: JobLogger) -> Self {
        Self {
            logger,
            current: None,
        }
    }

    fn enter(&mut self, progress: &mut ProgressSender, stage: Stage, message: impl Into<String>) {
        self.finish();
        let message = message.into();
        self.logger.stage(stage, &message);
        progress.stage(stage, message);
        self.current = Some((stage, Instant::now()));
    }

    fn finish(&mut self) {
        if let Some((stage, started)) = self.current.take() {
            metrics::record_stage_duration(stage.as_str(), started.elapsed().as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_clock_emits_in_order() {
        let (mut tx, mut rx) = crate::progress::progress_channel();
        let mut clock = StageClock::new(JobLogger::new(&JobId::from_string("j"), "p"));
        clock.enter(&mut tx, Stage::Starting, "a");
        clock.enter(&mut tx, Stage::Downloading, "b");
        clock.finish();
        assert!(clock.current.is_none());

        assert_eq!(rx.try_recv().unwrap().stage, Stage::Starting);
        assert_eq!(rx.try_recv().unwrap().stage, Stage::Downloading);
    }
}
