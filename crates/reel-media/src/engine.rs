//! Media engine seam used by the assembly worker.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use reel_models::EncodingConfig;

use crate::audio_mix::{AudioMixPlan, AUDIO_OUTPUT_LABEL};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_audio, probe_video, AudioInfo};
use crate::transition::TransitionGraph;

/// Operations the assembly pipeline needs from a media backend.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Render the video timeline (no audio) to `output`.
    async fn render_timeline(
        &self,
        graph: &TransitionGraph,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<()>;

    /// Mux the planned audio mix under the plan's video into `output`.
    async fn mix_audio(
        &self,
        plan: &AudioMixPlan,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<()>;

    /// Inspect an audio asset; unreadable files yield [`MediaError::InvalidAudio`].
    async fn probe_audio(&self, path: &Path) -> MediaResult<AudioInfo>;

    /// Container duration of a clip in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;
}

/// [`MediaEngine`] backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    timeout_secs: Option<u64>,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    fn runner(&self) -> FfmpegRunner {
        match self.timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        }
    }

    /// Command that renders `graph` to `output`.
    pub fn timeline_command(
        graph: &TransitionGraph,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<FfmpegCommand> {
        let cmd = match graph {
            TransitionGraph::Passthrough { input, .. } => {
                FfmpegCommand::new(input, output).map("0:v:0")
            }
            TransitionGraph::Composite { output_label, .. } => {
                let filter = graph
                    .render()
                    .ok_or_else(|| MediaError::InvalidGraph("composite graph rendered empty".to_string()))?;
                FfmpegCommand::with_inputs(graph.inputs(), output)
                    .filter_complex(filter)
                    .map(format!("[{output_label}]"))
            }
        };
        Ok(cmd.no_audio().video_encoding(encoding))
    }

    /// Command that mixes `plan` onto its video, copying the video stream.
    pub fn mix_command(
        plan: &AudioMixPlan,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<FfmpegCommand> {
        Ok(FfmpegCommand::with_inputs(plan.inputs(), output)
            .filter_complex(plan.filter_complex()?)
            .map("0:v")
            .map(format!("[{AUDIO_OUTPUT_LABEL}]"))
            .video_copy()
            .audio_encoding(encoding)
            .shortest())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn render_timeline(
        &self,
        graph: &TransitionGraph,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = Self::timeline_command(graph, encoding, output)?;
        let total = graph.output_duration();
        info!(
            inputs = graph.inputs().len(),
            duration = total,
            "Rendering timeline"
        );

        self.runner()
            .run_with_progress(&cmd, move |p| {
                debug!(percent = p.percentage(total), speed = ?p.speed, "Timeline render progress");
            })
            .await
    }

    async fn mix_audio(
        &self,
        plan: &AudioMixPlan,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<()> {
        let cmd = Self::mix_command(plan, encoding, output)?;
        self.runner().run(&cmd).await
    }

    async fn probe_audio(&self, path: &Path) -> MediaResult<AudioInfo> {
        probe_audio(path).await
    }

    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        let info = probe_video(path).await?;
        if info.duration.is_finite() && info.duration > 0.0 {
            Ok(info.duration)
        } else {
            Err(MediaError::InvalidVideo(format!(
                "{} has no usable duration",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_mix::{AudioRole, AudioTrack, MixDefaults};
    use crate::transition::ResolvedSceneClip;
    use reel_models::{ContainerFormat, Resolution};

    #[test]
    fn test_passthrough_command_only_normalizes_codec() {
        let graph = TransitionGraph::build(
            &[ResolvedSceneClip::new("s1", "/arena/s1.mp4", 6.0)],
            Resolution::HD_LANDSCAPE,
            30,
        )
        .unwrap();
        let args = FfmpegEngine::timeline_command(
            &graph,
            &EncodingConfig::default(),
            Path::new("/arena/timeline.mp4"),
        )
        .unwrap()
        .build_args();

        assert!(!args.contains(&"-filter_complex".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_composite_command_maps_graph_output() {
        let clips = vec![
            ResolvedSceneClip::new("a", "/arena/a.mp4", 5.0),
            ResolvedSceneClip::new("b", "/arena/b.mp4", 5.0),
        ];
        let graph = TransitionGraph::build(&clips, Resolution::HD_LANDSCAPE, 30).unwrap();
        let args = FfmpegEngine::timeline_command(
            &graph,
            &EncodingConfig::for_container(ContainerFormat::Webm),
            Path::new("/arena/timeline.webm"),
        )
        .unwrap()
        .build_args();

        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[vout]"));
        assert!(args.contains(&"libvpx-vp9".to_string()));
    }

    #[test]
    fn test_mix_command_copies_video_and_maps_mix() {
        let plan = AudioMixPlan::new(
            "/arena/timeline.mp4",
            vec![AudioTrack::new("/arena/narration.wav", AudioRole::Narration, 1.0)],
            10.0,
            &MixDefaults::default(),
        );
        let args = FfmpegEngine::mix_command(
            &plan,
            &EncodingConfig::default(),
            Path::new("/arena/final.mp4"),
        )
        .unwrap()
        .build_args();

        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "0:v"));
        assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[aout]"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "copy"));
        assert!(args.contains(&"-shortest".to_string()));
    }
}
