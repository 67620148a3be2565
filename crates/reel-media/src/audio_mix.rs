//! Narration/music mixing onto an assembled timeline.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reel_models::EncodingConfig;

use crate::engine::MediaEngine;
use crate::error::{MediaError, MediaResult};

/// Label of the final mixed audio stream.
pub const AUDIO_OUTPUT_LABEL: &str = "aout";

/// Sample format every track is normalized to before mixing.
const MIX_SAMPLE_RATE: u32 = 48_000;

/// What a track is used for in the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRole {
    Narration,
    Music,
}

impl AudioRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioRole::Narration => "narration",
            AudioRole::Music => "music",
        }
    }
}

/// An audio asset placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub role: AudioRole,
    pub start_time_seconds: f64,
    /// Linear gain in `[0, 1]`
    pub volume: f32,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, role: AudioRole, volume: f32) -> Self {
        Self {
            path: path.into(),
            role,
            start_time_seconds: 0.0,
            volume,
        }
    }

    pub fn starting_at(mut self, seconds: f64) -> Self {
        self.start_time_seconds = seconds;
        self
    }
}

/// Sidechain compression of music keyed on narration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuckingSettings {
    pub enabled: bool,
    pub threshold: f32,
    pub ratio: f32,
    pub attack_ms: u32,
    pub release_ms: u32,
}

impl Default for DuckingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.03,
            ratio: 8.0,
            attack_ms: 20,
            release_ms: 400,
        }
    }
}

/// Built-in mix parameters, used when neither the job nor the project sets them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixDefaults {
    pub narration_volume: f32,
    /// Kept well below narration
    pub music_volume: f32,
    pub music_fade_in_secs: f64,
    pub music_fade_out_secs: f64,
    pub ducking: DuckingSettings,
}

impl Default for MixDefaults {
    fn default() -> Self {
        Self {
            narration_volume: 1.0,
            music_volume: 0.25,
            music_fade_in_secs: 1.0,
            music_fade_out_secs: 2.0,
            ducking: DuckingSettings::default(),
        }
    }
}

/// Pick the effective volume: job value, then project default, then built-in.
///
/// Non-finite values are skipped; the result is clamped to `[0, 1]`.
pub fn resolve_volume(job: Option<f32>, project: Option<f32>, builtin: f32) -> f32 {
    [job, project]
        .into_iter()
        .flatten()
        .find(|v| v.is_finite())
        .unwrap_or(builtin)
        .clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq)]
enum AudioOp {
    Normalize,
    Volume(f32),
    FadeIn { duration: f64 },
    FadeOut { start: f64, duration: f64 },
    Delay { ms: u64 },
    Mix { inputs: usize },
    Split,
    Sidechain(DuckingSettings),
    Pad,
}

impl fmt::Display for AudioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioOp::Normalize => write!(
                f,
                "aformat=sample_rates={MIX_SAMPLE_RATE}:channel_layouts=stereo"
            ),
            AudioOp::Volume(v) => write!(f, "volume={v:.3}"),
            AudioOp::FadeIn { duration } => write!(f, "afade=t=in:st=0:d={duration:.3}"),
            AudioOp::FadeOut { start, duration } => {
                write!(f, "afade=t=out:st={start:.3}:d={duration:.3}")
            }
            AudioOp::Delay { ms } => write!(f, "adelay={ms}:all=1"),
            AudioOp::Mix { inputs } => write!(
                f,
                "amix=inputs={inputs}:duration=longest:dropout_transition=0:normalize=0"
            ),
            AudioOp::Split => write!(f, "asplit=2"),
            AudioOp::Sidechain(d) => write!(
                f,
                "sidechaincompress=threshold={}:ratio={}:attack={}:release={}",
                d.threshold, d.ratio, d.attack_ms, d.release_ms
            ),
            AudioOp::Pad => write!(f, "apad"),
        }
    }
}

#[derive(Debug, Clone)]
struct AudioChain {
    inputs: Vec<String>,
    ops: Vec<AudioOp>,
    outputs: Vec<String>,
}

impl fmt::Display for AudioChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        let ops: Vec<String> = self.ops.iter().map(ToString::to_string).collect();
        write!(f, "{}", ops.join(","))?;
        for output in &self.outputs {
            write!(f, "[{output}]")?;
        }
        Ok(())
    }
}

/// Everything needed to lay audio under a rendered video.
///
/// Input 0 is the video; track `k` is input `k + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMixPlan {
    pub video: PathBuf,
    pub tracks: Vec<AudioTrack>,
    pub timeline_secs: f64,
    pub ducking: DuckingSettings,
    pub music_fade_in_secs: f64,
    pub music_fade_out_secs: f64,
}

impl AudioMixPlan {
    pub fn new(
        video: impl Into<PathBuf>,
        tracks: Vec<AudioTrack>,
        timeline_secs: f64,
        defaults: &MixDefaults,
    ) -> Self {
        Self {
            video: video.into(),
            tracks,
            timeline_secs,
            ducking: defaults.ducking,
            music_fade_in_secs: defaults.music_fade_in_secs,
            music_fade_out_secs: defaults.music_fade_out_secs,
        }
    }

    pub fn has_role(&self, role: AudioRole) -> bool {
        self.tracks.iter().any(|t| t.role == role)
    }

    /// Input files in `-i` order, video first.
    pub fn inputs(&self) -> Vec<&Path> {
        std::iter::once(self.video.as_path())
            .chain(self.tracks.iter().map(|t| t.path.as_path()))
            .collect()
    }

    /// Render the `-filter_complex` expression ending in `[aout]`.
    pub fn filter_complex(&self) -> MediaResult<String> {
        if self.tracks.is_empty() {
            return Err(MediaError::InvalidGraph("audio mix has no tracks".to_string()));
        }

        let mut chains = Vec::new();
        let narration = self.role_bus(AudioRole::Narration, &mut chains);
        let music = self.role_bus(AudioRole::Music, &mut chains);

        let mix_ops = vec![AudioOp::Mix { inputs: 2 }, AudioOp::Pad];
        match (narration, music) {
            (Some(narration), Some(music)) if self.ducking.enabled => {
                chains.push(AudioChain {
                    inputs: vec![narration],
                    ops: vec![AudioOp::Split],
                    outputs: vec!["narmix".to_string(), "narkey".to_string()],
                });
                // sidechaincompress stops at the end of either input; a padded
                // key keeps the music running once narration is over
                chains.push(AudioChain {
                    inputs: vec!["narkey".to_string()],
                    ops: vec![AudioOp::Pad],
                    outputs: vec!["narkeypad".to_string()],
                });
                chains.push(AudioChain {
                    inputs: vec![music, "narkeypad".to_string()],
                    ops: vec![AudioOp::Sidechain(self.ducking)],
                    outputs: vec!["ducked".to_string()],
                });
                chains.push(AudioChain {
                    inputs: vec!["narmix".to_string(), "ducked".to_string()],
                    ops: mix_ops,
                    outputs: vec![AUDIO_OUTPUT_LABEL.to_string()],
                });
            }
            (Some(narration), Some(music)) => chains.push(AudioChain {
                inputs: vec![narration, music],
                ops: mix_ops,
                outputs: vec![AUDIO_OUTPUT_LABEL.to_string()],
            }),
            (Some(only), None) | (None, Some(only)) => chains.push(AudioChain {
                inputs: vec![only],
                ops: vec![AudioOp::Pad],
                outputs: vec![AUDIO_OUTPUT_LABEL.to_string()],
            }),
            (None, None) => {
                return Err(MediaError::internal("audio tracks present but no bus built"));
            }
        }

        Ok(chains
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";"))
    }

    /// Push the per-track chains for a role and return its bus label.
    fn role_bus(&self, role: AudioRole, chains: &mut Vec<AudioChain>) -> Option<String> {
        let labels: Vec<String> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.role == role)
            .map(|(k, track)| {
                let label = format!("{}{k}", role.as_str());
                chains.push(AudioChain {
                    inputs: vec![format!("{}:a", k + 1)],
                    ops: self.track_ops(track),
                    outputs: vec![label.clone()],
                });
                label
            })
            .collect();

        match labels.len() {
            0 => None,
            1 => labels.into_iter().next(),
            n => {
                let bus = role.as_str().to_string();
                chains.push(AudioChain {
                    inputs: labels,
                    ops: vec![AudioOp::Mix { inputs: n }],
                    outputs: vec![bus.clone()],
                });
                Some(bus)
            }
        }
    }

    fn track_ops(&self, track: &AudioTrack) -> Vec<AudioOp> {
        let start = if track.start_time_seconds.is_finite() {
            track.start_time_seconds.max(0.0)
        } else {
            0.0
        };

        let mut ops = vec![
            AudioOp::Normalize,
            AudioOp::Volume(track.volume.clamp(0.0, 1.0)),
        ];

        if track.role == AudioRole::Music {
            if self.music_fade_in_secs > 0.0 {
                ops.push(AudioOp::FadeIn {
                    duration: self.music_fade_in_secs,
                });
            }
            if self.music_fade_out_secs > 0.0 {
                // Fades run on the track's own clock, before the delay
                ops.push(AudioOp::FadeOut {
                    start: (self.timeline_secs - start - self.music_fade_out_secs).max(0.0),
                    duration: self.music_fade_out_secs,
                });
            }
        }

        ops.push(AudioOp::Delay {
            ms: (start * 1000.0).round() as u64,
        });
        ops
    }
}

/// Mixes audio tracks onto a rendered video through a [`MediaEngine`].
pub struct AudioMixer<'a> {
    engine: &'a dyn MediaEngine,
    defaults: MixDefaults,
}

impl<'a> AudioMixer<'a> {
    pub fn new(engine: &'a dyn MediaEngine, defaults: MixDefaults) -> Self {
        Self { engine, defaults }
    }

    /// Lay `tracks` under `video` and write the result to `output`.
    ///
    /// With no tracks the video path is returned as is. Every track is probed
    /// first; an unreadable one fails the whole mix.
    pub async fn mix(
        &self,
        video: &Path,
        tracks: Vec<AudioTrack>,
        timeline_secs: f64,
        encoding: &EncodingConfig,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        if tracks.is_empty() {
            debug!("No audio tracks, keeping silent video");
            return Ok(video.to_path_buf());
        }

        for track in &tracks {
            let info = self.engine.probe_audio(&track.path).await.map_err(|e| match e {
                MediaError::InvalidAudio { .. } => e,
                other => MediaError::invalid_audio(&track.path, other.to_string()),
            })?;
            debug!(
                role = track.role.as_str(),
                duration = info.duration,
                codec = %info.codec,
                "Audio track validated"
            );
        }

        let plan = AudioMixPlan::new(video, tracks, timeline_secs, &self.defaults);
        info!(
            tracks = plan.tracks.len(),
            ducking = plan.ducking.enabled && plan.has_role(AudioRole::Narration) && plan.has_role(AudioRole::Music),
            "Mixing audio"
        );
        self.engine.mix_audio(&plan, encoding, output).await?;
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(tracks: Vec<AudioTrack>) -> AudioMixPlan {
        AudioMixPlan::new("/arena/video.mp4", tracks, 20.0, &MixDefaults::default())
    }

    #[test]
    fn test_resolve_volume_precedence() {
        assert_eq!(resolve_volume(Some(0.4), Some(0.7), 0.25), 0.4);
        assert_eq!(resolve_volume(None, Some(0.7), 0.25), 0.7);
        assert_eq!(resolve_volume(None, None, 0.25), 0.25);
        assert_eq!(resolve_volume(Some(f32::NAN), Some(0.6), 0.25), 0.6);
        assert_eq!(resolve_volume(Some(1.5), None, 0.25), 1.0);
    }

    #[test]
    fn test_builtin_defaults_favor_narration() {
        let d = MixDefaults::default();
        assert!(d.music_volume < d.narration_volume / 2.0);
    }

    #[test]
    fn test_narration_and_music_are_ducked() {
        let graph = plan(vec![
            AudioTrack::new("/arena/narration.wav", AudioRole::Narration, 1.0),
            AudioTrack::new("/arena/music.mp3", AudioRole::Music, 0.25).starting_at(1.5),
        ])
        .filter_complex()
        .unwrap();

        assert!(graph.contains("[1:a]aformat=sample_rates=48000:channel_layouts=stereo,volume=1.000,adelay=0:all=1[narration0]"));
        assert!(graph.contains("volume=0.250,afade=t=in:st=0:d=1.000,afade=t=out:st=16.500:d=2.000,adelay=1500:all=1[music1]"));
        assert!(graph.contains("[narration0]asplit=2[narmix][narkey]"));
        assert!(graph.contains("[narkey]apad[narkeypad]"));
        assert!(graph.contains("[music1][narkeypad]sidechaincompress="));
        assert!(graph.ends_with(
            "[narmix][ducked]amix=inputs=2:duration=longest:dropout_transition=0:normalize=0,apad[aout]"
        ));
    }

    #[test]
    fn test_music_outlives_short_narration() {
        let mut p = plan(vec![
            AudioTrack::new("/arena/narration.wav", AudioRole::Narration, 1.0).starting_at(2.0),
            AudioTrack::new("/arena/music.mp3", AudioRole::Music, 0.25),
        ]);
        p.timeline_secs = 60.0;
        let graph = p.filter_complex().unwrap();

        // music keeps its own fade-out at the end of the timeline
        assert!(graph.contains("afade=t=out:st=58.000:d=2.000,adelay=0:all=1[music1]"));

        let chains: Vec<&str> = graph.split(';').collect();
        let ducked = chains
            .iter()
            .find(|c| c.contains("sidechaincompress"))
            .unwrap();
        assert!(ducked.starts_with("[music1][narkeypad]"));
        assert!(ducked.ends_with("[ducked]"));

        let key = chains.iter().find(|c| c.ends_with("[narkeypad]")).unwrap();
        assert_eq!(*key, "[narkey]apad[narkeypad]");
        assert!(!chains.iter().any(|c| c.starts_with("[music1][narkey]")));
    }

    #[test]
    fn test_ducking_disabled_mixes_directly() {
        let mut p = plan(vec![
            AudioTrack::new("/n.wav", AudioRole::Narration, 1.0),
            AudioTrack::new("/m.mp3", AudioRole::Music, 0.2),
        ]);
        p.ducking.enabled = false;
        let graph = p.filter_complex().unwrap();
        assert!(!graph.contains("sidechaincompress"));
        assert!(graph.contains("[narration0][music1]amix=inputs=2"));
    }

    #[test]
    fn test_music_only_has_no_sidechain() {
        let graph = plan(vec![AudioTrack::new("/m.mp3", AudioRole::Music, 0.3)])
            .filter_complex()
            .unwrap();
        assert!(!graph.contains("sidechaincompress"));
        assert!(graph.ends_with("[music0]apad[aout]"));
    }

    #[test]
    fn test_multiple_narration_tracks_share_a_bus() {
        let graph = plan(vec![
            AudioTrack::new("/a.wav", AudioRole::Narration, 1.0),
            AudioTrack::new("/b.wav", AudioRole::Narration, 1.0).starting_at(8.0),
        ])
        .filter_complex()
        .unwrap();
        assert!(graph.contains("[narration0][narration1]amix=inputs=2"));
        assert!(graph.contains("adelay=8000:all=1"));
        assert!(graph.ends_with("[narration]apad[aout]"));
    }

    #[test]
    fn test_fade_out_never_negative() {
        let graph = AudioMixPlan::new(
            "/v.mp4",
            vec![AudioTrack::new("/m.mp3", AudioRole::Music, 0.3).starting_at(5.0)],
            3.0,
            &MixDefaults::default(),
        )
        .filter_complex()
        .unwrap();
        assert!(graph.contains("afade=t=out:st=0.000"));
    }

    #[test]
    fn test_empty_plan_is_rejected() {
        assert!(plan(Vec::new()).filter_complex().is_err());
    }
}
